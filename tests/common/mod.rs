//! Shared fixtures for integration tests.
#![allow(dead_code)]

use paperfmt::package::{
    CONTENT_TYPES_PART, DEFAULT_DOCUMENT_PART, PACKAGE_RELS_PART, STYLES_PART,
};
use paperfmt::parser::W_NS;
use paperfmt::Package;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Builds small DOCX manuscripts paragraph by paragraph.
#[derive(Default)]
pub struct DocxBuilder {
    body: String,
    extra_parts: Vec<(String, Vec<u8>)>,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(mut self, level: u8, text: &str) -> Self {
        self.body.push_str(&format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading{}"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            level,
            escape(text)
        ));
        self
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.body.push_str(&format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    /// Append body markup as-is.
    pub fn raw(mut self, markup: &str) -> Self {
        self.body.push_str(markup);
        self
    }

    pub fn part(mut self, name: &str, data: &[u8]) -> Self {
        self.extra_parts.push((name.to_string(), data.to_vec()));
        self
    }

    pub fn package(&self) -> Package {
        let mut package = Package::new();
        package.insert(CONTENT_TYPES_PART, CONTENT_TYPES.as_bytes().to_vec());
        package.insert(PACKAGE_RELS_PART, PACKAGE_RELS.as_bytes().to_vec());
        package.insert(
            DEFAULT_DOCUMENT_PART,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
                W_NS, self.body
            )
            .into_bytes(),
        );
        package.insert(STYLES_PART, styles().into_bytes());
        for (name, data) in &self.extra_parts {
            package.insert(name.clone(), data.clone());
        }
        package
    }

    pub fn build(&self) -> Vec<u8> {
        self.package().write().expect("fixture package must serialize")
    }
}

fn styles() -> String {
    let mut styles = String::from(
        r#"<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="24"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    );
    for level in 1..=3 {
        styles.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{0}"><w:name w:val="heading {0}"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="{1}"/></w:pPr><w:rPr><w:b/></w:rPr></w:style>"#,
            level,
            level - 1
        ));
    }
    format!(r#"<w:styles xmlns:w="{}">{}</w:styles>"#, W_NS, styles)
}

/// The one-reference manuscript used across tests.
pub fn single_reference() -> DocxBuilder {
    DocxBuilder::new()
        .heading(1, "Introduction")
        .paragraph("cites [1]")
        .heading(1, "References")
        .paragraph("[1] Smith, J. (2020). Title. Venue.")
}

/// Two references cited out of order.
pub fn two_references() -> DocxBuilder {
    DocxBuilder::new()
        .heading(1, "Introduction")
        .paragraph("First see [2], then [1].")
        .heading(1, "Method")
        .paragraph("Nothing cited here.")
        .heading(1, "References")
        .paragraph("[1] Smith, J. (2020). Zebra patterns. Journal of Stripes.")
        .paragraph("[2] Adams, B. (2018). Apple growth. Orchard Review.")
}

/// Plain text of every block in a rendered package.
pub fn block_texts(bytes: &[u8]) -> Vec<String> {
    let package = Package::open(bytes).expect("output must be a package");
    let document = paperfmt::DocxParser::new(&package)
        .parse()
        .expect("output must parse");
    document.blocks.iter().map(|b| b.plain_text()).collect()
}
