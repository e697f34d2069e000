//! Fixture builders for unit tests.

use crate::package::{Package, CONTENT_TYPES_PART, DEFAULT_DOCUMENT_PART, PACKAGE_RELS_PART, STYLES_PART};

pub use crate::parser::W_NS;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// Escape text for element content.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Wrap body content in a `w:document`.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
        W_NS, body
    )
}

/// A plain paragraph.
pub fn paragraph_xml(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(text)
    )
}

/// A paragraph with a paragraph style.
pub fn styled_paragraph_xml(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        style,
        escape(text)
    )
}

/// A heading using the `HeadingN` styles from [`styles_xml`].
pub fn heading_xml(level: u8, text: &str) -> String {
    styled_paragraph_xml(&format!("Heading{}", level), text)
}

/// A paragraph with an explicit font size in points.
pub fn sized_paragraph_xml(text: &str, points: f32) -> String {
    format!(
        r#"<w:p><w:r><w:rPr><w:sz w:val="{}"/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        (points * 2.0) as u32,
        escape(text)
    )
}

/// A style sheet declaring the styles the fixtures use.
pub fn styles_xml() -> String {
    let mut styles = String::new();
    styles.push_str(r#"<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val="24"/></w:rPr></w:rPrDefault></w:docDefaults>"#);
    styles.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#);
    styles.push_str(r#"<w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:rPr><w:sz w:val="40"/></w:rPr></w:style>"#);
    for level in 1..=3 {
        styles.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{0}"><w:name w:val="heading {0}"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="{1}"/></w:pPr><w:rPr><w:b/></w:rPr></w:style>"#,
            level,
            level - 1
        ));
    }
    styles.push_str(r#"<w:style w:type="paragraph" w:styleId="Bibliography"><w:name w:val="Bibliography"/><w:basedOn w:val="Normal"/></w:style>"#);
    format!(r#"<w:styles xmlns:w="{}">{}</w:styles>"#, W_NS, styles)
}

/// A complete package around the given body content.
pub fn minimal_package(body: &str) -> Package {
    let mut package = Package::new();
    package.insert(CONTENT_TYPES_PART, CONTENT_TYPES.as_bytes().to_vec());
    package.insert(PACKAGE_RELS_PART, PACKAGE_RELS.as_bytes().to_vec());
    package.insert(DEFAULT_DOCUMENT_PART, document_xml(body).into_bytes());
    package.insert(STYLES_PART, styles_xml().into_bytes());
    package
}

/// Serialized bytes of [`minimal_package`].
pub fn package_bytes(body: &str) -> Vec<u8> {
    minimal_package(body).write().unwrap()
}

/// The IEEE walkthrough manuscript: one cited reference.
pub fn single_reference_body() -> String {
    [
        heading_xml(1, "Introduction"),
        paragraph_xml("cites [1]"),
        heading_xml(1, "References"),
        paragraph_xml("[1] Smith, J. (2020). Title. Venue."),
    ]
    .concat()
}
