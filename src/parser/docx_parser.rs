//! WordprocessingML document parser using roxmltree.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use roxmltree::Node;

use crate::budget::StageBudget;
use crate::error::{Error, Result};
use crate::model::{
    Block, BlockKind, Document, Hyperlink, MarkupContext, Metadata, Table, TableCell, TableRow,
    TextRun,
};
use crate::package::{Package, CORE_PROPERTIES_PART, STYLES_PART};

use super::options::BuildOptions;
use super::styles::{
    heading_level_from_name, is_w, is_w_named, on_off, w_attr, ParaProps, RunProps, StyleSheet,
};

/// Run children that only survive as their source markup.
const OPAQUE_RUN_CHILDREN: [&str; 9] = [
    "footnoteReference",
    "endnoteReference",
    "commentReference",
    "annotationRef",
    "fldChar",
    "instrText",
    "separator",
    "continuationSeparator",
    "sym",
];

/// Section property children replaced by the template on output.
const TEMPLATED_SECTION_CHILDREN: [&str; 3] = ["pgSz", "pgMar", "cols"];

/// Document model builder for a DOCX package.
pub struct DocxParser<'p> {
    package: &'p Package,
    options: BuildOptions,
}

impl<'p> DocxParser<'p> {
    /// Create a parser over an opened package.
    pub fn new(package: &'p Package) -> Self {
        Self::with_options(package, BuildOptions::default())
    }

    /// Create a parser with custom options.
    pub fn with_options(package: &'p Package, options: BuildOptions) -> Self {
        Self { package, options }
    }

    /// Parse the document and return a structured Document.
    pub fn parse(&self) -> Result<Document> {
        self.parse_with_budget(&StageBudget::unlimited("build"))
    }

    /// Parse under a time budget.
    pub fn parse_with_budget(&self, budget: &StageBudget) -> Result<Document> {
        let markup = self.package.main_document()?;

        let styles = match self.package.get_text(STYLES_PART) {
            Some(xml) => StyleSheet::parse(xml, self.options.xml_options()),
            None => StyleSheet::empty(),
        };

        let mut document = build_document(markup, &styles, &self.options, budget)?;

        if self.options.extract_metadata {
            if let Some(core) = self.package.get_text(CORE_PROPERTIES_PART) {
                document.metadata = parse_core_properties(core);
            }
        }

        log::debug!(
            "built document: {} blocks, {} styles",
            document.block_count(),
            styles.len()
        );
        Ok(document)
    }
}

/// Build a document from the main markup part.
///
/// This is a pure transform: the same markup and style sheet always yield
/// the same block sequence.
pub fn build_document(
    markup: &str,
    styles: &StyleSheet,
    options: &BuildOptions,
    budget: &StageBudget,
) -> Result<Document> {
    let xml = roxmltree::Document::parse_with_options(markup, options.xml_options())?;
    let root = xml.root_element();

    if !is_w_named(&root, "document") {
        return Err(Error::MalformedMarkup(format!(
            "root element is '{}', expected w:document",
            root.tag_name().name()
        )));
    }

    let body = root
        .children()
        .find(|n| is_w_named(n, "body"))
        .ok_or_else(|| Error::MalformedMarkup("w:body element is missing".to_string()))?;

    let mut builder = Builder {
        markup,
        styles,
        options,
        budget,
        blocks: Vec::new(),
    };
    builder.walk(body)?;
    attach_table_captions(&mut builder.blocks);

    let section_children = body
        .children()
        .find(|n| is_w_named(n, "sectPr"))
        .map(|sect| {
            sect.children()
                .filter(|n| n.is_element())
                .filter(|n| !(is_w(n) && TEMPLATED_SECTION_CHILDREN.contains(&n.tag_name().name())))
                .map(|n| markup[n.range()].to_string())
                .collect()
        })
        .unwrap_or_default();

    Ok(Document {
        metadata: Metadata::default(),
        blocks: builder.blocks,
        markup: MarkupContext {
            root_attributes: root_attributes(root),
            section_children,
        },
    })
}

struct Builder<'s> {
    markup: &'s str,
    styles: &'s StyleSheet,
    options: &'s BuildOptions,
    budget: &'s StageBudget,
    blocks: Vec<Block>,
}

#[derive(Default)]
struct RunCollector {
    runs: Vec<TextRun>,
    has_graphic: bool,
}

impl<'s> Builder<'s> {
    /// Walk block-level children of the body or a content control.
    fn walk(&mut self, container: Node) -> Result<()> {
        for child in container.children().filter(|n| is_w(n)) {
            self.budget.check()?;
            match child.tag_name().name() {
                "p" => {
                    if let Some(block) = self.paragraph(child) {
                        self.blocks.push(block);
                    }
                }
                "tbl" => {
                    let block = self.table(child);
                    self.blocks.push(block);
                }
                "sdt" => {
                    if let Some(content) = child.children().find(|n| is_w_named(n, "sdtContent")) {
                        self.walk(content)?;
                    }
                }
                "customXml" | "ins" => self.walk(child)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn paragraph(&self, node: Node) -> Option<Block> {
        let ppr = node.children().find(|n| is_w_named(n, "pPr"));

        let style_id = ppr
            .and_then(|p| p.children().find(|n| is_w_named(n, "pStyle")))
            .and_then(|s| w_attr(s, "val"))
            .or_else(|| self.styles.paragraph_default());

        let resolved = style_id
            .map(|id| self.styles.resolve(id))
            .unwrap_or_default();
        let direct = ppr.map(ParaProps::from_node).unwrap_or_default();
        let para = resolved.para.overlay(&direct);
        let base_run = self.styles.defaults().overlay(&resolved.run);

        let mut collector = RunCollector::default();
        self.collect_runs(node, &base_run, None, &mut collector);

        let style = para.to_paragraph_style(style_id, resolved.name.as_deref());
        let heading_level = resolved
            .name
            .as_deref()
            .and_then(heading_level_from_name)
            .or_else(|| para.outline_level.map(|l| l + 1));

        let kind = if collector.has_graphic {
            BlockKind::Figure {
                markup: self.markup[node.range()].to_string(),
            }
        } else if let Some(level) = heading_level {
            BlockKind::Heading { level }
        } else if style.is_named("Bibliography") {
            BlockKind::ReferenceEntry
        } else {
            BlockKind::Paragraph
        };

        let mut block = Block::new(kind);
        block.style = style;
        block.runs = merge_runs(collector.runs);

        if block.kind == BlockKind::Paragraph && is_citation_marker(&block) {
            block.kind = BlockKind::CitationMarker;
        }

        if !self.options.keep_empty && block.is_empty() {
            return None;
        }
        Some(block)
    }

    /// Gather runs from a paragraph, descending into inline containers.
    fn collect_runs(&self, node: Node, base: &RunProps, link: Option<&Hyperlink>, out: &mut RunCollector) {
        for child in node.children().filter(|n| is_w(n)) {
            match child.tag_name().name() {
                "r" => self.run(child, base, link, out),
                "hyperlink" => {
                    let link = hyperlink(child);
                    self.collect_runs(child, base, Some(&link), out);
                }
                "fldSimple" => {
                    let mut run = TextRun::opaque(paragraph_text(child), &self.markup[child.range()]);
                    run.link = link.cloned();
                    out.runs.push(run);
                }
                "ins" | "moveTo" | "smartTag" | "customXml" | "dir" | "bdo" => {
                    self.collect_runs(child, base, link, out)
                }
                "sdt" => {
                    if let Some(content) = child.children().find(|n| is_w_named(n, "sdtContent")) {
                        self.collect_runs(content, base, link, out);
                    }
                }
                // Deleted revisions and properties carry no visible text.
                _ => {}
            }
        }
    }

    fn run(&self, node: Node, base: &RunProps, link: Option<&Hyperlink>, out: &mut RunCollector) {
        if node
            .descendants()
            .any(|n| is_w_named(&n, "drawing") || is_w_named(&n, "pict") || is_w_named(&n, "object"))
        {
            out.has_graphic = true;
        }

        let rpr = node.children().find(|n| is_w_named(n, "rPr"));
        let character = rpr
            .and_then(|p| p.children().find(|n| is_w_named(n, "rStyle")))
            .and_then(|s| w_attr(s, "val"))
            .map(|id| self.styles.resolve(id).run)
            .unwrap_or_default();
        let direct = rpr.map(RunProps::from_node).unwrap_or_default();
        let style = base.overlay(&character).overlay(&direct).to_text_style();

        let mut text = String::new();
        let mut opaque = false;
        for child in node.children().filter(|n| is_w(n)) {
            match child.tag_name().name() {
                "t" => text.push_str(child.text().unwrap_or("")),
                "tab" | "ptab" => text.push('\t'),
                "br" | "cr" => text.push('\n'),
                "noBreakHyphen" => text.push('-'),
                name if OPAQUE_RUN_CHILDREN.contains(&name) => opaque = true,
                _ => {}
            }
        }

        let mut run = if opaque {
            TextRun::opaque(text, &self.markup[node.range()])
        } else if text.is_empty() {
            return;
        } else {
            TextRun::new(text)
        };
        run.style = style;
        run.link = link.cloned();
        out.runs.push(run);
    }

    fn table(&self, node: Node) -> Block {
        let mut table = Table::new();
        table.markup = self.markup[node.range()].to_string();

        for tr in node.children().filter(|n| is_w_named(n, "tr")) {
            let is_header = tr
                .children()
                .find(|n| is_w_named(n, "trPr"))
                .map_or(false, |p| {
                    p.children()
                        .any(|n| is_w_named(&n, "tblHeader") && on_off(n))
                });

            let cells = tr
                .children()
                .filter(|n| is_w_named(n, "tc"))
                .map(|tc| {
                    let colspan = tc
                        .children()
                        .find(|n| is_w_named(n, "tcPr"))
                        .and_then(|p| p.children().find(|n| is_w_named(n, "gridSpan")))
                        .and_then(|g| w_attr(g, "val"))
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(1)
                        .max(1);
                    let text = tc
                        .descendants()
                        .filter(|n| is_w_named(n, "p"))
                        .map(paragraph_text)
                        .collect::<Vec<_>>()
                        .join("\n");
                    TableCell { text, colspan }
                })
                .collect();

            table.add_row(TableRow { cells, is_header });
        }

        let mut block = Block::table(table);
        if let Some(style) = node
            .children()
            .find(|n| is_w_named(n, "tblPr"))
            .and_then(|p| p.children().find(|n| is_w_named(n, "tblStyle")))
            .and_then(|s| w_attr(s, "val"))
        {
            block.style.style_id = Some(style.to_string());
            block.style.style_name = self.styles.name_of(style).map(String::from);
        }
        block
    }
}

/// Visible text of a paragraph without formatting.
fn paragraph_text(p: Node) -> String {
    let mut text = String::new();
    for n in p.descendants().filter(|n| is_w(n)) {
        match n.tag_name().name() {
            "t" => text.push_str(n.text().unwrap_or("")),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Join neighbouring runs that share a style.
fn merge_runs(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(last) if last.can_merge(&run) => last.text.push_str(&run.text),
            _ => merged.push(run),
        }
    }
    merged
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:\[\s*\d+(?:\s*[-–,]\s*\d+)*\s*\]\s*)+$").unwrap()
    })
}

fn superscript_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\s*[-–,]\s*\d+)*$").unwrap())
}

/// A paragraph holding nothing but a bracketed or superscript marker.
fn is_citation_marker(block: &Block) -> bool {
    let text = block.plain_text();
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    marker_regex().is_match(text)
        || (block.is_all_superscript() && superscript_marker_regex().is_match(text))
}

/// Attach caption paragraphs that directly precede a table.
fn attach_table_captions(blocks: &mut [Block]) {
    for i in 1..blocks.len() {
        let (before, rest) = blocks.split_at_mut(i);
        let previous = &before[i - 1];
        if !previous.style.is_named("Caption") {
            continue;
        }
        if let BlockKind::Table(table) = &mut rest[0].kind {
            table.caption = Some(previous.plain_text().trim().to_string());
        }
    }
}

/// Namespace declarations and attributes of the root, as written.
/// Attributes of a `w:hyperlink`, with their source prefixes.
fn hyperlink(node: Node) -> Hyperlink {
    Hyperlink {
        attributes: qualified_attributes(node),
    }
}

fn qualified_attributes(node: Node) -> Vec<(String, String)> {
    node.attributes()
        .map(|attr| {
            let name = match attr.namespace().and_then(|uri| node.lookup_prefix(uri)) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
                _ => attr.name().to_string(),
            };
            (name, attr.value().to_string())
        })
        .collect()
}

fn root_attributes(root: Node) -> Vec<(String, String)> {
    let mut attributes = Vec::new();

    for ns in root.namespaces() {
        match ns.name() {
            Some("xml") => {}
            Some(prefix) => attributes.push((format!("xmlns:{}", prefix), ns.uri().to_string())),
            None => attributes.push(("xmlns".to_string(), ns.uri().to_string())),
        }
    }

    attributes.extend(qualified_attributes(root));
    attributes
}

/// Read title, creator and dates from `docProps/core.xml`.
pub fn parse_core_properties(xml: &str) -> Metadata {
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("ignoring unreadable core properties: {}", e);
            return Metadata::default();
        }
    };

    let field = |name: &str| {
        doc.root_element()
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .and_then(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    };
    let date = |name: &str| {
        field(name)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc))
    };

    Metadata {
        title: field("title"),
        author: field("creator"),
        created: date("created"),
        modified: date("modified"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Classification;
    use crate::test_support::{document_xml, paragraph_xml, sized_paragraph_xml, styled_paragraph_xml, W_NS};

    fn build(body: &str) -> Result<Document> {
        build_document(
            &document_xml(body),
            &StyleSheet::empty(),
            &BuildOptions::default(),
            &StageBudget::unlimited("build"),
        )
    }

    #[test]
    fn test_paragraph_runs_and_emphasis() {
        let body = r#"<w:p><w:r><w:t xml:space="preserve">Plain </w:t></w:r><w:r><w:rPr><w:b/><w:i/></w:rPr><w:t>bold italic</w:t></w:r><w:r><w:br/><w:t>next</w:t></w:r></w:p>"#;
        let doc = build(body).unwrap();
        assert_eq!(doc.block_count(), 1);

        let block = &doc.blocks[0];
        assert_eq!(block.kind, BlockKind::Paragraph);
        assert_eq!(block.plain_text(), "Plain bold italic\nnext");
        assert!(block.runs[1].style.bold && block.runs[1].style.italic);
        assert_eq!(block.label, Classification::Unclassified);
    }

    #[test]
    fn test_heading_by_style_name() {
        let styles_xml = format!(
            r#"<w:styles xmlns:w="{}"><w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/></w:style></w:styles>"#,
            W_NS
        );
        let styles = StyleSheet::parse(&styles_xml, roxmltree::ParsingOptions::default());
        let doc = build_document(
            &document_xml(&styled_paragraph_xml("Heading2", "Methods")),
            &styles,
            &BuildOptions::default(),
            &StageBudget::default(),
        )
        .unwrap();

        assert_eq!(doc.blocks[0].kind, BlockKind::Heading { level: 2 });
        assert_eq!(doc.blocks[0].style.style_name.as_deref(), Some("heading 2"));
    }

    #[test]
    fn test_heading_by_outline_level() {
        let body = r#"<w:p><w:pPr><w:outlineLvl w:val="0"/></w:pPr><w:r><w:t>Intro</w:t></w:r></w:p>"#;
        let doc = build(body).unwrap();
        assert_eq!(doc.blocks[0].heading_level(), Some(1));
    }

    #[test]
    fn test_bibliography_style() {
        let doc = build(&styled_paragraph_xml("Bibliography", "Doe, A. (2019). Work.")).unwrap();
        assert_eq!(doc.blocks[0].kind, BlockKind::ReferenceEntry);
    }

    #[test]
    fn test_citation_marker_paragraph() {
        let doc = build(&(paragraph_xml("[3]") + &paragraph_xml("[3] is cited"))).unwrap();
        assert_eq!(doc.blocks[0].kind, BlockKind::CitationMarker);
        assert_eq!(doc.blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_deleted_text_skipped_inserted_kept() {
        let body = r#"<w:p><w:del><w:r><w:delText>old</w:delText></w:r></w:del><w:ins><w:r><w:t>new</w:t></w:r></w:ins></w:p>"#;
        let doc = build(body).unwrap();
        assert_eq!(doc.blocks[0].plain_text(), "new");
    }

    #[test]
    fn test_content_control_descended() {
        let body = format!(
            "<w:sdt><w:sdtPr/><w:sdtContent>{}</w:sdtContent></w:sdt>",
            paragraph_xml("Inside control")
        );
        let doc = build(&body).unwrap();
        assert_eq!(doc.blocks[0].plain_text(), "Inside control");
    }

    #[test]
    fn test_table_cells_and_markup() {
        let body = r#"<w:tbl><w:tr><w:trPr><w:tblHeader/></w:trPr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let doc = build(body).unwrap();

        let BlockKind::Table(table) = &doc.blocks[0].kind else {
            panic!("expected table");
        };
        assert!(table.rows[0].is_header);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.rows[0].cells[1].text, "B");
        assert!(table.markup.starts_with("<w:tbl>"));
    }

    #[test]
    fn test_figure_keeps_markup() {
        let body = r#"<w:p><w:r><w:drawing><wp:inline xmlns:wp="urn:wp"/></w:drawing></w:r></w:p>"#;
        let doc = build(body).unwrap();
        match &doc.blocks[0].kind {
            BlockKind::Figure { markup } => assert!(markup.contains("w:drawing")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_paragraphs_dropped() {
        let body = "<w:p/>".to_string() + &paragraph_xml("kept");
        assert_eq!(build(&body).unwrap().block_count(), 1);

        let doc = build_document(
            &document_xml(&body),
            &StyleSheet::empty(),
            &BuildOptions::new().with_keep_empty(true),
            &StageBudget::default(),
        )
        .unwrap();
        assert_eq!(doc.block_count(), 2);
    }

    #[test]
    fn test_section_properties_captured() {
        let body = r#"<w:p><w:r><w:t>x</w:t></w:r></w:p><w:sectPr><w:headerReference w:type="default"/><w:pgSz w:w="12240" w:h="15840"/><w:pgNumType w:start="1"/></w:sectPr>"#;
        let doc = build(body).unwrap();
        assert_eq!(doc.markup.section_children.len(), 2);
        assert!(doc.markup.section_children[0].starts_with("<w:headerReference"));
        assert!(doc
            .markup
            .root_attributes
            .iter()
            .any(|(k, v)| k == "xmlns:w" && v == W_NS));
    }

    #[test]
    fn test_malformed_markup() {
        let err = build_document(
            "<w:document><w:body>",
            &StyleSheet::empty(),
            &BuildOptions::default(),
            &StageBudget::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMarkup(_)));
    }

    #[test]
    fn test_wrong_root_and_missing_body() {
        let wrong_root = format!(r#"<w:styles xmlns:w="{}"/>"#, W_NS);
        let missing_body = format!(r#"<w:document xmlns:w="{}"/>"#, W_NS);
        for xml in [wrong_root, missing_body] {
            let result = build_document(
                &xml,
                &StyleSheet::empty(),
                &BuildOptions::default(),
                &StageBudget::default(),
            );
            assert!(matches!(result, Err(Error::MalformedMarkup(_))));
        }
    }

    #[test]
    fn test_node_limit() {
        let body = paragraph_xml("a").repeat(50);
        let result = build_document(
            &document_xml(&body),
            &StyleSheet::empty(),
            &BuildOptions::new().with_node_limit(20),
            &StageBudget::default(),
        );
        assert!(matches!(result, Err(Error::MalformedMarkup(_))));
    }

    #[test]
    fn test_core_properties() {
        let xml = r#"<cp:coreProperties xmlns:cp="urn:cp" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/"><dc:title>Paper</dc:title><dc:creator>J. Smith</dc:creator><dcterms:created>2024-03-01T10:00:00Z</dcterms:created></cp:coreProperties>"#;
        let meta = parse_core_properties(xml);
        assert_eq!(meta.title.as_deref(), Some("Paper"));
        assert_eq!(meta.author.as_deref(), Some("J. Smith"));
        assert!(meta.created.is_some());
        assert!(meta.modified.is_none());
    }

    #[test]
    fn test_run_font_size() {
        let body = format!(
            "{}{}{}",
            sized_paragraph_xml("A Large Title", 18.0),
            sized_paragraph_xml("Body text that is long enough to dominate.", 12.0),
            sized_paragraph_xml("More body text.", 12.0)
        );
        let doc = build(&body).unwrap();
        assert_eq!(doc.blocks[0].runs[0].style.font_size, Some(18.0));

        let stats = crate::analyze::FontStatistics::from_blocks(&doc.blocks);
        assert_eq!(stats.body_size, 12.0);
        assert!(stats.is_prominent(18.0, 1.2));
    }

    #[test]
    fn test_parser_over_package() {
        let package = crate::test_support::minimal_package(&paragraph_xml("From package"));
        let doc = DocxParser::new(&package).parse().unwrap();
        assert_eq!(doc.blocks[0].plain_text(), "From package");
    }
}
