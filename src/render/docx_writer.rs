//! WordprocessingML serialization of a reformatted document.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::budget::StageBudget;
use crate::error::Result;
use crate::model::{Block, BlockKind, Document, Hyperlink, ParagraphStyle, Table, TextRun};
use crate::parser::W_NS;
use crate::template::{PageGeometry, Template};

/// Section children written before the page size.
const LEADING_SECTION_CHILDREN: [&str; 5] =
    ["headerReference", "footerReference", "footnotePr", "endnotePr", "type"];

/// Section children written between the margins and the columns.
const MIDDLE_SECTION_CHILDREN: [&str; 4] = ["paperSrc", "pgBorders", "lnNumType", "pgNumType"];

/// Twips per point.
const TWIPS: f32 = 20.0;

type XmlWriter = Writer<Vec<u8>>;

/// Serialize a document as the main document part.
///
/// The source root namespace declarations and section properties are kept;
/// page size, margins and columns come from the template. Figures and
/// tables that carry source markup are written verbatim.
pub fn write_document(doc: &Document, template: &Template, budget: &StageBudget) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut root = BytesStart::new("w:document");
    for (name, value) in &doc.markup.root_attributes {
        root.push_attribute((name.as_str(), value.as_str()));
    }
    if !doc.markup.root_attributes.iter().any(|(name, _)| name == "xmlns:w") {
        root.push_attribute(("xmlns:w", W_NS));
    }
    writer.write_event(Event::Start(root))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    let content_width = content_width(&template.page);
    for block in &doc.blocks {
        budget.check()?;
        write_block(&mut writer, block, content_width)?;
    }

    write_section(&mut writer, &doc.markup.section_children, &template.page)?;

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;
    Ok(writer.into_inner())
}

fn content_width(page: &PageGeometry) -> u32 {
    let text = page.width.saturating_sub(page.margin_left + page.margin_right);
    let gaps = page.column_gap.saturating_mul(page.columns.saturating_sub(1));
    text.saturating_sub(gaps) / page.columns.max(1)
}

fn write_block(writer: &mut XmlWriter, block: &Block, content_width: u32) -> Result<()> {
    match &block.kind {
        BlockKind::Figure { markup } if !markup.is_empty() => write_raw(writer, markup),
        BlockKind::Table(table) if !table.markup.is_empty() => write_raw(writer, &table.markup),
        BlockKind::Table(table) => write_table(writer, table, content_width),
        _ => write_paragraph(writer, block),
    }
}

fn write_raw(writer: &mut XmlWriter, markup: &str) -> Result<()> {
    writer.write_event(Event::Text(BytesText::from_escaped(markup)))?;
    Ok(())
}

fn empty(writer: &mut XmlWriter, name: &str, attributes: &[(&str, String)]) -> Result<()> {
    let mut element = BytesStart::new(name);
    for (key, value) in attributes {
        element.push_attribute((*key, value.as_str()));
    }
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn twips(points: f32) -> String {
    ((points * TWIPS).round() as i64).to_string()
}

fn write_paragraph(writer: &mut XmlWriter, block: &Block) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    write_paragraph_properties(writer, &block.style, block.label.heading_level())?;

    let mut open_link: Option<&Hyperlink> = None;
    for run in &block.runs {
        if run.link.as_ref() != open_link {
            if open_link.is_some() {
                writer.write_event(Event::End(BytesEnd::new("w:hyperlink")))?;
            }
            if let Some(link) = &run.link {
                let mut element = BytesStart::new("w:hyperlink");
                for (name, value) in &link.attributes {
                    element.push_attribute((name.as_str(), value.as_str()));
                }
                writer.write_event(Event::Start(element))?;
            }
            open_link = run.link.as_ref();
        }
        write_run(writer, run)?;
    }
    if open_link.is_some() {
        writer.write_event(Event::End(BytesEnd::new("w:hyperlink")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_paragraph_properties(
    writer: &mut XmlWriter,
    style: &ParagraphStyle,
    heading_level: Option<u8>,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;

    if style.keep_with_next {
        empty(writer, "w:keepNext", &[])?;
    }

    let mut spacing = Vec::new();
    if let Some(before) = style.space_before {
        spacing.push(("w:before", twips(before)));
    }
    if let Some(after) = style.space_after {
        spacing.push(("w:after", twips(after)));
    }
    if let Some(line) = style.line_spacing {
        spacing.push(("w:line", ((line * 240.0).round() as i64).to_string()));
        spacing.push(("w:lineRule", "auto".to_string()));
    }
    if !spacing.is_empty() {
        empty(writer, "w:spacing", &spacing)?;
    }

    let mut indent = Vec::new();
    if let Some(left) = style.left_indent {
        indent.push(("w:left", twips(left)));
    }
    match style.first_line_indent {
        Some(first) if first < 0.0 => indent.push(("w:hanging", twips(-first))),
        Some(first) if first > 0.0 => indent.push(("w:firstLine", twips(first))),
        _ => {}
    }
    if !indent.is_empty() {
        empty(writer, "w:ind", &indent)?;
    }

    empty(writer, "w:jc", &[("w:val", style.alignment.as_markup().to_string())])?;

    if let Some(level) = heading_level {
        empty(writer, "w:outlineLvl", &[("w:val", (level.clamp(1, 9) - 1).to_string())])?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    Ok(())
}

fn write_run(writer: &mut XmlWriter, run: &TextRun) -> Result<()> {
    if let Some(markup) = &run.markup {
        return write_raw(writer, markup);
    }
    if run.text.is_empty() {
        return Ok(());
    }
    let style = &run.style;
    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;

    if let Some(font) = &style.font_name {
        empty(
            writer,
            "w:rFonts",
            &[
                ("w:ascii", font.clone()),
                ("w:hAnsi", font.clone()),
                ("w:cs", font.clone()),
            ],
        )?;
    }
    if style.bold {
        empty(writer, "w:b", &[])?;
    }
    if style.italic {
        empty(writer, "w:i", &[])?;
    }
    if style.small_caps {
        empty(writer, "w:smallCaps", &[])?;
    }
    if style.strikethrough {
        empty(writer, "w:strike", &[])?;
    }
    if let Some(size) = style.font_size {
        let half_points = ((size * 2.0).round() as i64).to_string();
        empty(writer, "w:sz", &[("w:val", half_points.clone())])?;
        empty(writer, "w:szCs", &[("w:val", half_points)])?;
    }
    if style.underline {
        empty(writer, "w:u", &[("w:val", "single".to_string())])?;
    }
    if style.superscript || style.subscript {
        let position = if style.superscript { "superscript" } else { "subscript" };
        empty(writer, "w:vertAlign", &[("w:val", position.to_string())])?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;

    let mut pending = String::new();
    for c in run.text.chars() {
        match c {
            '\t' | '\n' => {
                write_text(writer, &mut pending)?;
                empty(writer, if c == '\t' { "w:tab" } else { "w:br" }, &[])?;
            }
            c => pending.push(c),
        }
    }
    write_text(writer, &mut pending)?;

    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    Ok(())
}

fn write_text(writer: &mut XmlWriter, pending: &mut String) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    let mut element = BytesStart::new("w:t");
    element.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(element))?;
    writer.write_event(Event::Text(BytesText::new(pending)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    pending.clear();
    Ok(())
}

/// Build a plain grid table for tables without source markup.
fn write_table(writer: &mut XmlWriter, table: &Table, content_width: u32) -> Result<()> {
    let columns = table.column_count().max(1) as u32;
    let column_width = (content_width / columns).to_string();

    writer.write_event(Event::Start(BytesStart::new("w:tbl")))?;
    writer.write_event(Event::Start(BytesStart::new("w:tblPr")))?;
    empty(writer, "w:tblW", &[("w:w", "0".to_string()), ("w:type", "auto".to_string())])?;
    writer.write_event(Event::End(BytesEnd::new("w:tblPr")))?;

    writer.write_event(Event::Start(BytesStart::new("w:tblGrid")))?;
    for _ in 0..columns {
        empty(writer, "w:gridCol", &[("w:w", column_width.clone())])?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:tblGrid")))?;

    for row in &table.rows {
        writer.write_event(Event::Start(BytesStart::new("w:tr")))?;
        if row.is_header {
            writer.write_event(Event::Start(BytesStart::new("w:trPr")))?;
            empty(writer, "w:tblHeader", &[])?;
            writer.write_event(Event::End(BytesEnd::new("w:trPr")))?;
        }
        for cell in &row.cells {
            writer.write_event(Event::Start(BytesStart::new("w:tc")))?;
            if cell.colspan > 1 {
                writer.write_event(Event::Start(BytesStart::new("w:tcPr")))?;
                empty(writer, "w:gridSpan", &[("w:val", cell.colspan.to_string())])?;
                writer.write_event(Event::End(BytesEnd::new("w:tcPr")))?;
            }
            writer.write_event(Event::Start(BytesStart::new("w:p")))?;
            write_run(writer, &TextRun::new(cell.text.as_str()))?;
            writer.write_event(Event::End(BytesEnd::new("w:p")))?;
            writer.write_event(Event::End(BytesEnd::new("w:tc")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("w:tr")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:tbl")))?;
    Ok(())
}

/// Local name of a verbatim element, e.g. `titlePg` for `<w:titlePg/>`.
fn local_name(markup: &str) -> &str {
    let tag = markup.trim_start().trim_start_matches('<');
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(tag.len());
    let qualified = &tag[..end];
    qualified.rsplit(':').next().unwrap_or(qualified)
}

fn write_section(writer: &mut XmlWriter, children: &[String], page: &PageGeometry) -> Result<()> {
    let in_group = |group: &[&str], child: &String| group.contains(&local_name(child));

    writer.write_event(Event::Start(BytesStart::new("w:sectPr")))?;

    for child in children.iter().filter(|c| in_group(&LEADING_SECTION_CHILDREN, c)) {
        write_raw(writer, child)?;
    }

    let mut size = vec![("w:w", page.width.to_string()), ("w:h", page.height.to_string())];
    if page.width > page.height {
        size.push(("w:orient", "landscape".to_string()));
    }
    empty(writer, "w:pgSz", &size)?;
    empty(
        writer,
        "w:pgMar",
        &[
            ("w:top", page.margin_top.to_string()),
            ("w:right", page.margin_right.to_string()),
            ("w:bottom", page.margin_bottom.to_string()),
            ("w:left", page.margin_left.to_string()),
            ("w:header", "720".to_string()),
            ("w:footer", "720".to_string()),
            ("w:gutter", "0".to_string()),
        ],
    )?;

    for child in children.iter().filter(|c| in_group(&MIDDLE_SECTION_CHILDREN, c)) {
        write_raw(writer, child)?;
    }

    let gap = if page.columns > 1 { page.column_gap } else { 720 };
    empty(
        writer,
        "w:cols",
        &[("w:num", page.columns.to_string()), ("w:space", gap.to_string())],
    )?;

    for child in children.iter().filter(|c| {
        !in_group(&LEADING_SECTION_CHILDREN, c) && !in_group(&MIDDLE_SECTION_CHILDREN, c)
    }) {
        write_raw(writer, child)?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:sectPr")))?;
    Ok(())
}
