//! Declarative style templates.
//!
//! A template is pure data: the renderer never branches on a template's
//! name, only on the values it carries.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Alignment, Classification};

/// Placeholders understood in reference entry formats.
pub const ENTRY_PLACEHOLDERS: [&str; 6] = ["n", "authors", "year", "title", "venue", "doi"];

/// Placeholders understood in citation item formats.
pub const CITATION_PLACEHOLDERS: [&str; 3] = ["n", "surname", "year"];

/// Largest page dimension or margin in twips (22 inches).
pub const MAX_TWIPS: u32 = 31_680;

/// A named style template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Registry key, lowercase (e.g. "ieee")
    pub name: String,

    /// Human-readable name (e.g. "IEEE Conference")
    pub display_name: String,

    /// One-line description
    #[serde(default)]
    pub description: String,

    /// Page size, margins and columns
    pub page: PageGeometry,

    /// Block styles per role
    pub styles: RoleStyles,

    /// Heading numbering scheme
    #[serde(default)]
    pub heading_numbering: HeadingNumbering,

    /// In-text citation format
    pub citation: CitationFormat,

    /// Reference list format
    pub references: ReferenceFormat,
}

/// Page geometry in twips (1/20 pt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Page width
    pub width: u32,
    /// Page height
    pub height: u32,
    /// Top margin
    pub margin_top: u32,
    /// Bottom margin
    pub margin_bottom: u32,
    /// Left margin
    pub margin_left: u32,
    /// Right margin
    pub margin_right: u32,
    /// Number of text columns
    #[serde(default = "default_columns")]
    pub columns: u32,
    /// Space between columns
    #[serde(default)]
    pub column_gap: u32,
}

fn default_columns() -> u32 {
    1
}

/// Formatting applied to every block of a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockStyle {
    /// Font family
    pub font_family: String,
    /// Font size in points
    pub font_size: f32,
    /// Bold
    pub bold: bool,
    /// Italic
    pub italic: bool,
    /// Small capitals
    pub small_caps: bool,
    /// Paragraph alignment
    pub alignment: Alignment,
    /// Line spacing multiplier
    pub line_spacing: f32,
    /// Space before in points
    pub space_before: f32,
    /// Space after in points
    pub space_after: f32,
    /// First line indent in points
    pub first_line_indent: f32,
    /// Hanging indent in points
    pub hanging_indent: f32,
}

impl Default for BlockStyle {
    fn default() -> Self {
        Self {
            font_family: "Times New Roman".to_string(),
            font_size: 12.0,
            bold: false,
            italic: false,
            small_caps: false,
            alignment: Alignment::Left,
            line_spacing: 1.0,
            space_before: 0.0,
            space_after: 0.0,
            first_line_indent: 0.0,
            hanging_indent: 0.0,
        }
    }
}

/// Block styles for each semantic role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleStyles {
    /// Title
    pub title: BlockStyle,
    /// Author lines
    pub authors: BlockStyle,
    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: BlockStyle,
    /// Headings by level; deeper levels reuse the last entry
    pub headings: Vec<BlockStyle>,
    /// Body paragraphs
    pub body: BlockStyle,
    /// Figure and table paragraphs
    pub caption: BlockStyle,
    /// Reference entries
    pub reference: BlockStyle,
}

impl RoleStyles {
    /// Style for a classification.
    pub fn for_label(&self, label: Classification) -> &BlockStyle {
        match label {
            Classification::Title => &self.title,
            Classification::AuthorBlock => &self.authors,
            Classification::AbstractBlock => &self.abstract_text,
            Classification::Heading(level) => self.heading(level),
            Classification::Figure | Classification::Table => &self.caption,
            Classification::ReferenceEntry => &self.reference,
            Classification::BodyText
            | Classification::CitationMarker
            | Classification::Unclassified => &self.body,
        }
    }

    /// Style for a heading level (1-based).
    pub fn heading(&self, level: u8) -> &BlockStyle {
        let index = (level.max(1) as usize - 1).min(self.headings.len().saturating_sub(1));
        self.headings.get(index).unwrap_or(&self.body)
    }

    fn iter(&self) -> impl Iterator<Item = (String, &BlockStyle)> {
        [
            ("title".to_string(), &self.title),
            ("authors".to_string(), &self.authors),
            ("abstract".to_string(), &self.abstract_text),
            ("body".to_string(), &self.body),
            ("caption".to_string(), &self.caption),
            ("reference".to_string(), &self.reference),
        ]
        .into_iter()
        .chain(
            self.headings
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("heading {}", i + 1), s)),
        )
    }
}

/// Heading numbering scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingNumbering {
    /// Headings are not numbered
    #[default]
    None,
    /// `1.`, `1.1`, `1.1.1`
    Decimal,
    /// `I.`, `A.`, `1)`
    Roman,
}

/// In-text citation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    /// Numbered markers
    Numeric,
    /// Surname and year
    AuthorYear,
}

/// How in-text citations are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationFormat {
    /// Numeric or author-year
    pub style: CitationStyle,
    /// Opening delimiter
    pub open: String,
    /// Closing delimiter
    pub close: String,
    /// Separator between cited works
    pub separator: String,
    /// Format of one cited work (`{n}`, `{surname}`, `{year}`)
    pub item: String,
    /// Joiner for a work with exactly two authors (e.g. " & ")
    #[serde(default = "default_two_author_joiner")]
    pub two_author_joiner: String,
    /// Works with at least this many authors are cited as "Surname et al."
    #[serde(default = "default_et_al_min")]
    pub et_al_min: usize,
}

fn default_two_author_joiner() -> String {
    " and ".to_string()
}

fn default_et_al_min() -> usize {
    3
}

/// Reference ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceOrder {
    /// Order of first citation; uncited entries follow in source order
    Appearance,
    /// By first author surname, then year, then title
    Alphabetical,
}

/// How author names are written in the reference list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameOrder {
    /// Names are kept as written in the source
    #[default]
    AsWritten,
    /// `J. Smith`
    InitialsFirst,
    /// `Smith, J.`
    SurnameFirst,
}

/// How the reference list is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFormat {
    /// Heading text of the reference section
    pub heading: String,
    /// Entry ordering
    pub order: ReferenceOrder,
    /// Entry format; `*...*` marks italics and `<...>` a group dropped
    /// when any placeholder inside it is empty
    pub entry: String,
    /// Author name order
    #[serde(default)]
    pub name_order: NameOrder,
    /// Separator between authors
    #[serde(default = "default_author_separator")]
    pub author_separator: String,
    /// Separator before the last of three or more authors
    #[serde(default = "default_last_author_separator")]
    pub last_author_separator: String,
    /// Separator between exactly two authors
    #[serde(default = "default_two_author_joiner")]
    pub two_author_separator: String,
    /// Lists longer than this are cut to the first author and "et al."
    #[serde(default)]
    pub et_al_threshold: Option<usize>,
    /// Move the reference section to the end of the document
    #[serde(default = "default_true")]
    pub at_end: bool,
}

fn default_author_separator() -> String {
    ", ".to_string()
}

fn default_last_author_separator() -> String {
    ", and ".to_string()
}

fn default_true() -> bool {
    true
}

impl Template {
    /// Parse a template from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let template: Template = serde_json::from_str(json)?;
        template.validate()?;
        Ok(template)
    }

    /// Structural validation, run once at registration.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidTemplate {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(invalid("name must be a non-empty word".to_string()));
        }
        if self.styles.headings.is_empty() {
            return Err(invalid("at least one heading style is required".to_string()));
        }
        if self.references.heading.trim().is_empty() {
            return Err(invalid("reference heading is empty".to_string()));
        }

        check_placeholders(&self.references.entry, &ENTRY_PLACEHOLDERS)
            .map_err(|e| invalid(format!("entry format: {}", e)))?;
        check_placeholders(&self.citation.item, &CITATION_PLACEHOLDERS)
            .map_err(|e| invalid(format!("citation item: {}", e)))?;

        let required = match self.citation.style {
            CitationStyle::Numeric => "{n}",
            CitationStyle::AuthorYear => "{surname}",
        };
        if !self.citation.item.contains(required) {
            return Err(invalid(format!("citation item must contain {}", required)));
        }
        Ok(())
    }

    /// Check that every value can be written as WordprocessingML.
    pub fn check_expressible(&self) -> Result<()> {
        let unsupported = |what: String| Error::Render(format!("template '{}': {}", self.name, what));

        for (role, style) in self.styles.iter() {
            let half_points = style.font_size * 2.0;
            if !(2.0..=3276.0).contains(&half_points) || half_points.fract() != 0.0 {
                return Err(unsupported(format!(
                    "{} font size {}pt is not a multiple of 0.5 between 1 and 1638",
                    role, style.font_size
                )));
            }
            let family_len = style.font_family.chars().count();
            if family_len == 0 || family_len > 31 {
                return Err(unsupported(format!(
                    "{} font family must be 1 to 31 characters",
                    role
                )));
            }
            if style.line_spacing <= 0.0 || style.space_before < 0.0 || style.space_after < 0.0 {
                return Err(unsupported(format!("{} spacing is out of range", role)));
            }
        }

        let page = &self.page;
        if page.width == 0 || page.height == 0 || page.width > MAX_TWIPS || page.height > MAX_TWIPS {
            return Err(unsupported("page size is out of range".to_string()));
        }
        let margins = [page.margin_top, page.margin_bottom, page.margin_left, page.margin_right];
        if margins.iter().any(|m| *m > MAX_TWIPS)
            || page.margin_left + page.margin_right >= page.width
            || page.margin_top + page.margin_bottom >= page.height
        {
            return Err(unsupported("margins are out of range".to_string()));
        }
        if !(1..=16).contains(&page.columns) {
            return Err(unsupported(format!(
                "{} columns (must be 1 to 16)",
                page.columns
            )));
        }
        let text_width = page.width - page.margin_left - page.margin_right;
        if page.column_gap > MAX_TWIPS || page.column_gap * (page.columns - 1) >= text_width {
            return Err(unsupported("column gap leaves no room for text".to_string()));
        }
        Ok(())
    }
}

/// Check that every `{placeholder}` is known and braces are balanced.
fn check_placeholders(format: &str, known: &[&str]) -> std::result::Result<(), String> {
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| "unclosed '{'".to_string())?;
        let name = &after[..close];
        if !known.contains(&name) {
            return Err(format!("unknown placeholder {{{}}}", name));
        }
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err("unmatched '}'".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateRegistry;

    fn ieee() -> Template {
        TemplateRegistry::with_builtins()
            .unwrap()
            .resolve("ieee")
            .unwrap()
            .as_ref()
            .clone()
    }

    #[test]
    fn test_builtin_is_expressible() {
        assert!(ieee().check_expressible().is_ok());
    }

    #[test]
    fn test_fractional_size_rejected_at_render() {
        let mut t = ieee();
        t.styles.body.font_size = 10.3;
        assert!(t.validate().is_ok());
        let err = t.check_expressible().unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert!(err.to_string().contains("body font size"));
    }

    #[test]
    fn test_long_font_name_rejected() {
        let mut t = ieee();
        t.styles.headings[0].font_family = "X".repeat(32);
        assert!(matches!(t.check_expressible(), Err(Error::Render(_))));
    }

    #[test]
    fn test_columns_out_of_range() {
        let mut t = ieee();
        t.page.columns = 17;
        assert!(t.check_expressible().is_err());
        t.page.columns = 0;
        assert!(t.check_expressible().is_err());
    }

    #[test]
    fn test_column_gap_out_of_range() {
        let mut t = ieee();
        t.page.column_gap = u32::MAX;
        assert!(matches!(t.check_expressible(), Err(Error::Render(_))));
        t.page.column_gap = t.page.width;
        assert!(t.check_expressible().is_err());
        t.page.columns = 1;
        assert!(t.check_expressible().is_err());
    }

    #[test]
    fn test_margins_out_of_range() {
        let mut t = ieee();
        t.page.margin_left = t.page.width;
        assert!(t.check_expressible().is_err());
    }

    #[test]
    fn test_unknown_placeholder_invalid() {
        let mut t = ieee();
        t.references.entry = "{authors} {publisher}".to_string();
        let err = t.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate { .. }));
        assert!(err.to_string().contains("{publisher}"));
    }

    #[test]
    fn test_numeric_item_needs_number() {
        let mut t = ieee();
        t.citation.item = "{surname}".to_string();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_heading_style_reuses_last() {
        let t = ieee();
        let deepest = t.styles.headings.last().unwrap();
        assert_eq!(t.styles.heading(9), deepest);
        assert_eq!(t.styles.for_label(Classification::Heading(1)), &t.styles.headings[0]);
    }
}
