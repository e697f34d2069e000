//! Run-level and paragraph-level styling types.

use serde::{Deserialize, Serialize};

/// A run of text with consistent styling.
///
/// Line breaks inside a run are represented as `'\n'` and tabs as `'\t'`.
/// Runs carrying `markup` (note anchors, field codes) are written back
/// verbatim; their `text` is only what a reader sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,

    /// Text styling
    pub style: TextStyle,

    /// Source markup that replaces this run on output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,

    /// Hyperlink enclosing this run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Hyperlink>,
}

impl TextRun {
    /// Create a new text run with default style.
    pub fn new(text: impl Into<String>) -> Self {
        Self::styled(text, TextStyle::default())
    }

    /// Create a run with an explicit style.
    pub fn styled(text: impl Into<String>, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            style,
            ..Default::default()
        }
    }

    /// Create a run that is written back as the given source markup.
    pub fn opaque(text: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup.into()),
            ..Default::default()
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                bold: true,
                ..Default::default()
            },
        )
    }

    /// Create an italic text run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                italic: true,
                ..Default::default()
            },
        )
    }

    /// Create a superscript text run.
    pub fn superscript(text: impl Into<String>) -> Self {
        Self::styled(
            text,
            TextStyle {
                superscript: true,
                ..Default::default()
            },
        )
    }

    /// Whether the run is written back as source markup.
    pub fn is_opaque(&self) -> bool {
        self.markup.is_some()
    }

    /// Whether two adjacent runs can be written as one.
    pub fn can_merge(&self, next: &TextRun) -> bool {
        !self.is_opaque() && !next.is_opaque() && self.style == next.style && self.link == next.link
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.markup.is_none()
    }
}

/// A `w:hyperlink` wrapper, kept as its source attributes
/// (`r:id`, `w:anchor`, `w:history`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// Qualified attribute names and values
    pub attributes: Vec<(String, String)>,
}

/// Text styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Bold text
    pub bold: bool,

    /// Italic text
    pub italic: bool,

    /// Underlined text
    pub underline: bool,

    /// Strikethrough text
    pub strikethrough: bool,

    /// Superscript
    pub superscript: bool,

    /// Subscript
    pub subscript: bool,

    /// Small capitals
    pub small_caps: bool,

    /// Font family name
    pub font_name: Option<String>,

    /// Font size in points
    pub font_size: Option<f32>,
}

impl TextStyle {
    /// Check if any emphasis is applied.
    pub fn has_styling(&self) -> bool {
        self.bold
            || self.italic
            || self.underline
            || self.strikethrough
            || self.superscript
            || self.subscript
            || self.small_caps
    }
}

/// Paragraph styling properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    /// Style identifier from the markup (`w:pStyle`)
    pub style_id: Option<String>,

    /// Resolved human-readable style name (e.g. "heading 1", "Title")
    pub style_name: Option<String>,

    /// Text alignment
    pub alignment: Alignment,

    /// Line spacing multiplier (1.0 = single, 2.0 = double)
    pub line_spacing: Option<f32>,

    /// Space before paragraph in points
    pub space_before: Option<f32>,

    /// Space after paragraph in points
    pub space_after: Option<f32>,

    /// Left indent in points
    pub left_indent: Option<f32>,

    /// First line indent in points; negative values are hanging indents
    pub first_line_indent: Option<f32>,

    /// Keep this paragraph on the same page as the next one
    pub keep_with_next: bool,
}

impl ParagraphStyle {
    /// Check if the style name matches (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.style_name
            .as_deref()
            .map(|n| n.eq_ignore_ascii_case(name))
            .unwrap_or(false)
            || self
                .style_id
                .as_deref()
                .map(|id| id.eq_ignore_ascii_case(name))
                .unwrap_or(false)
    }

    /// Check if the paragraph has a hanging indent.
    pub fn has_hanging_indent(&self) -> bool {
        self.first_line_indent.map(|i| i < 0.0).unwrap_or(false)
    }
}

/// Text alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Left alignment (default)
    #[default]
    Left,
    /// Center alignment
    Center,
    /// Right alignment
    Right,
    /// Justified alignment
    Justify,
}

impl Alignment {
    /// Parse a `w:jc` value.
    pub fn from_markup(value: &str) -> Self {
        match value {
            "center" => Alignment::Center,
            "right" | "end" => Alignment::Right,
            "both" | "distribute" => Alignment::Justify,
            _ => Alignment::Left,
        }
    }

    /// The `w:jc` value for this alignment.
    pub fn as_markup(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}
