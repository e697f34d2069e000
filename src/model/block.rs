//! Structural blocks.

use super::{Classification, ParagraphStyle, Table, TextRun, TextStyle};
use serde::{Deserialize, Serialize};

/// One structural unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Structural kind recovered from the markup
    pub kind: BlockKind,

    /// Inline content
    pub runs: Vec<TextRun>,

    /// Paragraph-level style
    pub style: ParagraphStyle,

    /// Semantic label
    pub label: Classification,
}

/// The closed set of structural kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// A heading with its markup-declared depth (1-9)
    Heading {
        /// Heading depth
        level: u8,
    },

    /// A paragraph of text
    Paragraph,

    /// A drawing or picture; `markup` holds the verbatim drawing runs
    Figure {
        /// Verbatim source markup of the graphic runs
        #[serde(skip)]
        markup: String,
    },

    /// A table
    Table(Table),

    /// A paragraph consisting only of a citation marker
    CitationMarker,

    /// A bibliography entry declared by its paragraph style
    ReferenceEntry,
}

impl Block {
    /// Create a block of the given kind with no content.
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            runs: Vec::new(),
            style: ParagraphStyle::default(),
            label: Classification::Unclassified,
        }
    }

    /// Create a paragraph block with plain text.
    pub fn paragraph(text: impl Into<String>) -> Self {
        let mut block = Self::new(BlockKind::Paragraph);
        block.add_text(text);
        block
    }

    /// Create a heading block.
    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        let mut block = Self::new(BlockKind::Heading {
            level: level.clamp(1, 9),
        });
        block.add_text(text);
        block
    }

    /// Create a table block.
    pub fn table(table: Table) -> Self {
        Self::new(BlockKind::Table(table))
    }

    /// Add plain text to the block.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.runs.push(TextRun::new(text));
    }

    /// Add a styled text run.
    pub fn add_run(&mut self, run: TextRun) {
        self.runs.push(run);
    }

    /// Get plain text content of the block.
    pub fn plain_text(&self) -> String {
        match &self.kind {
            BlockKind::Table(table) if self.runs.is_empty() => table.plain_text(),
            _ => self.runs.iter().map(|r| r.text.as_str()).collect(),
        }
    }

    /// Check if the block has no visible text.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            BlockKind::Figure { .. } | BlockKind::Table(_) => false,
            _ => self.plain_text().trim().is_empty() && !self.runs.iter().any(TextRun::is_opaque),
        }
    }

    /// Check if this is a heading.
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, BlockKind::Heading { .. })
    }

    /// Markup-declared heading level, if any.
    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            BlockKind::Heading { level } => Some(level),
            _ => None,
        }
    }

    /// Largest font size among the block's non-empty runs.
    pub fn font_size(&self) -> Option<f32> {
        self.runs
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .filter_map(|r| r.style.font_size)
            .fold(None, |acc: Option<f32>, size| {
                Some(acc.map_or(size, |a| a.max(size)))
            })
    }

    /// Check if every visible run is superscript.
    pub fn is_all_superscript(&self) -> bool {
        let mut visible = self.runs.iter().filter(|r| !r.text.trim().is_empty());
        let mut any = false;
        let all = visible.all(|r| {
            any = true;
            r.style.superscript
        });
        any && all
    }

    /// Replace the block's text, keeping the first run's formatting.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let style = self
            .runs
            .first()
            .map(|r| r.style.clone())
            .unwrap_or_else(TextStyle::default);
        self.runs = vec![TextRun::styled(text, style)];
    }

    /// Replace a byte range of the plain text, spreading the change over
    /// the runs that cover it. The replacement takes the formatting of the
    /// run where the range starts.
    ///
    /// Returns `false` when the range does not fall on character boundaries
    /// or covers text written back as source markup.
    pub fn replace_text_range(&mut self, start: usize, end: usize, replacement: &str) -> bool {
        let total: usize = self.runs.iter().map(|r| r.text.len()).sum();
        if start > end || end > total {
            return false;
        }

        let mut offset = 0;
        for run in &self.runs {
            let run_start = offset;
            offset += run.text.len();
            if run.is_opaque() && start.max(run_start) < end.min(offset) {
                return false;
            }
        }

        let mut offset = 0;
        let mut inserted = false;
        for run in &mut self.runs {
            let run_start = offset;
            let run_end = offset + run.text.len();
            offset = run_end;
            if run.is_opaque() {
                continue;
            }

            let lo = start.max(run_start);
            let hi = end.min(run_end);
            let touches = lo < hi || (!inserted && start == end && start >= run_start && start <= run_end);
            if !touches {
                continue;
            }

            let local_lo = lo - run_start;
            let local_hi = hi.max(lo) - run_start;
            if !run.text.is_char_boundary(local_lo) || !run.text.is_char_boundary(local_hi) {
                return false;
            }

            let text = if inserted { "" } else { replacement };
            run.text.replace_range(local_lo..local_hi, text);
            inserted = true;
        }

        if !inserted {
            self.runs.push(TextRun::new(replacement));
        }
        self.runs.retain(|r| !r.is_empty());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_block() {
        let h = Block::heading("Introduction", 1);
        assert!(h.is_heading());
        assert_eq!(h.heading_level(), Some(1));
        assert_eq!(h.label, Classification::Unclassified);
    }

    #[test]
    fn test_plain_text_concatenates_runs() {
        let mut b = Block::paragraph("Hello ");
        b.add_run(TextRun::bold("world"));
        b.add_text("!");
        assert_eq!(b.plain_text(), "Hello world!");
    }

    #[test]
    fn test_font_size_takes_largest() {
        let mut b = Block::new(BlockKind::Paragraph);
        let mut small = TextRun::new("a");
        small.style.font_size = Some(10.0);
        let mut large = TextRun::new("b");
        large.style.font_size = Some(18.0);
        b.add_run(small);
        b.add_run(large);
        assert_eq!(b.font_size(), Some(18.0));
        assert_eq!(Block::paragraph("x").font_size(), None);
    }

    #[test]
    fn test_replace_range_across_runs() {
        let mut b = Block::paragraph("cites [");
        b.add_run(TextRun::bold("12"));
        b.add_text("] here");
        // "cites [12] here": marker occupies bytes 6..10
        assert!(b.replace_text_range(6, 10, "[3]"));
        assert_eq!(b.plain_text(), "cites [3] here");
    }

    #[test]
    fn test_replace_range_out_of_bounds() {
        let mut b = Block::paragraph("short");
        assert!(!b.replace_text_range(2, 40, "x"));
        assert_eq!(b.plain_text(), "short");
    }

    #[test]
    fn test_replace_range_keeps_opaque_runs() {
        let mut b = Block::paragraph("claim [1]");
        b.add_run(TextRun::opaque("", r#"<w:r><w:footnoteReference w:id="1"/></w:r>"#));
        b.add_text(" more");
        assert!(b.replace_text_range(6, 9, "[2]"));
        assert_eq!(b.plain_text(), "claim [2] more");
        assert_eq!(b.runs.iter().filter(|r| r.is_opaque()).count(), 1);

        let mut field = Block::paragraph("see ");
        field.add_run(TextRun::opaque("[4]", "<w:fldSimple/>"));
        assert!(!field.replace_text_range(4, 7, "[1]"));
        assert_eq!(field.plain_text(), "see [4]");
    }

    #[test]
    fn test_empty_detection() {
        assert!(Block::paragraph("   ").is_empty());
        assert!(!Block::table(Table::new()).is_empty());

        let mut anchor = Block::new(BlockKind::Paragraph);
        anchor.add_run(TextRun::opaque("", "<w:r/>"));
        assert!(!anchor.is_empty());
    }

    #[test]
    fn test_all_superscript() {
        let mut b = Block::new(BlockKind::Paragraph);
        b.add_run(TextRun::superscript("12"));
        assert!(b.is_all_superscript());
        b.add_text("x");
        assert!(!b.is_all_superscript());
        assert!(!Block::new(BlockKind::Paragraph).is_all_superscript());
    }
}
