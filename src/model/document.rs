//! Document-level types.

use super::{Block, Classification};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A manuscript as an ordered sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Package metadata (title, author, etc.)
    pub metadata: Metadata,

    /// Blocks in document order
    pub blocks: Vec<Block>,

    /// Markup context needed to re-emit the document
    #[serde(skip)]
    pub markup: MarkupContext,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from blocks.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Default::default()
        }
    }

    /// Add a block to the document.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Get the number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the document has any blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate over blocks carrying a label.
    pub fn blocks_labelled(&self, label: Classification) -> impl Iterator<Item = (usize, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.label == label)
    }

    /// Check that every block has been classified.
    pub fn is_fully_classified(&self) -> bool {
        self.blocks.iter().all(|b| b.label.is_classified())
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|block| block.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Package metadata from `docProps/core.xml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,
}

/// Markup details carried from the source so the output stays openable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupContext {
    /// Attributes of the source root element, namespace declarations
    /// included, as (qualified name, value)
    pub root_attributes: Vec<(String, String)>,

    /// Verbatim children of the body-level `w:sectPr` other than page size,
    /// margins and columns (header/footer references, page numbering, ...)
    pub section_children: Vec<String>,
}
