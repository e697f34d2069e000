//! Rendering result with warnings and statistics.

use serde::{Deserialize, Serialize};

use crate::model::{Document, Reference};

/// Result of rendering a classified document with a template.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The reformatted document
    pub document: Document,

    /// References in output order
    pub references: Vec<Reference>,

    /// The rewritten package
    pub bytes: Vec<u8>,

    /// Non-fatal problems found while rendering
    pub warnings: Vec<RenderWarning>,

    /// Rendering statistics
    pub stats: RenderStats,
}

/// A non-fatal rendering problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    /// A citation marker names a reference that does not exist; the marker
    /// was left as written
    UnresolvedCitation {
        /// Block holding the marker
        block: usize,
        /// Marker text
        text: String,
    },
    /// A reference lacked authors or a title and was written verbatim
    RawReference {
        /// Output number of the reference
        number: usize,
    },
}

impl std::fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderWarning::UnresolvedCitation { block, text } => {
                write!(f, "unresolved citation {} in block {}", text, block)
            }
            RenderWarning::RawReference { number } => {
                write!(f, "reference {} kept verbatim", number)
            }
        }
    }
}

/// Statistics collected while reformatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Blocks in the output document
    pub block_count: u32,

    /// Headings that received a number
    pub numbered_headings: u32,

    /// Citation markers rewritten
    pub citations_rewritten: u32,

    /// Reference entries written
    pub reference_count: u32,
}

impl RenderStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &RenderStats) {
        self.block_count += other.block_count;
        self.numbered_headings += other.numbered_headings;
        self.citations_rewritten += other.citations_rewritten;
        self.reference_count += other.reference_count;
    }
}
