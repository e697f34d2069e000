//! Builder options and configuration.

use serde::{Deserialize, Serialize};

/// Options for building a document model from markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Maximum number of XML nodes accepted in one part
    pub node_limit: u32,

    /// Keep paragraphs that have no visible text
    pub keep_empty: bool,

    /// Read title and author from the core properties part
    pub extract_metadata: bool,
}

impl BuildOptions {
    /// Create new build options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the XML node limit.
    pub fn with_node_limit(mut self, limit: u32) -> Self {
        self.node_limit = limit;
        self
    }

    /// Keep or drop empty paragraphs.
    pub fn with_keep_empty(mut self, keep: bool) -> Self {
        self.keep_empty = keep;
        self
    }

    /// Enable or disable metadata extraction.
    pub fn with_metadata(mut self, extract: bool) -> Self {
        self.extract_metadata = extract;
        self
    }

    pub(crate) fn xml_options(&self) -> roxmltree::ParsingOptions {
        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = false;
        options.nodes_limit = self.node_limit;
        options
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            node_limit: 2_000_000,
            keep_empty: false,
            extract_metadata: true,
        }
    }
}
