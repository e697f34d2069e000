//! Classifier thresholds and label sets.

use serde::{Deserialize, Serialize};

/// Options for the section classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// A title candidate must be this much larger than body text, unless
    /// it is styled `Title`
    pub title_font_ratio: f32,

    /// Number of non-empty blocks before the first heading searched for a title
    pub title_scan_limit: usize,

    /// Longest line (in characters) accepted as an author line
    pub author_max_len: usize,

    /// Literal labels that introduce the abstract
    pub abstract_labels: Vec<String>,

    /// Heading texts that open the reference list
    pub reference_labels: Vec<String>,
}

impl ClassifierOptions {
    /// Create classifier options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title font ratio.
    pub fn with_title_font_ratio(mut self, ratio: f32) -> Self {
        self.title_font_ratio = ratio;
        self
    }

    /// Set how many blocks are scanned for a title.
    pub fn with_title_scan_limit(mut self, limit: usize) -> Self {
        self.title_scan_limit = limit;
        self
    }

    /// Set the maximum author line length.
    pub fn with_author_max_len(mut self, len: usize) -> Self {
        self.author_max_len = len;
        self
    }

    /// Add a reference heading label.
    pub fn with_reference_label(mut self, label: impl Into<String>) -> Self {
        self.reference_labels.push(label.into().to_lowercase());
        self
    }

    /// Add an abstract label.
    pub fn with_abstract_label(mut self, label: impl Into<String>) -> Self {
        self.abstract_labels.push(label.into().to_lowercase());
        self
    }

    pub(crate) fn is_reference_label(&self, normalized: &str) -> bool {
        self.reference_labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case(normalized))
    }

    pub(crate) fn is_abstract_label(&self, normalized: &str) -> bool {
        self.abstract_labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case(normalized))
    }
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            title_font_ratio: 1.15,
            title_scan_limit: 8,
            author_max_len: 300,
            abstract_labels: vec!["abstract".to_string()],
            reference_labels: vec![
                "references".to_string(),
                "bibliography".to_string(),
                "works cited".to_string(),
                "literature cited".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels() {
        let options = ClassifierOptions::default();
        assert!(options.is_reference_label("works cited"));
        assert!(options.is_reference_label("References"));
        assert!(!options.is_reference_label("appendix"));
        assert!(options.is_abstract_label("abstract"));
    }

    #[test]
    fn test_builder() {
        let options = ClassifierOptions::new()
            .with_title_font_ratio(1.5)
            .with_reference_label("Sources");
        assert_eq!(options.title_font_ratio, 1.5);
        assert!(options.is_reference_label("sources"));
    }
}
