//! Semantic labels assigned by the section classifier.

use serde::{Deserialize, Serialize};

/// The semantic label of a block.
///
/// Blocks are built `Unclassified`; only the classifier assigns the other
/// labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "label", content = "level", rename_all = "snake_case")]
pub enum Classification {
    /// Not yet classified
    #[default]
    Unclassified,
    /// Manuscript title
    Title,
    /// Author names and affiliations
    AuthorBlock,
    /// Abstract label and body
    AbstractBlock,
    /// Section heading with its depth (1 = top level)
    Heading(u8),
    /// Ordinary body paragraph
    BodyText,
    /// Figure (drawing or picture)
    Figure,
    /// Table
    Table,
    /// Stand-alone citation marker
    CitationMarker,
    /// Entry in the reference list
    ReferenceEntry,
}

impl Classification {
    /// Short name used in reports and JSON summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Classification::Unclassified => "unclassified",
            Classification::Title => "title",
            Classification::AuthorBlock => "authors",
            Classification::AbstractBlock => "abstract",
            Classification::Heading(_) => "heading",
            Classification::BodyText => "body",
            Classification::Figure => "figure",
            Classification::Table => "table",
            Classification::CitationMarker => "citation",
            Classification::ReferenceEntry => "reference",
        }
    }

    /// Check if the label has been assigned.
    pub fn is_classified(&self) -> bool {
        !matches!(self, Classification::Unclassified)
    }

    /// Heading depth, if this is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Classification::Heading(level) => Some(*level),
            _ => None,
        }
    }

    /// Check if text in blocks with this label may carry citation markers.
    pub fn may_cite(&self) -> bool {
        matches!(
            self,
            Classification::BodyText | Classification::AbstractBlock | Classification::CitationMarker
        )
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Heading(level) => write!(f, "heading{}", level),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unclassified() {
        let label = Classification::default();
        assert!(!label.is_classified());
        assert!(Classification::BodyText.is_classified());
    }

    #[test]
    fn test_display() {
        assert_eq!(Classification::Heading(2).to_string(), "heading2");
        assert_eq!(Classification::ReferenceEntry.to_string(), "reference");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Classification::Heading(1)).unwrap();
        assert_eq!(json, r#"{"label":"heading","level":1}"#);
        let json = serde_json::to_string(&Classification::Title).unwrap();
        assert_eq!(json, r#"{"label":"title"}"#);
    }
}
