//! Bibliographic records and in-text citations.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A structured bibliographic record derived from one reference entry.
///
/// Parsing only annotates: `raw` always holds the original entry text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Original list label (e.g. "1" for `[1]`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Author names in order of appearance
    pub authors: Vec<String>,

    /// Publication year (may carry a suffix like "2020a")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    /// Title of the work
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Journal, proceedings, or publisher
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    /// Digital Object Identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// The verbatim entry text
    pub raw: String,

    /// Index of the source block in the classified document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_block: Option<usize>,
}

impl Reference {
    /// Create a record holding only the raw text.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    /// Surname of the first author, used for sorting and citations.
    pub fn first_surname(&self) -> Option<String> {
        self.authors.first().map(|a| surname_of(a))
    }

    /// Check whether enough fields were recovered to format the entry.
    pub fn is_structured(&self) -> bool {
        !self.authors.is_empty() && self.title.is_some()
    }

    /// Sort key for alphabetical ordering: surname, year, title.
    pub fn sort_key(&self) -> (String, String, String) {
        (
            self.first_surname()
                .unwrap_or_else(|| self.raw.clone())
                .to_lowercase(),
            self.year.clone().unwrap_or_default(),
            self.title.clone().unwrap_or_default().to_lowercase(),
        )
    }
}

/// Derive a surname from a name written either as "Smith, J." or "J. Smith".
pub fn surname_of(name: &str) -> String {
    let name = name.trim();
    if let Some((surname, _)) = name.split_once(',') {
        return surname.trim().to_string();
    }
    name.split_whitespace()
        .rev()
        .find(|token| !token.ends_with('.') || token.len() > 2)
        .unwrap_or(name)
        .trim_end_matches('.')
        .to_string()
}

/// An in-text citation located in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Index of the block holding the marker
    pub block: usize,

    /// Byte range of the marker within the block's plain text
    pub span: Range<usize>,

    /// The marker as written
    pub text: String,

    /// What the marker points at
    pub target: CitationTarget,
}

/// The target of an in-text citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum CitationTarget {
    /// Numeric labels, ranges already expanded (`[2-4]` → 2, 3, 4)
    Numeric {
        /// Cited labels
        labels: Vec<u32>,
    },
    /// Author-year pairs
    AuthorYear {
        /// Cited (surname, year) pairs
        works: Vec<(String, String)>,
    },
}
