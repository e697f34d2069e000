//! Manuscript analysis: section classification, citation location and
//! reference parsing.

mod citations;
mod classifier;
mod fonts;
mod options;
mod references;

pub use citations::{find_citations, parse_bare_marker, CitationMatch};
pub use classifier::{Ambiguity, ClassifiedDocument, Section, SectionClassifier, SectionKind};
pub use fonts::FontStatistics;
pub use options::ClassifierOptions;
pub use references::{extract_references, parse_reference, split_authors};
