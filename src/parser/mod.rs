//! Document model builder.
//!
//! Turns the main WordprocessingML part, with the style sheet for
//! formatting resolution, into an ordered sequence of [`Block`]s.
//!
//! [`Block`]: crate::model::Block

mod docx_parser;
mod options;
mod styles;

pub use docx_parser::{build_document, parse_core_properties, DocxParser};
pub use options::BuildOptions;
pub use styles::{StyleSheet, W_NS};
