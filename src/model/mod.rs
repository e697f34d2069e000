//! Document model types for manuscript content representation.
//!
//! This module defines the intermediate representation shared by the
//! builder, the classifier and the renderer. The builder produces a
//! [`Document`]; later stages never mutate it in place but derive new
//! documents from it.

mod block;
mod classification;
mod document;
mod paragraph;
mod reference;
mod table;

pub use block::{Block, BlockKind};
pub use classification::Classification;
pub use document::{Document, MarkupContext, Metadata};
pub use paragraph::{Alignment, Hyperlink, ParagraphStyle, TextRun, TextStyle};
pub use reference::{surname_of, Citation, CitationTarget, Reference};
pub use table::{Table, TableCell, TableRow};
