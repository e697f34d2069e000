//! Style templates and their registry.
//!
//! The built-in IEEE, APA, MLA and Chicago templates are JSON data
//! embedded in the crate and validated when the registry is built.
//!
//! # Example
//!
//! ```
//! use paperfmt::template::TemplateRegistry;
//!
//! let registry = TemplateRegistry::with_builtins().unwrap();
//! let apa = registry.resolve("APA").unwrap();
//! assert_eq!(apa.references.heading, "References");
//! ```

mod registry;
#[allow(clippy::module_inception)]
mod template;

pub use registry::TemplateRegistry;
pub use template::{
    BlockStyle, CitationFormat, CitationStyle, HeadingNumbering, NameOrder, PageGeometry,
    ReferenceFormat, ReferenceOrder, RoleStyles, Template, CITATION_PLACEHOLDERS,
    ENTRY_PLACEHOLDERS, MAX_TWIPS,
};
