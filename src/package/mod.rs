//! Reading and writing the package container.
//!
//! A package is a ZIP archive of named parts. It is held in memory as an
//! ordered list so untouched parts survive a rewrite byte-for-byte.

mod archive;
mod limits;

pub use archive::{
    Package, Part, CONTENT_TYPES_PART, CORE_PROPERTIES_PART, DEFAULT_DOCUMENT_PART,
    PACKAGE_RELS_PART, STYLES_PART,
};
pub use limits::PackageLimits;
