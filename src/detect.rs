//! Package format detection and validation.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Package container information gathered from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageFormat {
    /// Whether the archive begins with a spanned/split-archive marker
    pub spanned: bool,
}

impl std::fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.spanned {
            write!(f, "ZIP package (spanned)")
        } else {
            write!(f, "ZIP package")
        }
    }
}

/// Local file header signature: PK\x03\x04
const ZIP_LOCAL_MAGIC: &[u8] = b"PK\x03\x04";
/// Spanned archive marker followed by a local header
const ZIP_SPANNED_MAGIC: &[u8] = b"PK\x07\x08";
/// End of central directory: an archive with no entries
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

/// Content type of the main WordprocessingML part.
pub const DOCX_MAIN_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

/// MIME type of a DOCX package.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Detect the package format from a file path.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PackageFormat> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut header = [0u8; 8];
    let read = reader.read(&mut header)?;
    detect_format_from_bytes(&header[..read])
}

/// Detect the package format from bytes.
///
/// # Returns
/// * `Ok(PackageFormat)` if the data starts with a ZIP local file header
/// * `Err(Error::CorruptArchive)` otherwise
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PackageFormat> {
    if data.len() < ZIP_LOCAL_MAGIC.len() {
        return Err(Error::CorruptArchive("input too short".to_string()));
    }

    if data.starts_with(ZIP_LOCAL_MAGIC) {
        return Ok(PackageFormat { spanned: false });
    }

    if data.starts_with(ZIP_SPANNED_MAGIC) && data[4..].starts_with(ZIP_LOCAL_MAGIC) {
        return Ok(PackageFormat { spanned: true });
    }

    if data.starts_with(ZIP_EMPTY_MAGIC) {
        return Err(Error::CorruptArchive("archive has no entries".to_string()));
    }

    Err(Error::CorruptArchive("not a ZIP package".to_string()))
}

/// Check if a content-types part declares a WordprocessingML main document.
pub fn declares_wordprocessing(content_types: &[u8]) -> bool {
    String::from_utf8_lossy(content_types).contains(DOCX_MAIN_CONTENT_TYPE)
}

/// Check if a file looks like a package.
pub fn is_package<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes look like a package.
pub fn is_package_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
