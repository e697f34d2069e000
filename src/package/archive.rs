//! In-memory package: an ordered set of named parts.

use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::budget::StageBudget;
use crate::detect::{declares_wordprocessing, detect_format_from_bytes};
use crate::error::{Error, Result};

use super::PackageLimits;

/// Name of the content-types part.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
/// Name of the package relationships part.
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
/// Conventional name of the main document part.
pub const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";
/// Name of the style sheet part.
pub const STYLES_PART: &str = "word/styles.xml";
/// Name of the core properties part.
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// One named byte stream inside a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part name as stored in the archive (no leading slash)
    pub name: String,
    /// Uncompressed bytes
    pub data: Vec<u8>,
}

/// A document package held in memory.
///
/// Parts keep their archive order so that writing an unchanged package
/// reproduces the same entry sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    /// Create an empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a package with default limits.
    pub fn open(data: &[u8]) -> Result<Self> {
        Self::open_with_limits(data, &PackageLimits::default(), &StageBudget::default())
    }

    /// Open a package, enforcing size limits and the stage budget.
    pub fn open_with_limits(
        data: &[u8],
        limits: &PackageLimits,
        budget: &StageBudget,
    ) -> Result<Self> {
        detect_format_from_bytes(data)?;

        let mut archive = ZipArchive::new(Cursor::new(data))?;
        if archive.len() > limits.max_entries {
            return Err(Error::CorruptArchive(format!(
                "archive has {} entries (limit {})",
                archive.len(),
                limits.max_entries
            )));
        }

        let mut package = Package::new();
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            budget.check()?;

            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }

            let name = entry.name().trim_start_matches('/').to_string();
            let declared = entry.size();
            let compressed = entry.compressed_size().max(1);

            if declared > limits.max_part_size {
                return Err(Error::CorruptArchive(format!(
                    "part '{}' is {} bytes (limit {})",
                    name, declared, limits.max_part_size
                )));
            }
            if declared / compressed > limits.max_compression_ratio {
                return Err(Error::CorruptArchive(format!(
                    "part '{}' has a suspicious compression ratio",
                    name
                )));
            }

            // Declared sizes can lie; never read past the limit.
            let mut bytes = Vec::with_capacity(declared as usize);
            (&mut entry)
                .take(limits.max_part_size + 1)
                .read_to_end(&mut bytes)
                .map_err(|e| Error::CorruptArchive(format!("cannot inflate '{}': {}", name, e)))?;

            if bytes.len() as u64 > limits.max_part_size {
                return Err(Error::CorruptArchive(format!(
                    "part '{}' exceeds the size limit",
                    name
                )));
            }

            total += bytes.len() as u64;
            if total > limits.max_total_size {
                return Err(Error::CorruptArchive(format!(
                    "package exceeds {} bytes uncompressed",
                    limits.max_total_size
                )));
            }

            if package.contains(&name) {
                return Err(Error::CorruptArchive(format!("duplicate part '{}'", name)));
            }
            package.parts.push(Part { name, data: bytes });
        }

        package.validate()?;
        log::debug!(
            "opened package: {} parts, {} bytes uncompressed",
            package.len(),
            total
        );
        Ok(package)
    }

    /// Check that the parts required for a word-processing package exist.
    pub fn validate(&self) -> Result<()> {
        let content_types = self.get(CONTENT_TYPES_PART).ok_or_else(|| {
            Error::CorruptArchive(format!("required part '{}' is missing", CONTENT_TYPES_PART))
        })?;

        if !declares_wordprocessing(content_types) {
            log::warn!("content types do not declare a WordprocessingML main part");
        }

        let main = self.main_document_name();
        if !self.contains(&main) {
            return Err(Error::CorruptArchive(format!(
                "required part '{}' is missing",
                main
            )));
        }
        Ok(())
    }

    /// Serialize the package.
    ///
    /// Output is deterministic: parts are written in stored order with a
    /// fixed timestamp and Deflate compression.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for part in &self.parts {
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Name of the main document part, resolved through the package
    /// relationships when present.
    pub fn main_document_name(&self) -> String {
        self.get(PACKAGE_RELS_PART)
            .and_then(|rels| std::str::from_utf8(rels).ok())
            .and_then(office_document_target)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string())
    }

    /// Main document markup as text.
    pub fn main_document(&self) -> Result<&str> {
        let name = self.main_document_name();
        let bytes = self
            .get(&name)
            .ok_or_else(|| Error::CorruptArchive(format!("required part '{}' is missing", name)))?;
        std::str::from_utf8(bytes)
            .map_err(|e| Error::MalformedMarkup(format!("'{}' is not UTF-8: {}", name, e)))
    }

    /// Get a part's bytes by name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Get a part as UTF-8 text, if present and valid.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Check if a part exists.
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    /// Insert or replace a part. Replacement keeps the part's position.
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part { name, data }),
        }
    }

    /// Remove a part, returning its bytes.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let index = self.parts.iter().position(|p| p.name == name)?;
        Some(self.parts.remove(index).data)
    }

    /// Part names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the package has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Find the officeDocument relationship target in a `.rels` part.
fn office_document_target(rels: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(rels).ok()?;
    doc.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .find(|n| n.attribute("Type") == Some(OFFICE_DOCUMENT_REL))
        .and_then(|n| n.attribute("Target"))
        .map(|t| t.trim_start_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{minimal_package, paragraph_xml};

    #[test]
    fn test_open_write_preserves_parts() {
        let mut package = minimal_package(&paragraph_xml("Hello"));
        package.insert("word/media/image1.png", vec![0x89, b'P', b'N', b'G', 1, 2, 3]);

        let bytes = package.write().unwrap();
        let reopened = Package::open(&bytes).unwrap();

        assert_eq!(reopened, package);
        assert_eq!(
            reopened.get("word/media/image1.png"),
            Some(&[0x89, b'P', b'N', b'G', 1, 2, 3][..])
        );
    }

    #[test]
    fn test_write_is_deterministic() {
        let package = minimal_package(&paragraph_xml("Same input"));
        assert_eq!(package.write().unwrap(), package.write().unwrap());
    }

    #[test]
    fn test_not_a_zip() {
        let result = Package::open(b"plain text, not an archive");
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn test_missing_document_part() {
        let mut package = minimal_package(&paragraph_xml("x"));
        package.remove(DEFAULT_DOCUMENT_PART);
        let bytes = package.write().unwrap();

        let err = Package::open(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_missing_content_types() {
        let mut package = minimal_package(&paragraph_xml("x"));
        package.remove(CONTENT_TYPES_PART);
        let bytes = package.write().unwrap();
        assert!(matches!(
            Package::open(&bytes),
            Err(Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn test_entry_limit() {
        let package = minimal_package(&paragraph_xml("x"));
        let bytes = package.write().unwrap();
        let limits = PackageLimits::new().with_max_entries(1);
        let result = Package::open_with_limits(&bytes, &limits, &StageBudget::default());
        assert!(matches!(result, Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn test_compression_ratio_limit() {
        let mut package = minimal_package(&paragraph_xml("x"));
        package.insert("word/bomb.bin", vec![0u8; 512 * 1024]);
        let bytes = package.write().unwrap();

        let limits = PackageLimits::new().with_max_compression_ratio(50);
        let err = Package::open_with_limits(&bytes, &limits, &StageBudget::default()).unwrap_err();
        assert!(err.to_string().contains("compression ratio"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut package = minimal_package(&paragraph_xml("x"));
        let order: Vec<String> = package.names().map(String::from).collect();
        package.insert(DEFAULT_DOCUMENT_PART, b"<changed/>".to_vec());
        let after: Vec<String> = package.names().map(String::from).collect();
        assert_eq!(order, after);
        assert_eq!(package.get(DEFAULT_DOCUMENT_PART), Some(&b"<changed/>"[..]));
    }

    #[test]
    fn test_main_document_from_relationships() {
        let mut package = minimal_package(&paragraph_xml("x"));
        let body = package.remove(DEFAULT_DOCUMENT_PART).unwrap();
        package.insert("word/document2.xml", body);
        package.insert(
            PACKAGE_RELS_PART,
            format!(
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="/word/document2.xml"/></Relationships>"#,
                OFFICE_DOCUMENT_REL
            )
            .into_bytes(),
        );

        assert_eq!(package.main_document_name(), "word/document2.xml");
        assert!(package.validate().is_ok());
    }
}
