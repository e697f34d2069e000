//! Resource limits applied while opening a package.

use serde::{Deserialize, Serialize};

/// Bounds on archive size so adversarial input fails fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageLimits {
    /// Maximum number of entries in the archive
    pub max_entries: usize,

    /// Maximum uncompressed size of one part in bytes
    pub max_part_size: u64,

    /// Maximum uncompressed size of all parts in bytes
    pub max_total_size: u64,

    /// Maximum ratio of uncompressed to compressed size for one part
    pub max_compression_ratio: u64,
}

impl PackageLimits {
    /// Create limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Set the maximum size of a single part.
    pub fn with_max_part_size(mut self, bytes: u64) -> Self {
        self.max_part_size = bytes;
        self
    }

    /// Set the maximum total uncompressed size.
    pub fn with_max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = bytes;
        self
    }

    /// Set the maximum compression ratio.
    pub fn with_max_compression_ratio(mut self, ratio: u64) -> Self {
        self.max_compression_ratio = ratio;
        self
    }
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_part_size: 64 * 1024 * 1024,
            max_total_size: 256 * 1024 * 1024,
            max_compression_ratio: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_builder() {
        let limits = PackageLimits::new()
            .with_max_entries(10)
            .with_max_part_size(1024)
            .with_max_total_size(4096)
            .with_max_compression_ratio(5);

        assert_eq!(limits.max_entries, 10);
        assert_eq!(limits.max_part_size, 1024);
        assert_eq!(limits.max_total_size, 4096);
        assert_eq!(limits.max_compression_ratio, 5);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let limits: PackageLimits = serde_json::from_str(r#"{"max_entries": 12}"#).unwrap();
        assert_eq!(limits.max_entries, 12);
        assert_eq!(limits.max_part_size, PackageLimits::default().max_part_size);
    }
}
