//! Font size statistics for title detection.

use std::collections::HashMap;

use crate::model::{Block, BlockKind};

/// Font statistics over a document's text blocks.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common, weighted by characters)
    pub body_size: f32,
    /// All observed font sizes with character counts
    pub size_histogram: HashMap<i32, usize>,
}

impl FontStatistics {
    /// Gather statistics from paragraph-like blocks.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut stats = Self::default();
        for block in blocks {
            if !matches!(block.kind, BlockKind::Paragraph | BlockKind::ReferenceEntry) {
                continue;
            }
            for run in &block.runs {
                if let Some(size) = run.style.font_size {
                    stats.add_size(size, run.text.chars().count());
                }
            }
        }
        stats.analyze();
        stats
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32, weight: usize) {
        let key = (size * 10.0).round() as i32; // 0.1pt precision
        *self.size_histogram.entry(key).or_insert(0) += weight;
    }

    /// Calculate the body size. Ties go to the smaller size.
    pub fn analyze(&mut self) {
        self.body_size = self
            .size_histogram
            .iter()
            .max_by(|(ka, ca), (kb, cb)| ca.cmp(cb).then(kb.cmp(ka)))
            .map(|(key, _)| *key as f32 / 10.0)
            .unwrap_or(12.0);
    }

    /// Check if a size stands out from body text by at least `ratio`.
    pub fn is_prominent(&self, size: f32, ratio: f32) -> bool {
        size > self.body_size * ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextRun;

    fn sized(text: &str, size: f32) -> Block {
        let mut block = Block::new(BlockKind::Paragraph);
        let mut run = TextRun::new(text);
        run.style.font_size = Some(size);
        block.add_run(run);
        block
    }

    #[test]
    fn test_body_size_by_weight() {
        let blocks = vec![
            sized("Big Title", 20.0),
            sized("a long paragraph of ordinary body text", 10.0),
            sized("short", 12.0),
        ];
        let stats = FontStatistics::from_blocks(&blocks);
        assert_eq!(stats.body_size, 10.0);
        assert!(stats.is_prominent(20.0, 1.15));
        assert!(!stats.is_prominent(11.0, 1.15));
    }

    #[test]
    fn test_empty_defaults_to_twelve() {
        let stats = FontStatistics::from_blocks(&[]);
        assert_eq!(stats.body_size, 12.0);
    }
}
