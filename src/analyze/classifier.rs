//! Section classifier.
//!
//! Assigns every block a [`Classification`] and derives the section
//! outline. Rules are applied in order and the first match wins:
//! title, authors, abstract, headings, reference region, tables and
//! figures, then body text. Classification is total: a block no rule
//! claims becomes body text.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::budget::StageBudget;
use crate::error::Result;
use crate::model::{Block, BlockKind, Citation, Classification, Document, TextRun};

use super::citations::{find_citations, parse_bare_marker};
use super::fonts::FontStatistics;
use super::options::ClassifierOptions;

/// Kind of a derived section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// The manuscript title
    Title,
    /// Author and affiliation lines
    Authors,
    /// The abstract
    Abstract,
    /// A body section, usually introduced by a heading
    Body,
    /// The reference list
    References,
}

/// A logical section of the manuscript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section kind
    pub kind: SectionKind,

    /// Heading text, with numbering stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,

    /// Index of the heading block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_block: Option<usize>,

    /// Indices of the member blocks (the heading excluded)
    pub blocks: Vec<usize>,
}

impl Section {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            heading: None,
            heading_block: None,
            blocks: Vec::new(),
        }
    }

    fn headed(kind: SectionKind, heading: String, index: usize) -> Self {
        Self {
            heading: Some(heading),
            heading_block: Some(index),
            ..Self::new(kind)
        }
    }
}

/// A note about a classification decision that could have gone another way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ambiguity {
    /// Nothing before the first heading stood out as a title
    NoTitleCandidate,
    /// Several blocks shared the largest font size; the first was taken
    TiedTitleCandidates {
        /// Candidate block indices
        blocks: Vec<usize>,
    },
    /// An abstract label was not followed by any text
    AbstractWithoutBody {
        /// Index of the label block
        block: usize,
    },
    /// A reference heading was not followed by any entry
    EmptyReferenceSection {
        /// Index of the heading block
        block: usize,
    },
}

impl std::fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ambiguity::NoTitleCandidate => write!(f, "no title candidate"),
            Ambiguity::TiedTitleCandidates { blocks } => {
                write!(f, "{} title candidates of equal size", blocks.len())
            }
            Ambiguity::AbstractWithoutBody { block } => {
                write!(f, "abstract label at block {} has no body", block)
            }
            Ambiguity::EmptyReferenceSection { block } => {
                write!(f, "reference heading at block {} has no entries", block)
            }
        }
    }
}

/// A labelled copy of a document with its outline and citations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedDocument {
    /// The document with every block labelled
    pub document: Document,

    /// Section outline in document order
    pub sections: Vec<Section>,

    /// In-text citations in document order
    pub citations: Vec<Citation>,

    /// Classification notes
    pub ambiguities: Vec<Ambiguity>,

    /// Index of the heading that opens the reference list
    pub reference_heading: Option<usize>,
}

impl ClassifiedDocument {
    /// Number of blocks per label name.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for block in &self.document.blocks {
            *counts.entry(block.label.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// The first section of a kind.
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Text of the title block, if one was found.
    pub fn title(&self) -> Option<String> {
        self.document
            .blocks_labelled(Classification::Title)
            .next()
            .map(|(_, b)| b.plain_text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbstractStart {
    /// The block is only the label
    Label,
    /// The label opens a block of abstract text
    Inline,
}

/// Section classifier.
#[derive(Debug, Clone, Default)]
pub struct SectionClassifier {
    options: ClassifierOptions,
}

impl SectionClassifier {
    /// Create a classifier with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with custom options.
    pub fn with_options(options: ClassifierOptions) -> Self {
        Self { options }
    }

    /// Classifier options.
    pub fn options(&self) -> &ClassifierOptions {
        &self.options
    }

    /// Classify a document without a time budget.
    pub fn classify(&self, document: &Document) -> Result<ClassifiedDocument> {
        self.classify_with_budget(document, &StageBudget::unlimited("classify"))
    }

    /// Classify a document under a time budget.
    pub fn classify_with_budget(
        &self,
        document: &Document,
        budget: &StageBudget,
    ) -> Result<ClassifiedDocument> {
        let source = &document.blocks;
        let stats = FontStatistics::from_blocks(source);
        let mut ambiguities = Vec::new();

        let title = self.find_title(source, &stats, &mut ambiguities);
        let authors = title
            .map(|t| self.find_authors(source, t))
            .unwrap_or_default();

        let mut blocks: Vec<Block> = Vec::with_capacity(source.len());
        let mut abstract_seen = false;
        let mut in_abstract = false;
        let mut abstract_label: Option<usize> = None;
        let mut in_references = false;
        let mut reference_headings: Vec<usize> = Vec::new();
        let mut open_reference_heading: Option<usize> = None;

        for (index, original) in source.iter().enumerate() {
            budget.check()?;
            let mut block = original.clone();

            match block.kind {
                BlockKind::Table(_) => {
                    block.label = Classification::Table;
                    blocks.push(block);
                    continue;
                }
                BlockKind::Figure { .. } => {
                    block.label = Classification::Figure;
                    blocks.push(block);
                    continue;
                }
                _ => {}
            }

            if Some(index) == title {
                block.label = Classification::Title;
                blocks.push(block);
                continue;
            }
            if authors.contains(&index) {
                block.label = Classification::AuthorBlock;
                blocks.push(block);
                continue;
            }

            let text = block.plain_text();

            if !abstract_seen {
                if let Some(start) = self.abstract_start(&text) {
                    abstract_seen = true;
                    in_abstract = true;
                    if start == AbstractStart::Label {
                        abstract_label = Some(blocks.len());
                    }
                    block.label = Classification::AbstractBlock;
                    blocks.push(block);
                    continue;
                }
            }

            let heading_text = normalize_label(strip_numbering_text(&text));
            let is_reference_heading = self.options.is_reference_label(&heading_text)
                && matches!(block.kind, BlockKind::Heading { .. } | BlockKind::Paragraph);

            if block.is_heading() || is_reference_heading {
                if in_abstract {
                    in_abstract = false;
                    if let Some(label) = abstract_label.take() {
                        ambiguities.push(Ambiguity::AbstractWithoutBody { block: label });
                    }
                }
                if let Some(open) = open_reference_heading.take() {
                    ambiguities.push(Ambiguity::EmptyReferenceSection { block: open });
                }

                let level = block.heading_level().unwrap_or(1);
                strip_numbering(&mut block);
                block.label = Classification::Heading(level);

                in_references = is_reference_heading;
                if is_reference_heading {
                    open_reference_heading = Some(blocks.len());
                    reference_headings.push(blocks.len());
                }
                blocks.push(block);
                continue;
            }

            if in_abstract {
                if !block.is_empty() {
                    abstract_label = None;
                }
                block.label = Classification::AbstractBlock;
                blocks.push(block);
                continue;
            }

            if (in_references || block.kind == BlockKind::ReferenceEntry) && !block.is_empty() {
                open_reference_heading = None;
                for mut entry in split_reference_block(&block) {
                    entry.label = Classification::ReferenceEntry;
                    blocks.push(entry);
                }
                continue;
            }

            block.label = if block.kind == BlockKind::CitationMarker {
                Classification::CitationMarker
            } else {
                Classification::BodyText
            };
            blocks.push(block);
        }

        if let Some(label) = abstract_label {
            ambiguities.push(Ambiguity::AbstractWithoutBody { block: label });
        }
        if let Some(open) = open_reference_heading {
            ambiguities.push(Ambiguity::EmptyReferenceSection { block: open });
        }
        for note in &ambiguities {
            log::debug!("classification ambiguity: {}", note);
        }

        let citations = locate_citations(&blocks);
        let sections = outline(&blocks, &reference_headings);

        Ok(ClassifiedDocument {
            document: Document {
                metadata: document.metadata.clone(),
                blocks,
                markup: document.markup.clone(),
            },
            sections,
            citations,
            ambiguities,
            reference_heading: reference_headings.first().copied(),
        })
    }

    /// Rule 1: the largest text before the first heading, or a block styled
    /// `Title`.
    fn find_title(
        &self,
        blocks: &[Block],
        stats: &FontStatistics,
        ambiguities: &mut Vec<Ambiguity>,
    ) -> Option<usize> {
        let first_heading = blocks
            .iter()
            .position(|b| b.is_heading())
            .unwrap_or(blocks.len());

        let candidates: Vec<usize> = (0..first_heading)
            .filter(|&i| blocks[i].kind == BlockKind::Paragraph && !blocks[i].is_empty())
            .filter(|&i| self.abstract_start(&blocks[i].plain_text()).is_none())
            .take(self.options.title_scan_limit)
            .collect();

        if let Some(&styled) = candidates.iter().find(|&&i| blocks[i].style.is_named("Title")) {
            return Some(styled);
        }

        let sized: Vec<(usize, f32)> = candidates
            .iter()
            .filter_map(|&i| blocks[i].font_size().map(|s| (i, s)))
            .collect();
        let largest = sized.iter().map(|(_, s)| *s).fold(None, |acc: Option<f32>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        });

        match largest {
            Some(size) if stats.is_prominent(size, self.options.title_font_ratio) => {
                let tied: Vec<usize> = sized
                    .iter()
                    .filter(|(_, s)| (s - size).abs() < 0.05)
                    .map(|(i, _)| *i)
                    .collect();
                if tied.len() > 1 {
                    ambiguities.push(Ambiguity::TiedTitleCandidates {
                        blocks: tied.clone(),
                    });
                }
                tied.first().copied()
            }
            _ => {
                ambiguities.push(Ambiguity::NoTitleCandidate);
                None
            }
        }
    }

    /// Rule 2: name lists and affiliation lines right after the title.
    fn find_authors(&self, blocks: &[Block], title: usize) -> Vec<usize> {
        let mut authors = Vec::new();
        for (index, block) in blocks.iter().enumerate().skip(title + 1) {
            if block.is_empty() && block.kind == BlockKind::Paragraph {
                continue;
            }
            if block.kind != BlockKind::Paragraph {
                break;
            }
            let full = block.plain_text();
            if full.chars().count() > self.options.author_max_len
                || self.abstract_start(&full).is_some()
            {
                break;
            }
            let text = text_without_superscripts(block);
            if is_name_list(&text) || is_affiliation_line(&text) {
                authors.push(index);
            } else {
                break;
            }
        }
        authors
    }

    /// Rule 3: a literal abstract label, or a label opening the text.
    fn abstract_start(&self, text: &str) -> Option<AbstractStart> {
        let normalized = normalize_label(text);
        if self.options.is_abstract_label(&normalized) {
            return Some(AbstractStart::Label);
        }

        let lower = text.trim_start().to_lowercase();
        self.options.abstract_labels.iter().find_map(|label| {
            let rest = lower.strip_prefix(label.as_str())?;
            let rest = rest.trim_start();
            let mut chars = rest.chars();
            let separator = chars.next()?;
            let is_separator = matches!(separator, '—' | '–' | '-' | ':' | '.');
            (is_separator && !chars.as_str().trim().is_empty()).then_some(AbstractStart::Inline)
        })
    }
}

fn numbering_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:(?:[IVXLCDM]+|[A-Z]|\d+(?:\.\d+)*)[.)]|\d+(?:\.\d+)+)\s+").unwrap()
    })
}

fn name_list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let name = r"\p{Lu}[\p{L}'’\-]*\.?(?:\s+(?:\p{Lu}[\p{L}'’\-]*\.?|van|von|de|der|da|di|del|la|le)){0,4}(?:[\d*†‡§]+(?:,[\d*†‡§]+)*)?";
        let separator = r"\s*(?:,\s*and\s+|,\s*&\s*|,\s*|\s+and\s+|\s*&\s*)";
        Regex::new(&format!(r"^\s*{name}(?:{separator}{name})*\s*,?\s*$")).unwrap()
    })
}

fn affiliation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:[\w.+-]+@[\w-]+\.[\w.-]+|\b(?:universit(?:y|é|ä|à|at)|institute?|department|dept\.|laborator(?:y|ies)|college|school|cent(?:er|re)|faculty|academy|hospital|corporation|inc\.|ltd)\b)",
        )
        .unwrap()
    })
}

fn reference_start_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\[\d+\]|\d+\.)\s").unwrap())
}

fn is_name_list(text: &str) -> bool {
    !text.trim().is_empty() && name_list_regex().is_match(text)
}

fn is_affiliation_line(text: &str) -> bool {
    affiliation_regex().is_match(text)
}

/// Text of a block with superscript affiliation markers removed.
fn text_without_superscripts(block: &Block) -> String {
    block
        .runs
        .iter()
        .filter(|r| !r.style.superscript)
        .map(|r| r.text.as_str())
        .collect()
}

/// Lowercase, NFKC-normalized text without trailing punctuation.
pub(crate) fn normalize_label(text: &str) -> String {
    let folded: String = text.nfkc().collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(['.', ':', ';', '—', '–', '-'])
        .trim()
        .to_string()
}

/// Text after leading heading numbering (`I.`, `A.`, `1.`, `1.2`, `2)`).
fn strip_numbering_text(text: &str) -> &str {
    match numbering_regex().find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

fn strip_numbering(block: &mut Block) {
    let text = block.plain_text();
    if let Some(m) = numbering_regex().find(&text) {
        if m.end() < text.trim_end().len() {
            block.replace_text_range(0, m.end(), "");
        }
    }
}

/// Split a reference paragraph on blank lines and on line breaks that
/// start a new numbered entry.
fn split_reference_block(block: &Block) -> Vec<Block> {
    let text = block.plain_text();
    let mut segments: Vec<Range<usize>> = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut offset = 0;

    for line in text.split('\n') {
        let start = offset;
        let end = offset + line.len();
        offset = end + 1;

        if line.trim().is_empty() {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            continue;
        }
        match current.as_mut() {
            Some(segment) if !reference_start_regex().is_match(line) => segment.end = end,
            Some(_) => {
                if let Some(segment) = current.replace(start..end) {
                    segments.push(segment);
                }
            }
            None => current = Some(start..end),
        }
    }
    if let Some(segment) = current {
        segments.push(segment);
    }

    if segments.len() <= 1 {
        return vec![block.clone()];
    }

    segments
        .into_iter()
        .map(|range| {
            let mut part = block.clone();
            part.runs = slice_runs(&block.runs, trim_range(&text, range));
            part
        })
        .collect()
}

fn trim_range(text: &str, range: Range<usize>) -> Range<usize> {
    let slice = &text[range.clone()];
    let start = range.start + (slice.len() - slice.trim_start().len());
    let end = range.start + slice.trim_end().len();
    start..end.max(start)
}

/// The part of `runs` covering a byte range of their joined text.
fn slice_runs(runs: &[TextRun], range: Range<usize>) -> Vec<TextRun> {
    let mut sliced = Vec::new();
    let mut offset = 0;
    for run in runs {
        let run_start = offset;
        let run_end = offset + run.text.len();
        offset = run_end;

        let lo = range.start.max(run_start);
        let hi = range.end.min(run_end);
        if lo >= hi {
            continue;
        }
        if let Some(text) = run.text.get(lo - run_start..hi - run_start) {
            sliced.push(TextRun::styled(text, run.style.clone()));
        }
    }
    sliced
}

fn locate_citations(blocks: &[Block]) -> Vec<Citation> {
    let mut citations = Vec::new();
    for (index, block) in blocks.iter().enumerate() {
        if !block.label.may_cite() {
            continue;
        }
        let text = block.plain_text();

        if block.label == Classification::CitationMarker && block.is_all_superscript() {
            if let Some(target) = parse_bare_marker(&text) {
                let span = trim_range(&text, 0..text.len());
                citations.push(Citation {
                    block: index,
                    text: text[span.clone()].to_string(),
                    span,
                    target,
                });
                continue;
            }
        }

        for found in find_citations(&text) {
            citations.push(Citation {
                block: index,
                text: text[found.span.clone()].to_string(),
                span: found.span,
                target: found.target,
            });
        }
    }
    citations
}

fn outline(blocks: &[Block], reference_headings: &[usize]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        let kind = match block.label {
            Classification::Title => SectionKind::Title,
            Classification::AuthorBlock => SectionKind::Authors,
            Classification::AbstractBlock => SectionKind::Abstract,
            Classification::Heading(_) => {
                let kind = if reference_headings.contains(&index) {
                    SectionKind::References
                } else {
                    SectionKind::Body
                };
                sections.push(Section::headed(kind, block.plain_text().trim().to_string(), index));
                continue;
            }
            Classification::ReferenceEntry => SectionKind::References,
            Classification::BodyText
            | Classification::Figure
            | Classification::Table
            | Classification::CitationMarker
            | Classification::Unclassified => match sections.last().map(|s| s.kind) {
                Some(SectionKind::Body) | Some(SectionKind::References) => {
                    if let Some(last) = sections.last_mut() {
                        last.blocks.push(index);
                    }
                    continue;
                }
                _ => SectionKind::Body,
            },
        };

        match sections.last_mut() {
            Some(last) if last.kind == kind => last.blocks.push(index),
            _ => {
                let mut section = Section::new(kind);
                section.blocks.push(index);
                sections.push(section);
            }
        }
    }

    sections
}
