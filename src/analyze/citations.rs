//! In-text citation locator.
//!
//! Recognizes numeric markers (`[1]`, `[1, 3]`, `[2–4]`) and author-year
//! markers (`(Smith, 2020)`, `(Smith & Doe, 2019; Lee et al., 2021)`).

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::{surname_of, CitationTarget};

/// Ranges wider than this are not expanded (`[1–100000]` is not a citation).
const MAX_RANGE: u32 = 200;

/// A marker found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMatch {
    /// Byte range of the marker
    pub span: Range<usize>,
    /// What the marker points at
    pub target: CitationTarget,
}

fn numeric_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\s*(\d+(?:\s*[-–—]\s*\d+)?(?:\s*,\s*\d+(?:\s*[-–—]\s*\d+)?)*)\s*\]").unwrap()
    })
}

fn parenthetical_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]*\d{4}[a-z]?[^()]*)\)").unwrap())
}

fn work_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:see|cf\.|e\.g\.,?|i\.e\.,?)\s+)?(?P<names>\p{Lu}[^,;]*?),?\s+(?P<year>\d{4}[a-z]?)(?:,\s*pp?\.\s*\d+(?:\s*[-–]\s*\d+)?)?$",
        )
        .unwrap()
    })
}

fn bare_numbers_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\s*[-–,]\s*\d+)*$").unwrap())
}

/// Find every citation marker in `text`, in order of appearance.
///
/// Matches never overlap; numeric markers win over an enclosing
/// parenthetical.
pub fn find_citations(text: &str) -> Vec<CitationMatch> {
    let mut found: Vec<CitationMatch> = numeric_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let labels = expand_labels(caps.get(1)?.as_str())?;
            Some(CitationMatch {
                span: whole.range(),
                target: CitationTarget::Numeric { labels },
            })
        })
        .collect();

    for caps in parenthetical_regex().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let span = whole.range();
        if found.iter().any(|m| m.span.start < span.end && span.start < m.span.end) {
            // A numeric marker inside the parentheses already claims this text.
            continue;
        }
        if let Some(works) = parse_works(inner.as_str()) {
            found.push(CitationMatch {
                span,
                target: CitationTarget::AuthorYear { works },
            });
        }
    }

    found.sort_by_key(|m| m.span.start);
    found
}

/// Read a bare superscript marker such as `3` or `1,4-6`.
pub fn parse_bare_marker(text: &str) -> Option<CitationTarget> {
    let text = text.trim();
    if !bare_numbers_regex().is_match(text) {
        return None;
    }
    expand_labels(text).map(|labels| CitationTarget::Numeric { labels })
}

/// Expand `1, 3-5` into `[1, 3, 4, 5]`.
fn expand_labels(list: &str) -> Option<Vec<u32>> {
    let mut labels = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        let bounds: Vec<&str> = part
            .split(|c: char| c == '-' || c == '–' || c == '—')
            .map(str::trim)
            .collect();
        match bounds.as_slice() {
            [single] => labels.push(single.parse().ok()?),
            [lo, hi] => {
                let lo: u32 = lo.parse().ok()?;
                let hi: u32 = hi.parse().ok()?;
                if hi < lo || hi - lo > MAX_RANGE {
                    return None;
                }
                labels.extend(lo..=hi);
            }
            _ => return None,
        }
    }
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

/// Parse `Smith & Doe, 2019; Lee et al., 2021` into (surname, year) pairs.
fn parse_works(inner: &str) -> Option<Vec<(String, String)>> {
    let mut works = Vec::new();
    for part in inner.split(';') {
        let caps = work_regex().captures(part.trim())?;
        let names = caps.name("names")?.as_str();
        let first = names
            .split(" & ")
            .next()
            .and_then(|n| n.split(" and ").next())
            .unwrap_or(names);
        let first = first.trim_end_matches("et al.").trim_end_matches("et al").trim();
        if first.is_empty() {
            return None;
        }
        works.push((surname_of(first), caps.name("year")?.as_str().to_string()));
    }
    if works.is_empty() {
        None
    } else {
        Some(works)
    }
}
