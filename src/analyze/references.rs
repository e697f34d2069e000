//! Reference parser.
//!
//! Parsing annotates an entry with whatever fields can be recovered; the
//! raw text is always kept and fields that do not match stay empty.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{Classification, Document, Reference};

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\[(\d+)\]|(\d+)\.)\s*").unwrap())
}

fn doi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:doi:\s*|https?://(?:dx\.)?doi\.org/)?\b(10\.\d{4,9}/\S+)").unwrap()
    })
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b((?:1[5-9]|20)\d{2}[a-z]?)\b").unwrap())
}

/// `Author, A. (Year). Title. Venue.`
fn author_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<authors>.+?)\s*\((?P<year>\d{4}[a-z]?|n\.d\.)(?:,[^)]*)?\)\.?\s*(?P<title>[^.?!]+[.?!]?)\s*(?P<venue>.*)$",
        )
        .unwrap()
    })
}

/// `Author, "Title," Venue, Year.`
fn quoted_title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?P<authors>[^"“”]+?),?\s*["“](?P<title>[^"“”]+?)[,.]?["”],?\s*(?P<rest>.*)$"#)
            .unwrap()
    })
}

/// `Surname, Given. Title. Venue, Year.` with a full given name.
fn sentence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<authors>\p{Lu}[^.]*?,\s*\p{Lu}\p{Ll}[^.]*?)\.\s+(?P<title>[^.]+)\.\s*(?P<venue>.*)$")
            .unwrap()
    })
}

/// `Surname, I. I.` as used in author-year lists.
fn inverted_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\p{Lu}[\p{L}'’\- ]*?,\s*\p{Lu}\.(?:\s*-?\p{Lu}\.)*").unwrap()
    })
}

fn author_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(?:,\s*and\s+|,\s*&\s*|\s+and\s+|\s*&\s*|;\s*|,\s*)").unwrap())
}

fn full_name_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(?:,\s*and\s+|\s+and\s+|\s*&\s*)").unwrap())
}

/// Parse every reference entry of a classified document, in order.
pub fn extract_references(document: &Document) -> Vec<Reference> {
    document
        .blocks_labelled(Classification::ReferenceEntry)
        .map(|(index, block)| {
            let mut reference = parse_reference(&block.plain_text());
            reference.source_block = Some(index);
            reference
        })
        .collect()
}

/// Parse one reference entry.
pub fn parse_reference(raw: &str) -> Reference {
    let mut reference = Reference::from_raw(raw);
    let mut text = raw.trim();

    if let Some(caps) = label_regex().captures(text) {
        reference.label = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string());
        text = &text[caps.get(0).map_or(0, |m| m.end())..];
    }

    let mut body = text.to_string();
    if let Some(caps) = doi_regex().captures(text) {
        if let (Some(whole), Some(doi)) = (caps.get(0), caps.get(1)) {
            reference.doi = Some(doi.as_str().trim_end_matches(['.', ',', ';']).to_string());
            body = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        }
    }
    let body = body.trim();

    if let Some(caps) = quoted_title_regex().captures(body) {
        reference.authors = split_authors(&caps["authors"]);
        reference.title = non_empty(&caps["title"]);
        let rest = &caps["rest"];
        reference.year = last_year(rest);
        reference.venue = non_empty(strip_year_suffix(rest));
    } else if let Some(caps) = author_year_regex().captures(body) {
        reference.authors = split_authors(&caps["authors"]);
        reference.year = Some(caps["year"].to_string());
        reference.title = non_empty(&caps["title"]);
        reference.venue = non_empty(&caps["venue"]);
    } else if let Some(caps) = sentence_regex().captures(body) {
        reference.authors = split_full_names(&caps["authors"]);
        reference.title = non_empty(&caps["title"]);
        let venue = &caps["venue"];
        reference.year = last_year(venue);
        reference.venue = non_empty(strip_year_suffix(venue));
    } else {
        reference.year = last_year(body);
    }

    reference
}

/// Split an author list written either as `Smith, J., & Doe, A.` or as
/// `J. Smith, A. Doe, and C. Lee`.
pub fn split_authors(list: &str) -> Vec<String> {
    let list = list.trim().trim_end_matches(',').trim();
    let starts_with_initial = list
        .split_whitespace()
        .next()
        .map_or(false, |w| w.len() <= 3 && w.ends_with('.'));

    let inverted: Vec<String> = inverted_name_regex()
        .find_iter(list)
        .map(|m| clean_author(m.as_str()))
        .filter(|a| !a.is_empty())
        .collect();
    if !starts_with_initial && !inverted.is_empty() {
        return inverted;
    }

    author_separator_regex()
        .split(list)
        .map(clean_author)
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("et al."))
        .collect()
}

/// Split names written in full (`Morrison, Toni, and Jane Doe`), where
/// commas separate surname from given name.
fn split_full_names(list: &str) -> Vec<String> {
    full_name_separator_regex()
        .split(list.trim())
        .map(clean_author)
        .filter(|a| !a.is_empty())
        .collect()
}

fn clean_author(name: &str) -> String {
    name.trim()
        .trim_start_matches(['&', ','])
        .trim_start_matches("and ")
        .trim()
        .to_string()
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim().trim_end_matches([',', '.']).trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn last_year(text: &str) -> Option<String> {
    year_regex()
        .captures_iter(text)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drop a trailing `, 2020.` (optionally with a month) from a venue.
fn strip_year_suffix(text: &str) -> &str {
    let Some(last) = year_regex().find_iter(text).last() else {
        return text;
    };
    let tail = text[last.end()..].trim_matches(|c: char| c == '.' || c.is_whitespace());
    if !tail.is_empty() {
        return text;
    }
    let head = text[..last.start()].trim_end();
    let head = head.trim_end_matches(',');
    let head = match head.rsplit_once(',') {
        Some((before, month)) if is_month(month) => before,
        _ => head,
    };
    head.trim_end_matches([',', ' '])
}

fn is_month(word: &str) -> bool {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ];
    let word = word.trim().trim_end_matches('.').to_lowercase();
    word.len() >= 3 && MONTHS.iter().any(|m| m.starts_with(word.as_str()))
}
