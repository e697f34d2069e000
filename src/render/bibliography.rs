//! Reference ordering, entry formatting and citation text.

use std::collections::HashMap;

use crate::model::{surname_of, Citation, CitationTarget, Reference, TextRun};
use crate::template::{CitationFormat, CitationStyle, NameOrder, ReferenceFormat, ReferenceOrder};

/// References in output order with their assigned numbers.
#[derive(Debug, Clone)]
pub struct Bibliography<'r> {
    references: &'r [Reference],
    /// Reference indices in output order
    order: Vec<usize>,
    /// Output number (1-based) per reference index
    numbers: Vec<usize>,
    by_label: HashMap<u32, usize>,
}

impl<'r> Bibliography<'r> {
    /// Order references per the template.
    ///
    /// `Appearance` puts references in order of first citation, followed by
    /// uncited references in source order. `Alphabetical` sorts by first
    /// author surname, then year, then title.
    pub fn build(references: &'r [Reference], citations: &[Citation], order: ReferenceOrder) -> Self {
        let by_label = references
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.label.as_deref()?.parse::<u32>().ok().map(|n| (n, i)))
            .collect();

        let mut bibliography = Self {
            references,
            order: Vec::new(),
            numbers: vec![0; references.len()],
            by_label,
        };

        let order = match order {
            ReferenceOrder::Appearance => {
                let mut placed = vec![false; references.len()];
                let mut order = Vec::with_capacity(references.len());
                for citation in citations {
                    for index in bibliography.resolve(&citation.target).into_iter().flatten() {
                        if !placed[index] {
                            placed[index] = true;
                            order.push(index);
                        }
                    }
                }
                order.extend((0..references.len()).filter(|&i| !placed[i]));
                order
            }
            ReferenceOrder::Alphabetical => {
                let mut order: Vec<usize> = (0..references.len()).collect();
                order.sort_by_cached_key(|&i| references[i].sort_key());
                order
            }
        };

        for (position, &index) in order.iter().enumerate() {
            bibliography.numbers[index] = position + 1;
        }
        bibliography.order = order;
        bibliography
    }

    /// Reference indices in output order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Output number of a reference.
    pub fn number_of(&self, index: usize) -> Option<usize> {
        self.numbers.get(index).copied().filter(|n| *n > 0)
    }

    /// References in output order.
    pub fn ordered_references(&self) -> Vec<Reference> {
        self.order.iter().map(|&i| self.references[i].clone()).collect()
    }

    /// Resolve every work a citation names, or `None` if any is missing.
    pub fn resolve(&self, target: &CitationTarget) -> Option<Vec<usize>> {
        match target {
            CitationTarget::Numeric { labels } => labels.iter().map(|&n| self.resolve_label(n)).collect(),
            CitationTarget::AuthorYear { works } => works
                .iter()
                .map(|(surname, year)| self.resolve_work(surname, year))
                .collect(),
        }
    }

    fn resolve_label(&self, label: u32) -> Option<usize> {
        if self.by_label.is_empty() {
            // Unlabelled lists are cited by position.
            let index = (label as usize).checked_sub(1)?;
            return (index < self.references.len()).then_some(index);
        }
        self.by_label.get(&label).copied()
    }

    fn resolve_work(&self, surname: &str, year: &str) -> Option<usize> {
        let by_author: Vec<(usize, &str)> = self
            .references
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.first_surname()
                    .map(|s| s.eq_ignore_ascii_case(surname))
                    .unwrap_or(false)
            })
            .filter_map(|(i, r)| r.year.as_deref().map(|y| (i, y)))
            .collect();

        if let Some(&(index, _)) = by_author.iter().find(|(_, y)| y.eq_ignore_ascii_case(year)) {
            return Some(index);
        }

        // Suffix not carried by the entry: pick among same-year works in source order.
        let base = base_year(year);
        let suffix = year[base.len()..]
            .chars()
            .next()
            .map(|c| (c as u8 - b'a') as usize)
            .unwrap_or(0);
        let candidates: Vec<usize> = by_author
            .iter()
            .filter(|(_, y)| base_year(y) == base)
            .map(|&(i, _)| i)
            .collect();

        candidates
            .get(suffix)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Replacement text for a citation, or `None` if it cannot be resolved.
    pub fn citation_text(&self, target: &CitationTarget, format: &CitationFormat) -> Option<String> {
        let mut indices = self.resolve(target)?;
        if format.style == CitationStyle::Numeric {
            indices.sort_by_key(|&i| self.numbers[i]);
            indices.dedup();
        }

        let items: Vec<String> = indices
            .iter()
            .map(|&i| {
                let reference = &self.references[i];
                let surname = match target {
                    CitationTarget::AuthorYear { works } if reference.authors.is_empty() => works
                        .first()
                        .map(|(s, _)| s.clone())
                        .unwrap_or_default(),
                    _ => cited_names(reference, format),
                };
                format
                    .item
                    .replace("{n}", &self.numbers[i].to_string())
                    .replace("{surname}", &surname)
                    .replace("{year}", reference.year.as_deref().unwrap_or("n.d."))
            })
            .collect();

        Some(format!("{}{}{}", format.open, items.join(&format.separator), format.close))
    }
}

/// Year without a disambiguation suffix ("2020a" gives "2020").
fn base_year(year: &str) -> &str {
    year.trim_end_matches(|c: char| c.is_ascii_lowercase())
}

/// Author names as they appear inside an author-year citation.
fn cited_names(reference: &Reference, format: &CitationFormat) -> String {
    let surnames: Vec<String> = reference.authors.iter().map(|a| surname_of(a)).collect();
    match surnames.len() {
        0 => String::new(),
        1 => surnames[0].clone(),
        n if n >= format.et_al_min => format!("{} et al.", surnames[0]),
        2 => format!("{}{}{}", surnames[0], format.two_author_joiner, surnames[1]),
        n => format!(
            "{},{}{}",
            surnames[..n - 1].join(", "),
            format.two_author_joiner,
            surnames[n - 1]
        ),
    }
}

/// Split a name into surname and given-name parts.
fn split_name(name: &str) -> (String, Vec<String>) {
    let name = name.trim();
    if let Some((surname, given)) = name.split_once(',') {
        let given = given.split_whitespace().map(str::to_string).collect();
        return (surname.trim().to_string(), given);
    }
    let surname = surname_of(name);
    let given = match name.rfind(surname.as_str()) {
        Some(at) => name[..at].split_whitespace().map(str::to_string).collect(),
        None => Vec::new(),
    };
    (surname, given)
}

fn initial(part: &str) -> String {
    if part.ends_with('.') {
        return part.to_string();
    }
    match part.chars().next() {
        Some(c) if c.is_uppercase() => format!("{}.", c),
        _ => part.to_string(),
    }
}

/// Write one author name in the requested order.
pub fn format_name(name: &str, order: NameOrder) -> String {
    if order == NameOrder::AsWritten {
        return name.trim().to_string();
    }
    let (surname, given) = split_name(name);
    if given.is_empty() {
        return surname;
    }
    let initials: Vec<String> = given.iter().map(|g| initial(g)).collect();
    match order {
        NameOrder::InitialsFirst => format!("{} {}", initials.join(" "), surname),
        NameOrder::SurnameFirst => format!("{}, {}", surname, initials.join(" ")),
        NameOrder::AsWritten => name.trim().to_string(),
    }
}

/// Join an author list with the template's separators.
pub fn format_authors(authors: &[String], format: &ReferenceFormat) -> String {
    let names: Vec<String> = authors
        .iter()
        .map(|a| format_name(a, format.name_order))
        .collect();

    if let Some(threshold) = format.et_al_threshold {
        if names.len() > threshold {
            return format!("{} et al.", names[0]);
        }
    }

    match names.len() {
        0 => String::new(),
        1 => names[0].clone(),
        2 => format!("{}{}{}", names[0], format.two_author_separator, names[1]),
        n => format!(
            "{}{}{}",
            names[..n - 1].join(&format.author_separator),
            format.last_author_separator,
            names[n - 1]
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'f> {
    Text(&'f str),
    Field(&'f str),
    Italic,
    Open,
    Close,
}

fn tokenize(format: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = format;
    while let Some(at) = rest.find(['{', '*', '<', '>']) {
        if at > 0 {
            tokens.push(Token::Text(&rest[..at]));
        }
        let marker = rest.as_bytes()[at];
        rest = &rest[at + 1..];
        match marker {
            b'*' => tokens.push(Token::Italic),
            b'<' => tokens.push(Token::Open),
            b'>' => tokens.push(Token::Close),
            _ => match rest.find('}') {
                Some(end) => {
                    tokens.push(Token::Field(&rest[..end]));
                    rest = &rest[end + 1..];
                }
                None => {
                    tokens.push(Token::Text("{"));
                }
            },
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

fn field_value(reference: &Reference, number: usize, authors: &str, name: &str) -> String {
    let value = match name {
        "n" => return number.to_string(),
        "authors" => return authors.to_string(),
        "year" => reference.year.as_deref(),
        "title" => reference.title.as_deref(),
        "venue" => reference.venue.as_deref(),
        "doi" => reference.doi.as_deref(),
        _ => None,
    };
    value.unwrap_or_default().trim().to_string()
}

/// Format a reference with the entry format, or fall back to its raw text
/// when authors or title are missing. Returns the runs and whether the
/// fallback was taken.
pub fn format_entry(reference: &Reference, number: usize, format: &ReferenceFormat) -> (Vec<TextRun>, bool) {
    if !reference.is_structured() {
        return (vec![TextRun::new(reference.raw.trim())], true);
    }

    let authors = format_authors(&reference.authors, format);
    let tokens = tokenize(&format.entry);
    let value = |name: &str| field_value(reference, number, &authors, name);

    let mut segments: Vec<(String, bool)> = Vec::new();
    let mut italic = false;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            Token::Open => {
                let end = tokens[i..]
                    .iter()
                    .position(|t| *t == Token::Close)
                    .map(|p| i + p)
                    .unwrap_or(tokens.len());
                let group = &tokens[i + 1..end];
                let complete = group.iter().all(|t| match t {
                    Token::Field(name) => !value(*name).is_empty(),
                    _ => true,
                });
                if complete {
                    emit(group, &value, &mut italic, &mut segments);
                }
                i = end + 1;
            }
            _ => {
                emit(&tokens[i..i + 1], &value, &mut italic, &mut segments);
                i += 1;
            }
        }
    }

    (tidy(segments), false)
}

fn emit(
    tokens: &[Token<'_>],
    value: &dyn Fn(&str) -> String,
    italic: &mut bool,
    out: &mut Vec<(String, bool)>,
) {
    for token in tokens {
        let text = match token {
            Token::Italic => {
                *italic = !*italic;
                continue;
            }
            Token::Open | Token::Close => continue,
            Token::Text(text) => text.to_string(),
            Token::Field(name) => value(*name),
        };
        match out.last_mut() {
            Some((last, flag)) if *flag == *italic => last.push_str(&text),
            _ => out.push((text, *italic)),
        }
    }
}

/// Clean up spacing and punctuation left behind by empty fields.
fn tidy(segments: Vec<(String, bool)>) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    for (text, italic) in segments {
        let open_before = runs.last().map(|r| !r.text.ends_with(' ')).unwrap_or(false);
        let mut body = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.starts_with(' ') && open_before {
            body.insert(0, ' ');
        }
        if text.ends_with(' ') && !body.ends_with(' ') && (!body.is_empty() || open_before) {
            body.push(' ');
        }
        for (from, to) in [(" ,", ","), (" .", "."), (",.", "."), ("..", "."), ("?.", "?"), ("!.", "!")] {
            while body.contains(from) {
                body = body.replace(from, to);
            }
        }

        if body.starts_with(['.', ',', ';', ':']) {
            if let Some(previous) = runs.last_mut() {
                let trimmed = previous.text.trim_end().len();
                previous.text.truncate(trimmed);
                if previous.text.ends_with(['.', '?', '!']) && body.starts_with('.') {
                    body.remove(0);
                }
            }
        }
        if body.is_empty() {
            continue;
        }
        runs.push(if italic {
            TextRun::italic(body)
        } else {
            TextRun::new(body)
        });
    }
    if let Some(last) = runs.last_mut() {
        let trimmed = last.text.trim_end().len();
        last.text.truncate(trimmed);
    }
    runs.retain(|r| !r.text.is_empty());
    runs
}
