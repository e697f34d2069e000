//! Heading numbering.

use crate::template::HeadingNumbering;

const MAX_LEVELS: usize = 9;

/// Hands out heading numbers in document order.
#[derive(Debug, Clone)]
pub struct HeadingCounter {
    scheme: HeadingNumbering,
    counters: [u32; MAX_LEVELS],
}

impl HeadingCounter {
    /// Create a counter for a numbering scheme.
    pub fn new(scheme: HeadingNumbering) -> Self {
        Self {
            scheme,
            counters: [0; MAX_LEVELS],
        }
    }

    /// Advance the counter for a heading at `level` (1-based) and return its
    /// number, or `None` when the scheme does not number headings.
    ///
    /// A deeper heading with no parent counts as if the parent existed.
    pub fn next(&mut self, level: u8) -> Option<String> {
        if self.scheme == HeadingNumbering::None {
            return None;
        }

        let depth = (level.max(1) as usize).min(MAX_LEVELS);
        self.counters[depth - 1] += 1;
        for deeper in &mut self.counters[depth..] {
            *deeper = 0;
        }

        let number = match self.scheme {
            HeadingNumbering::None => return None,
            HeadingNumbering::Decimal => self.decimal(depth),
            HeadingNumbering::Roman => self.roman(depth),
        };
        Some(number)
    }

    fn decimal(&self, depth: usize) -> String {
        let parts: Vec<String> = self.counters[..depth]
            .iter()
            .map(|n| n.max(&1).to_string())
            .collect();
        if depth == 1 {
            format!("{}.", parts[0])
        } else {
            parts.join(".")
        }
    }

    fn roman(&self, depth: usize) -> String {
        let n = self.counters[depth - 1];
        match depth {
            1 => format!("{}.", to_roman(n)),
            2 => format!("{}.", to_alpha(n, b'A')),
            3 => format!("{})", n),
            _ => format!("{})", to_alpha(n, b'a')),
        }
    }
}

/// Uppercase roman numeral. Zero yields an empty string.
pub fn to_roman(mut n: u32) -> String {
    const NUMERALS: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Bijective base-26 letters: A..Z, AA, AB, ...
fn to_alpha(mut n: u32, base: u8) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((base + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}
