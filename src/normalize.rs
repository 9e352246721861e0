//! Gene-segment nomenclature rewriting.
//!
//! VDJdb lists segments as `TRAV8-1` while most downstream tooling expects the
//! `TCRAV08-01` form. Three rewrite rules run in a fixed order, each on the
//! output of the previous one:
//!
//! 1. `TR[ABVJ]...` gains a `C` after the leading `T`.
//! 2. A single digit directly after a run of `[TCRABVJ]` letters is zero-padded.
//! 3. A single digit directly after `-` is zero-padded.
//!
//! Rules 2 and 3 only fire on a digit that is not followed by another digit,
//! and rule 1 only on the unmarked `TR` form, so a second pass is a no-op.
//! Digits are ASCII `0-9` throughout.

use std::borrow::Cow;

use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::domain::{ReceptorTable, SEGMENT_COLUMNS};

#[derive(Debug, Clone)]
enum Rule {
    /// Plain regex replacement.
    Replace { pattern: Regex, replacement: &'static str },
    /// Insert `0` before capture group 1 when it is not followed by a digit.
    PadLoneDigit { pattern: Regex },
}

impl Rule {
    fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self {
            Rule::Replace {
                pattern,
                replacement,
            } => pattern.replace_all(value, *replacement),
            Rule::PadLoneDigit { pattern } => pad_lone_digits(pattern, value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmentNormalizer {
    rules: Vec<Rule>,
}

impl Default for SegmentNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentNormalizer {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule::Replace {
                    pattern: Regex::new(r"(T)(R[ABVJ]+)(.*)").unwrap(),
                    replacement: "${1}C${2}${3}",
                },
                Rule::PadLoneDigit {
                    pattern: Regex::new(r"[TCRABVJ]+([0-9])").unwrap(),
                },
                Rule::PadLoneDigit {
                    pattern: Regex::new(r"-([0-9])").unwrap(),
                },
            ],
        }
    }

    /// Runs every rule, in order, over one segment identifier.
    pub fn normalize_value(&self, value: &str) -> String {
        let mut current = value.to_string();
        for rule in &self.rules {
            let rewritten = match rule.apply(&current) {
                Cow::Borrowed(_) => None,
                Cow::Owned(rewritten) => Some(rewritten),
            };
            if let Some(rewritten) = rewritten {
                current = rewritten;
            }
        }
        current
    }

    /// Returns a copy of `table` with its segment columns normalized.
    ///
    /// Tables lacking a segment column are copied with that column untouched.
    pub fn normalize(
        &self,
        table: &ReceptorTable,
        diagnostics: &dyn Diagnostics,
    ) -> ReceptorTable {
        let targets = SEGMENT_COLUMNS
            .iter()
            .filter_map(|column| {
                let index = table.column_index(column);
                if index.is_none() {
                    diagnostics.warn(&format!("column {column} absent, not normalized"));
                }
                index
            })
            .collect::<Vec<_>>();

        let mut rewritten = 0usize;
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                let mut row = row.clone();
                for &index in &targets {
                    let normalized = self.normalize_value(&row[index]);
                    if normalized != row[index] {
                        rewritten += 1;
                        row[index] = normalized;
                    }
                }
                row
            })
            .collect();

        diagnostics.debug(&format!("normalized {rewritten} segment cells"));
        ReceptorTable::new(table.columns().to_vec(), rows)
    }
}

/// `pattern` must capture the digit in group 1.
fn pad_lone_digits<'a>(pattern: &Regex, value: &'a str) -> Cow<'a, str> {
    let mut out = String::new();
    let mut last = 0;
    let mut padded = false;
    for captures in pattern.captures_iter(value) {
        let Some(digit) = captures.get(1) else {
            continue;
        };
        let followed_by_digit = value[digit.end()..]
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_digit());
        if followed_by_digit {
            continue;
        }
        out.push_str(&value[last..digit.start()]);
        out.push('0');
        last = digit.start();
        padded = true;
    }
    if !padded {
        return Cow::Borrowed(value);
    }
    out.push_str(&value[last..]);
    Cow::Owned(out)
}
