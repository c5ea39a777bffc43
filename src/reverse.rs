//! Reverse substitution: turns a rendered master example back into a template.
//!
//! Every value of the master row is searched for literally in the master
//! text and replaced by the placeholder of its column. Matches are located
//! against the unmodified text, longest value first, and may not overlap, so
//! a short value can never eat into the occurrence of a longer one.

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::source::{Row, SourceTable};
use regex::Regex;
use std::fmt;
use std::ops::Range;

/// Placeholder expression for a column.
pub fn placeholder(key: &str) -> String {
    format!("{{{{ {key} }}}}")
}

/// How recovery treats substitutions that may be wrong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubstitutionPolicy {
    /// Report issues as warnings and keep going
    #[default]
    Warn,
    /// Refuse to produce a template when any issue is found
    Strict,
}

/// Result for one column of the master row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub key: String,
    pub value: String,
    pub placeholder: String,
    /// Occurrences replaced
    pub count: usize,
    /// Occurrences left alone because they lie inside a longer value
    pub shadowed: usize,
}

/// Something about a substitution that may make the template wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionIssue {
    /// The value never appears in the master text
    NoMatch { key: String, value: String },
    /// Another column with the same value took every occurrence
    SharedValue { key: String, claimed_by: String },
    /// Occurrences straddle the span of another column's value
    Overlap { key: String, other: String, count: usize },
    /// Every occurrence lies inside a longer value, so nothing was replaced
    Shadowed { key: String, count: usize },
}

impl SubstitutionIssue {
    /// Column the issue belongs to.
    pub fn key(&self) -> &str {
        match self {
            SubstitutionIssue::NoMatch { key, .. }
            | SubstitutionIssue::SharedValue { key, .. }
            | SubstitutionIssue::Overlap { key, .. }
            | SubstitutionIssue::Shadowed { key, .. } => key,
        }
    }
}

impl fmt::Display for SubstitutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionIssue::NoMatch { key, value } => {
                write!(f, "value '{value}' of '{key}' not found")
            }
            SubstitutionIssue::SharedValue { key, claimed_by } => {
                write!(f, "'{key}' has the same value as '{claimed_by}'")
            }
            SubstitutionIssue::Overlap { key, other, count } => {
                write!(f, "{count} occurrence(s) of '{key}' overlap '{other}'")
            }
            SubstitutionIssue::Shadowed { key, count } => {
                write!(f, "all {count} occurrence(s) of '{key}' lie inside longer values")
            }
        }
    }
}

/// Per-column results in column order, plus every issue found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    pub entries: Vec<Substitution>,
    pub issues: Vec<SubstitutionIssue>,
}

impl SubstitutionReport {
    /// Total number of replacements made.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Applies `policy` to the issues of a recovered template.
    ///
    /// # Errors
    /// * `Error::AmbiguousSubstitution` under `Strict` when any issue exists
    pub fn enforce(
        &self,
        policy: SubstitutionPolicy,
        template: &str,
        diag: &dyn Diagnostics,
    ) -> Result<()> {
        if self.is_clean() {
            return Ok(());
        }
        match policy {
            SubstitutionPolicy::Warn => {
                for issue in &self.issues {
                    diag.warn(&format!("{template}: {issue}"));
                }
                Ok(())
            }
            SubstitutionPolicy::Strict => Err(Error::AmbiguousSubstitution {
                template: template.to_string(),
                issues: self.issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "),
            }),
        }
    }
}

struct Claim {
    span: Range<usize>,
    column: usize,
}

/// An occurrence that crosses the boundary of another column's claim.
struct Straddle {
    span: Range<usize>,
    column: usize,
    owner: usize,
}

fn next_char_boundary(text: &str, index: usize) -> usize {
    index + text[index..].chars().next().map_or(1, char::len_utf8)
}

/// Replaces the values of `row` in `master_text` with their placeholders.
///
/// Null and empty values are skipped.
pub fn substitute(master_text: &str, row: &Row) -> Result<(String, SubstitutionReport)> {
    let columns: Vec<(&str, &str)> = row
        .iter()
        .filter_map(|(key, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some((key.as_str(), v)),
            _ => None,
        })
        .collect();

    let mut entries: Vec<Substitution> = columns
        .iter()
        .map(|(key, value)| Substitution {
            key: key.to_string(),
            value: value.to_string(),
            placeholder: placeholder(key),
            count: 0,
            shadowed: 0,
        })
        .collect();
    let mut issues = Vec::new();

    // Stable sort keeps column order among values of equal length.
    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by(|a, b| columns[*b].1.len().cmp(&columns[*a].1.len()));

    let mut claims: Vec<Claim> = Vec::new();
    let mut straddles: Vec<Straddle> = Vec::new();
    for &column in &order {
        let (key, value) = columns[column];
        if let Some(first) = columns[..column].iter().find(|(_, v)| *v == value) {
            issues.push(SubstitutionIssue::SharedValue {
                key: key.to_string(),
                claimed_by: first.0.to_string(),
            });
            continue;
        }

        // A conflicting match is retried one character later, so an
        // occurrence starting inside it is still found.
        let pattern = Regex::new(&regex::escape(value))?;
        let mut start = 0;
        while let Some(m) = pattern.find_at(master_text, start) {
            let span = m.range();
            let hit = claims
                .iter()
                .find(|c| c.span.start < span.end && span.start < c.span.end)
                .map(|c| (c.span.clone(), c.column));
            match hit {
                None => {
                    start = span.end;
                    claims.push(Claim { span, column });
                    entries[column].count += 1;
                }
                Some((taken, _)) if taken.start <= span.start && span.end <= taken.end => {
                    start = span.end;
                    entries[column].shadowed += 1;
                }
                Some((_, owner)) => {
                    start = next_char_boundary(master_text, span.start);
                    straddles.push(Straddle { span, column, owner });
                }
            }
        }
    }

    // Straddles whose every byte ended up replaced left no literal behind.
    let covered = |span: &Range<usize>| {
        span.clone().all(|i| claims.iter().any(|c| c.span.contains(&i)))
    };
    let mut overlaps: Vec<(usize, usize, usize)> = Vec::new();
    for straddle in straddles.iter().filter(|s| !covered(&s.span)) {
        match overlaps.iter_mut().find(|(c, o, _)| *c == straddle.column && *o == straddle.owner) {
            Some((_, _, count)) => *count += 1,
            None => overlaps.push((straddle.column, straddle.owner, 1)),
        }
    }
    for (column, owner, count) in overlaps {
        issues.push(SubstitutionIssue::Overlap {
            key: columns[column].0.to_string(),
            other: columns[owner].0.to_string(),
            count,
        });
    }

    for entry in &entries {
        if entry.count > 0 || issues.iter().any(|i| i.key() == entry.key) {
            continue;
        }
        if entry.shadowed > 0 {
            issues.push(SubstitutionIssue::Shadowed {
                key: entry.key.clone(),
                count: entry.shadowed,
            });
        } else {
            issues.push(SubstitutionIssue::NoMatch {
                key: entry.key.clone(),
                value: entry.value.clone(),
            });
        }
    }

    claims.sort_by_key(|c| c.span.start);
    let mut output = String::with_capacity(master_text.len());
    let mut cursor = 0;
    for claim in &claims {
        output.push_str(&master_text[cursor..claim.span.start]);
        output.push_str(&entries[claim.column].placeholder);
        cursor = claim.span.end;
    }
    output.push_str(&master_text[cursor..]);

    Ok((output, SubstitutionReport { entries, issues }))
}

/// Looks up the master row of `table` and reverse-substitutes `master_text`.
///
/// # Errors
/// * `Error::UnknownMasterKey` if `masterkey` is not a row of `table`
pub fn reverse(
    master_text: &str,
    table: &SourceTable,
    masterkey: &str,
) -> Result<(String, SubstitutionReport)> {
    let row = table.get(masterkey).ok_or_else(|| Error::UnknownMasterKey {
        key: masterkey.to_string(),
        source_id: table.id().to_string(),
    })?;
    substitute(master_text, row)
}
