//! Justice roster and name resolution.
//!
//! The roster is an explicit, immutable value built once from configuration
//! and passed by reference to everything that needs it. Its order is
//! significant: it is the order of the report matrix and the order in which
//! [`Roster::reduce`] searches for embedded names.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::CoreError;

/// A justice, known by three names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justice {
    /// Internal code, e.g. `"TCS"`. Used as the storage key.
    pub shorthand: String,
    /// Name as it appears in opinions, e.g. `"Cantil-Sakauye"`.
    pub short_name: String,
    pub full_name: String,
}

/// Outcome of looking up one name token.
#[derive(Debug, PartialEq)]
pub enum Resolution<'r> {
    Known(&'r Justice),
    Reduced(Reduction<'r>),
}

/// Justices recovered from a malformed token, plus whatever text was left.
#[derive(Debug, Default, PartialEq)]
pub struct Reduction<'r> {
    pub found: Vec<&'r Justice>,
    pub remainder: String,
}

/// Resolved form of a list of name tokens.
#[derive(Debug, Default, PartialEq)]
pub struct ResolvedNames<'r> {
    /// Distinct justices, in first-seen order.
    pub justices: Vec<&'r Justice>,
    /// Residual text that matched nobody.
    pub unknown: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Roster {
    justices: Vec<Justice>,
    /// Lowercased shorthand and short name → index into `justices`.
    index: HashMap<String, usize>,
    /// Case-insensitive literal matcher per short name, same order as `justices`.
    short_name_res: Vec<Regex>,
}

impl Roster {
    pub fn new(justices: Vec<Justice>) -> Result<Self, CoreError> {
        if justices.is_empty() {
            return Err(CoreError::EmptyRoster);
        }
        let mut index = HashMap::new();
        let mut short_name_res = Vec::with_capacity(justices.len());
        for (i, j) in justices.iter().enumerate() {
            for key in [&j.shorthand, &j.short_name] {
                let key = key.trim().to_lowercase();
                if let Some(&prev) = index.get(&key)
                    && prev != i
                {
                    return Err(CoreError::DuplicateJustice(key));
                }
                index.insert(key, i);
            }
            let pattern = format!("(?i){}", regex::escape(j.short_name.trim()));
            short_name_res.push(
                Regex::new(&pattern).map_err(|e| CoreError::Other(e.to_string()))?,
            );
        }
        Ok(Self {
            justices,
            index,
            short_name_res,
        })
    }

    pub fn justices(&self) -> &[Justice] {
        &self.justices
    }

    pub fn len(&self) -> usize {
        self.justices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.justices.is_empty()
    }

    /// Exact (case-insensitive) lookup by shorthand or short name.
    pub fn get(&self, name: &str) -> Option<&Justice> {
        self.index
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.justices[i])
    }

    /// Roster position of the justice with this shorthand.
    pub fn position(&self, shorthand: &str) -> Option<usize> {
        self.justices.iter().position(|j| j.shorthand == shorthand)
    }

    /// Recover known short names embedded in a token that matched nobody,
    /// e.g. `"Chin Corrigan"` or `"ChinCorrigan"` from a list missing a comma.
    ///
    /// Each justice is searched for in roster order and every occurrence is
    /// cut out before the next justice is tried. Separator debris (spaces,
    /// punctuation, a stray "and") is not reported as remainder.
    pub fn reduce(&self, token: &str) -> Reduction<'_> {
        let mut remaining = token.to_string();
        let mut found = Vec::new();
        for (justice, re) in self.justices.iter().zip(&self.short_name_res) {
            if re.is_match(&remaining) {
                remaining = re.replace_all(&remaining, " ").into_owned();
                found.push(justice);
            }
        }
        let remainder = remaining
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.'))
            .filter(|w| !w.is_empty() && !w.eq_ignore_ascii_case("and"))
            .collect::<Vec<_>>()
            .join(" ");
        Reduction { found, remainder }
    }

    /// Look up one token, falling back to [`reduce`](Self::reduce).
    pub fn resolve(&self, token: &str) -> Resolution<'_> {
        match self.get(token) {
            Some(justice) => Resolution::Known(justice),
            None => Resolution::Reduced(self.reduce(token)),
        }
    }

    /// Resolve a list of name tokens. Unrecognised residue is logged and
    /// returned in `unknown`; it never fails the caller.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> ResolvedNames<'_> {
        let mut out = ResolvedNames::default();
        for name in names {
            let name = name.as_ref();
            let found = match self.resolve(name) {
                Resolution::Known(justice) => vec![justice],
                Resolution::Reduced(reduction) => {
                    if !reduction.remainder.is_empty() {
                        warn!(
                            name,
                            remainder = %reduction.remainder,
                            "unknown justice"
                        );
                        out.unknown.push(reduction.remainder);
                    }
                    reduction.found
                }
            };
            for justice in found {
                if !out.justices.iter().any(|j| j.shorthand == justice.shorthand) {
                    out.justices.push(justice);
                }
            }
        }
        out
    }
}
