//! Docket number classification for Supreme Court of California filings.
//!
//! Docket numbers are an `S` prefix followed by digits, e.g. `S245203`.
//! A trailing letter marks a variant filing (`S245203A`, `S245203M`): a
//! rehearing, modification or similar follow-up that shares the number of
//! the original case. Variants are flagged and never merged with their
//! numeric counterpart.
//!
//! # Sort keys
//!
//! Plain string order puts `S99` after `S123`. [`DocketNumber::sort_key`]
//! zero-pads the numeric part so that `ORDER BY` on the key recovers
//! numeric order, with a variant sorting directly after its base filing.

/// True when the docket number ends in a letter. Only `A` and `M` are known
/// to occur, but any letter counts.
pub fn is_variant_filing(docket_number: &str) -> bool {
    docket_number
        .trim()
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphabetic())
}

/// A docket number split into prefix, number and optional variant suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocketNumber {
    pub prefix: String,
    pub number: u64,
    pub suffix: String,
}

impl DocketNumber {
    /// Parse `"S245203"`, `"s245203a"`, `"245203"`. Returns `None` when
    /// there are no digits or anything other than letters follows them.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let digit_start = upper.find(|c: char| c.is_ascii_digit())?;
        let (prefix, rest) = upper.split_at(digit_start);
        if !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let digit_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (digits, suffix) = rest.split_at(digit_end);
        if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        let number = digits.parse().ok()?;
        Some(Self {
            prefix: prefix.to_string(),
            number,
            suffix: suffix.to_string(),
        })
    }

    pub fn is_variant(&self) -> bool {
        !self.suffix.is_empty()
    }

    /// `"S245203A"` → `"S.0000245203.A"`; `"S99"` → `"S.0000000099."`.
    pub fn sort_key(&self) -> String {
        format!("{}.{:010}.{}", self.prefix, self.number, self.suffix)
    }
}

/// Sort key for a raw docket string; unparseable input sorts last, by text.
pub fn docket_sort_key(docket_number: &str) -> String {
    match DocketNumber::parse(docket_number) {
        Some(d) => d.sort_key(),
        None => format!("~{}", docket_number.trim()),
    }
}
