//! Whitespace normalisation for opinion text.
//!
//! CourtListener's `plain_text` keeps the PDF layout: hard line breaks,
//! runs of spaces, non-breaking spaces and, in older records, literal `\n`
//! escape sequences. The opinion grammar is written against single spaces,
//! so every text is passed through [`normalize_whitespace`] first.

use std::sync::OnceLock;

use regex::Regex;

fn whitespace_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\\n|\s)+").expect("whitespace regex must compile"))
}

/// Collapse every run of whitespace (Unicode `\s` and the two-character
/// sequence `\n`) into a single ASCII space.
///
/// Idempotent: the output contains no `\n` sequences and no whitespace other
/// than isolated spaces.
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_run_re().replace_all(text, " ").into_owned()
}
