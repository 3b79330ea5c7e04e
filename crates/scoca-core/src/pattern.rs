//! Opinion announcement grammar.
//!
//! Published opinions announce their authorship in a fixed sentence form:
//!
//! - Majority: "[Chief] Justice *A* authored the opinion of the court, in which
//!   [Chief Justice *C* and] Justice(s) *X, Y, and Z* concurred."
//! - Secondary: "[Chief] Justice *A* filed a concurring | dissenting |
//!   concurring and dissenting opinion[, in which ... concurred]."
//!
//! Both forms are compiled into one alternation with the majority branch
//! first. A single left-to-right scan therefore always tries the majority
//! form at a position before the secondary form, so a secondary match can
//! never swallow the majority sentence.
//!
//! Matching is case-insensitive and Unicode-aware. Input must already be
//! passed through [`normalize_whitespace`](crate::normalize_whitespace).

use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::opinion::OpinionType;

/// One opinion announcement as it appears in the text, before any name
/// splitting or resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOpinion {
    pub author: String,
    /// `Majority` for the majority form, otherwise the announced type.
    pub kind: OpinionType,
    pub concurring_chief: Option<String>,
    /// Unsplit associate justice list, e.g. `"Chin, Liu, and Kruger"`.
    pub concurring_associates: Option<String>,
}

fn author(group: &str) -> String {
    format!(r"(?:Chief )?Justice (?P<{group}>[^.,]+?) (?:authored|filed) ")
}

fn concurring(chief: &str, associates: &str) -> String {
    format!(
        r",? in which (?:Chief Justice (?P<{chief}>[^.,]+?) and )?(?:Chief )?Justices? (?P<{associates}>[^.]+?) concurred"
    )
}

fn opinion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let majority = format!(
            "{}the opinion of the court(?:{})?",
            author("m_author"),
            concurring("m_chief", "m_assoc"),
        );
        let secondary = format!(
            "{}a (?P<s_type>concurring and dissenting|concurring|dissenting) opinion(?:{})?",
            author("s_author"),
            concurring("s_chief", "s_assoc"),
        );
        Regex::new(&format!("(?i)(?:{majority})|(?:{secondary})"))
            .expect("opinion regex must compile")
    })
}

fn group(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn raw_from_captures(caps: &Captures<'_>) -> Option<RawOpinion> {
    if let Some(author) = group(caps, "m_author") {
        return Some(RawOpinion {
            author,
            kind: OpinionType::Majority,
            concurring_chief: group(caps, "m_chief"),
            concurring_associates: group(caps, "m_assoc"),
        });
    }
    let author = group(caps, "s_author")?;
    let raw_type = group(caps, "s_type")?;
    let kind = match raw_type.parse::<OpinionType>() {
        Ok(kind) => kind,
        Err(err) => {
            warn!(%err, "skipping opinion announcement with unreadable type");
            return None;
        }
    };
    Some(RawOpinion {
        author,
        kind,
        concurring_chief: group(caps, "s_chief"),
        concurring_associates: group(caps, "s_assoc"),
    })
}

/// Find every opinion announcement in `normalized`, in document order.
///
/// No validation of the overall shape happens here: zero matches, a
/// secondary opinion first, or two majority sentences are all returned as
/// found and dealt with by the caller.
pub fn find_opinions(normalized: &str) -> Vec<RawOpinion> {
    opinion_re()
        .captures_iter(normalized)
        .filter_map(|caps| raw_from_captures(&caps))
        .collect()
}
