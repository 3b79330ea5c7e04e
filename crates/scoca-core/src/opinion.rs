//! Opinion records and the builder that turns opinion text into them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pattern::{RawOpinion, find_opinions};
use crate::{CoreError, Roster, normalize_whitespace, split_justices};

/// Closed set of opinion types, with stable integer codes used in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpinionType {
    Majority,
    Concurring,
    Dissenting,
    ConcurringAndDissenting,
}

impl OpinionType {
    pub const ALL: [OpinionType; 4] = [
        OpinionType::Majority,
        OpinionType::Concurring,
        OpinionType::Dissenting,
        OpinionType::ConcurringAndDissenting,
    ];

    pub fn code(self) -> i32 {
        match self {
            OpinionType::Majority => 1,
            OpinionType::Concurring => 2,
            OpinionType::Dissenting => 3,
            OpinionType::ConcurringAndDissenting => 4,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, CoreError> {
        match code {
            1 => Ok(OpinionType::Majority),
            2 => Ok(OpinionType::Concurring),
            3 => Ok(OpinionType::Dissenting),
            4 => Ok(OpinionType::ConcurringAndDissenting),
            other => Err(CoreError::UnknownOpinionTypeCode(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpinionType::Majority => "majority",
            OpinionType::Concurring => "concurring",
            OpinionType::Dissenting => "dissenting",
            OpinionType::ConcurringAndDissenting => "concurring and dissenting",
        }
    }

    /// Whether this type can stand as the effective type of a
    /// concurring-and-dissenting opinion.
    pub fn is_stance(self) -> bool {
        matches!(self, OpinionType::Concurring | OpinionType::Dissenting)
    }
}

impl fmt::Display for OpinionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpinionType {
    type Err = CoreError;

    /// Accepts the display form in any case, with `_` or `-` as separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = s
            .trim()
            .to_lowercase()
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        OpinionType::ALL
            .into_iter()
            .find(|t| t.as_str() == canonical)
            .ok_or_else(|| CoreError::UnknownOpinionType(s.to_string()))
    }
}

impl TryFrom<String> for OpinionType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpinionType> for String {
    fn from(value: OpinionType) -> Self {
        value.as_str().to_string()
    }
}

/// One opinion of a case filing, with justices still as names from the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opinion {
    author: String,
    kind: OpinionType,
    effective_type: Option<OpinionType>,
    concurring: Vec<String>,
}

impl Opinion {
    /// `effective_type` is required input only for concurring-and-dissenting
    /// opinions; for every other type it is `None` or equal to `kind`.
    ///
    /// The author is dropped from `concurring`, as are repeated names.
    pub fn new(
        author: impl Into<String>,
        kind: OpinionType,
        effective_type: Option<OpinionType>,
        concurring: Vec<String>,
    ) -> Result<Self, CoreError> {
        let effective_type = match (kind, effective_type) {
            (OpinionType::ConcurringAndDissenting, None) => None,
            (OpinionType::ConcurringAndDissenting, Some(e)) if e.is_stance() => Some(e),
            (_, None) => Some(kind),
            (k, Some(e)) if k == e && k != OpinionType::ConcurringAndDissenting => Some(e),
            (kind, Some(effective)) => {
                return Err(CoreError::InvalidEffectiveType { kind, effective });
            }
        };
        let author = author.into();
        let mut deduped: Vec<String> = Vec::with_capacity(concurring.len());
        for name in concurring {
            let seen = name.eq_ignore_ascii_case(&author)
                || deduped.iter().any(|n| n.eq_ignore_ascii_case(&name));
            if !seen {
                deduped.push(name);
            }
        }
        Ok(Self {
            author,
            kind,
            effective_type,
            concurring: deduped,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn kind(&self) -> OpinionType {
        self.kind
    }

    /// `None` only for an unresolved concurring-and-dissenting opinion.
    pub fn effective_type(&self) -> Option<OpinionType> {
        self.effective_type
    }

    pub fn concurring(&self) -> &[String] {
        &self.concurring
    }

    /// Map author and concurring names onto the roster.
    ///
    /// Returns `None` (with a warning) when the author is not a known
    /// justice. Unknown concurring names are carried in
    /// [`ResolvedOpinion::unknown`] and otherwise ignored.
    pub fn resolve(&self, roster: &Roster) -> Option<ResolvedOpinion> {
        let Some(author) = roster.get(&self.author) else {
            warn!(author = %self.author, kind = %self.kind, "unknown authoring justice");
            return None;
        };
        let names = roster.resolve_names(&self.concurring);
        let concurring = names
            .justices
            .iter()
            .filter(|j| j.shorthand != author.shorthand)
            .map(|j| j.shorthand.clone())
            .collect();
        Some(ResolvedOpinion {
            author: author.shorthand.clone(),
            kind: self.kind,
            effective_type: self.effective_type,
            concurring,
            unknown: names.unknown,
        })
    }
}

impl fmt::Display for Opinion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.author, self.kind.as_str().to_uppercase())?;
        if self.kind == OpinionType::ConcurringAndDissenting {
            match self.effective_type {
                Some(e) => write!(f, " -> {}", e.as_str().to_uppercase())?,
                None => f.write_str(" -> UNRESOLVED")?,
            }
        }
        write!(f, "): {}", self.concurring.join(", "))
    }
}

/// An [`Opinion`] with every justice replaced by its roster shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOpinion {
    pub author: String,
    pub kind: OpinionType,
    pub effective_type: Option<OpinionType>,
    pub concurring: Vec<String>,
    pub unknown: Vec<String>,
}

/// Offline classification of concurring-and-dissenting opinions, keyed by
/// docket number and author name.
#[derive(Debug, Clone, Default)]
pub struct EffectiveTypeTable {
    entries: HashMap<(String, String), OpinionType>,
}

impl EffectiveTypeTable {
    pub fn insert(
        &mut self,
        docket_number: &str,
        author: &str,
        effective_type: OpinionType,
    ) -> Result<(), CoreError> {
        if !effective_type.is_stance() {
            return Err(CoreError::InvalidEffectiveType {
                kind: OpinionType::ConcurringAndDissenting,
                effective: effective_type,
            });
        }
        self.entries
            .insert(Self::key(docket_number, author), effective_type);
        Ok(())
    }

    pub fn get(&self, docket_number: &str, author: &str) -> Option<OpinionType> {
        self.entries.get(&Self::key(docket_number, author)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(docket_number: &str, author: &str) -> (String, String) {
        (
            docket_number.trim().to_uppercase(),
            author.trim().to_lowercase(),
        )
    }
}

/// Result of reading the opinions out of one case filing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOpinions {
    /// Nothing in the text matched; the filing must be flagged.
    NoOpinions,
    Found {
        majority: Opinion,
        secondary: Vec<Opinion>,
    },
}

impl ParsedOpinions {
    /// All opinions, majority first, in document order.
    pub fn opinions(&self) -> Vec<&Opinion> {
        match self {
            ParsedOpinions::NoOpinions => Vec::new(),
            ParsedOpinions::Found {
                majority,
                secondary,
            } => std::iter::once(majority).chain(secondary).collect(),
        }
    }

    pub fn majority_count(&self) -> usize {
        self.opinions()
            .iter()
            .filter(|o| o.kind() == OpinionType::Majority)
            .count()
    }
}

fn concurring_names(raw: &RawOpinion) -> Vec<String> {
    let mut names: Vec<String> = raw.concurring_chief.iter().cloned().collect();
    if let Some(associates) = &raw.concurring_associates {
        names.extend(split_justices(associates));
    }
    names
}

/// Extract the opinions of one case filing from its text.
///
/// The first announcement is the majority opinion by convention; every
/// later one is secondary. Concurring-and-dissenting opinions take their
/// effective type from `effective_types` and stay unresolved otherwise.
pub fn parse_opinions(
    docket_number: &str,
    text: &str,
    effective_types: &EffectiveTypeTable,
) -> Result<ParsedOpinions, CoreError> {
    let mut raws = find_opinions(&normalize_whitespace(text)).into_iter();
    let Some(first) = raws.next() else {
        return Ok(ParsedOpinions::NoOpinions);
    };
    if first.kind != OpinionType::Majority {
        warn!(
            docket_number,
            author = %first.author,
            kind = %first.kind,
            "first announcement is not in majority form; treating it as the majority"
        );
    }
    let majority = Opinion::new(
        first.author.clone(),
        OpinionType::Majority,
        None,
        concurring_names(&first),
    )?;

    let mut secondary = Vec::new();
    for raw in raws {
        if raw.kind == OpinionType::Majority {
            warn!(docket_number, author = %raw.author, "more than one majority announcement");
        }
        let effective = match raw.kind {
            OpinionType::ConcurringAndDissenting => {
                let found = effective_types.get(docket_number, &raw.author);
                if found.is_none() {
                    warn!(
                        docket_number,
                        author = %raw.author,
                        "concurring and dissenting opinion needs an effective type"
                    );
                }
                found
            }
            _ => None,
        };
        secondary.push(Opinion::new(
            raw.author.clone(),
            raw.kind,
            effective,
            concurring_names(&raw),
        )?);
    }
    Ok(ParsedOpinions::Found {
        majority,
        secondary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tests::scoca_roster;
    use tracing_test::traced_test;

    #[test]
    fn type_codes_are_total_and_stable() {
        for t in OpinionType::ALL {
            assert_eq!(OpinionType::from_code(t.code() as i64).unwrap(), t);
        }
        assert!(matches!(
            OpinionType::from_code(0),
            Err(CoreError::UnknownOpinionTypeCode(0))
        ));
        assert!(OpinionType::from_code(5).is_err());
    }

    #[test]
    fn type_strings() {
        assert_eq!(
            "Concurring And Dissenting".parse::<OpinionType>().unwrap(),
            OpinionType::ConcurringAndDissenting
        );
        assert_eq!(
            "concurring_and_dissenting".parse::<OpinionType>().unwrap(),
            OpinionType::ConcurringAndDissenting
        );
        assert_eq!("DISSENTING".parse::<OpinionType>().unwrap(), OpinionType::Dissenting);
        assert!("plurality".parse::<OpinionType>().is_err());
        assert!("".parse::<OpinionType>().is_err());
        assert_eq!(OpinionType::ConcurringAndDissenting.to_string(), "concurring and dissenting");
    }

    #[test]
    fn type_serde_uses_display_form() {
        let json = serde_json::to_string(&OpinionType::ConcurringAndDissenting).unwrap();
        assert_eq!(json, "\"concurring and dissenting\"");
        let parsed: OpinionType = serde_json::from_str("\"dissenting\"").unwrap();
        assert_eq!(parsed, OpinionType::Dissenting);
        assert!(serde_json::from_str::<OpinionType>("\"other\"").is_err());
    }

    #[test]
    fn effective_type_rules() {
        let o = Opinion::new("Liu", OpinionType::Dissenting, None, vec![]).unwrap();
        assert_eq!(o.effective_type(), Some(OpinionType::Dissenting));

        let o = Opinion::new("Liu", OpinionType::ConcurringAndDissenting, None, vec![]).unwrap();
        assert_eq!(o.effective_type(), None);

        let o = Opinion::new(
            "Liu",
            OpinionType::ConcurringAndDissenting,
            Some(OpinionType::Dissenting),
            vec![],
        )
        .unwrap();
        assert_eq!(o.effective_type(), Some(OpinionType::Dissenting));

        for (kind, effective) in [
            (OpinionType::Concurring, OpinionType::Dissenting),
            (OpinionType::Majority, OpinionType::Concurring),
            (OpinionType::ConcurringAndDissenting, OpinionType::Majority),
            (
                OpinionType::ConcurringAndDissenting,
                OpinionType::ConcurringAndDissenting,
            ),
        ] {
            assert!(
                matches!(
                    Opinion::new("Liu", kind, Some(effective), vec![]),
                    Err(CoreError::InvalidEffectiveType { .. })
                ),
                "{kind} -> {effective} should be rejected"
            );
        }
    }

    #[test]
    fn author_never_concurs_with_self() {
        let o = Opinion::new(
            "Liu",
            OpinionType::Concurring,
            None,
            vec!["Kruger".into(), "liu".into(), "Kruger".into(), "Chin".into()],
        )
        .unwrap();
        assert_eq!(o.concurring(), ["Kruger", "Chin"]);
    }

    #[test]
    fn single_majority_with_chief_prepended() {
        let parsed = parse_opinions(
            "S250000",
            "Justice Liu authored the opinion of the court, in which Chief Justice \
             Cantil-Sakauye and Justices Chin, Corrigan, and Kruger concurred.",
            &EffectiveTypeTable::default(),
        )
        .unwrap();
        let ParsedOpinions::Found {
            majority,
            secondary,
        } = parsed
        else {
            panic!("expected opinions");
        };
        assert_eq!(majority.author(), "Liu");
        assert_eq!(majority.kind(), OpinionType::Majority);
        assert_eq!(
            majority.concurring(),
            ["Cantil-Sakauye", "Chin", "Corrigan", "Kruger"]
        );
        assert!(secondary.is_empty());
    }

    #[test]
    fn smith_jones_lee() {
        let parsed = parse_opinions(
            "S1",
            "Chief Justice Smith authored the opinion of the court, in which Justices Jones and Lee concurred.",
            &EffectiveTypeTable::default(),
        )
        .unwrap();
        let opinions = parsed.opinions();
        assert_eq!(opinions.len(), 1);
        assert_eq!(opinions[0].author(), "Smith");
        assert_eq!(opinions[0].concurring(), ["Jones", "Lee"]);
    }

    #[test]
    fn no_opinions_sentinel() {
        let parsed = parse_opinions(
            "S1",
            "The petition for review is denied.",
            &EffectiveTypeTable::default(),
        )
        .unwrap();
        assert_eq!(parsed, ParsedOpinions::NoOpinions);
        assert!(parsed.opinions().is_empty());
    }

    #[traced_test]
    #[test]
    fn concurring_and_dissenting_uses_table() {
        let text = "Justice Chin authored the opinion of the court, in which Justices Corrigan \
                    and Groban concurred. Justice Liu filed a concurring and dissenting opinion, \
                    in which Justice Cuéllar concurred. Justice Kruger filed a concurring and \
                    dissenting opinion.";
        let mut table = EffectiveTypeTable::default();
        table
            .insert("s245000", "LIU", OpinionType::Dissenting)
            .unwrap();
        let parsed = parse_opinions("S245000", text, &table).unwrap();
        let opinions = parsed.opinions();
        assert_eq!(opinions.len(), 3);
        assert_eq!(opinions[1].effective_type(), Some(OpinionType::Dissenting));
        assert_eq!(opinions[1].concurring(), ["Cuéllar"]);
        assert_eq!(opinions[2].effective_type(), None);
        assert!(logs_contain("needs an effective type"));
    }

    #[test]
    fn table_rejects_non_stance() {
        let mut table = EffectiveTypeTable::default();
        assert!(table.insert("S1", "Liu", OpinionType::Majority).is_err());
        assert!(table.is_empty());
    }

    #[traced_test]
    #[test]
    fn second_majority_is_kept_and_warned() {
        let text = "Justice Chin authored the opinion of the court. \
                    Justice Liu authored the opinion of the court.";
        let parsed = parse_opinions("S2", text, &EffectiveTypeTable::default()).unwrap();
        assert_eq!(parsed.majority_count(), 2);
        assert!(logs_contain("more than one majority announcement"));
    }

    #[test]
    fn resolve_against_roster() {
        let roster = scoca_roster();
        let o = Opinion::new(
            "Liu",
            OpinionType::Dissenting,
            None,
            vec!["Cuéllar Kruger".into(), "Werdegar".into(), "GL".into()],
        )
        .unwrap();
        let r = o.resolve(&roster).unwrap();
        assert_eq!(r.author, "GL");
        assert_eq!(r.concurring, vec!["MFC", "LK"]);
        assert_eq!(r.unknown, vec!["Werdegar"]);
    }

    #[traced_test]
    #[test]
    fn repeated_justice_titles_resolve_cleanly() {
        let parsed = parse_opinions(
            "S3",
            "Justice Liu authored the opinion of the court, in which Justice Chin and \
             Justice Kruger concurred.",
            &EffectiveTypeTable::default(),
        )
        .unwrap();
        let r = parsed.opinions()[0].resolve(&scoca_roster()).unwrap();
        assert_eq!(r.concurring, vec!["MC", "LK"]);
        assert!(r.unknown.is_empty());
        assert!(!logs_contain("unknown justice"));
    }

    #[traced_test]
    #[test]
    fn resolve_unknown_author() {
        let roster = scoca_roster();
        let o = Opinion::new("Mosk", OpinionType::Concurring, None, vec![]).unwrap();
        assert!(o.resolve(&roster).is_none());
        assert!(logs_contain("unknown authoring justice"));
    }

    #[test]
    fn display() {
        let o = Opinion::new(
            "Kruger",
            OpinionType::ConcurringAndDissenting,
            None,
            vec!["Liu".into()],
        )
        .unwrap();
        assert_eq!(o.to_string(), "Kruger (CONCURRING AND DISSENTING -> UNRESOLVED): Liu");
    }
}
