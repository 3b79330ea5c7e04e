//! Case filings as received from CourtListener, and the extraction step that
//! decides how each one is stored.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::opinion::{EffectiveTypeTable, ParsedOpinions, parse_opinions};
use crate::{CoreError, is_variant_filing};

/// One published case.
///
/// Created from the docket entry, its opinion cluster and the cluster's
/// single sub-opinion; stored once under its docket number and never
/// updated apart from review flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFiling {
    pub docket_number: String,
    /// Absolute CourtListener URL of the opinion cluster.
    pub url: Option<String>,
    pub plain_text: String,
    /// SHA-1 of the opinion document, as reported upstream.
    pub sha1: Option<String>,
    pub filed_on: Option<NaiveDate>,
}

impl CaseFiling {
    pub fn is_variant(&self) -> bool {
        is_variant_filing(&self.docket_number)
    }

    /// Classify the filing and extract its opinions.
    ///
    /// Variant filings are flagged without looking at their text. A filing
    /// with no recognisable announcement is flagged `no_opinions`, and one
    /// with more than one majority announcement is excluded from the chart
    /// pending manual review.
    pub fn extract(&self, effective_types: &EffectiveTypeTable) -> Result<Extraction, CoreError> {
        if self.is_variant() {
            warn!(docket_number = %self.docket_number, "variant filing flagged and ignored");
            return Ok(Extraction {
                flags: FilingFlags {
                    ends_in_letter: true,
                    ..FilingFlags::default()
                },
                opinions: ParsedOpinions::NoOpinions,
            });
        }

        let opinions = parse_opinions(&self.docket_number, &self.plain_text, effective_types)?;
        let mut flags = FilingFlags::default();
        match opinions.majority_count() {
            0 => {
                warn!(docket_number = %self.docket_number, "no opinions found");
                flags.no_opinions = true;
            }
            1 => {}
            n => {
                warn!(
                    docket_number = %self.docket_number,
                    majorities = n,
                    "excluding filing with several majority opinions from the chart"
                );
                flags.exclude_from_chart = true;
            }
        }
        Ok(Extraction { flags, opinions })
    }
}

/// Review flags stored with a case filing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingFlags {
    pub ends_in_letter: bool,
    pub no_opinions: bool,
    pub exclude_from_chart: bool,
}

impl FilingFlags {
    /// Whether the filing's opinions may feed the agreement chart.
    pub fn charted(&self) -> bool {
        !(self.ends_in_letter || self.no_opinions || self.exclude_from_chart)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub flags: FilingFlags,
    pub opinions: ParsedOpinions,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filing(docket_number: &str, text: &str) -> CaseFiling {
        CaseFiling {
            docket_number: docket_number.into(),
            url: Some(format!("https://www.courtlistener.com/opinion/1/{docket_number}/")),
            plain_text: text.into(),
            sha1: Some("da39a3ee5e6b4b0d3255bfef95601890afd80709".into()),
            filed_on: NaiveDate::from_ymd_opt(2019, 3, 4),
        }
    }

    const MAJORITY: &str =
        "Chief Justice Smith authored the opinion of the court, in which Justices Jones and Lee concurred.";

    #[test]
    fn variant_filing_is_flagged_regardless_of_text() {
        let e = filing("S123A", MAJORITY)
            .extract(&EffectiveTypeTable::default())
            .unwrap();
        assert!(e.flags.ends_in_letter);
        assert!(!e.flags.charted());
        assert_eq!(e.opinions, ParsedOpinions::NoOpinions);
    }

    #[test]
    fn regular_filing_is_charted() {
        let e = filing("S123", MAJORITY)
            .extract(&EffectiveTypeTable::default())
            .unwrap();
        assert_eq!(e.flags, FilingFlags::default());
        assert!(e.flags.charted());
        assert_eq!(e.opinions.opinions().len(), 1);
    }

    #[test]
    fn no_opinions_is_flagged() {
        let e = filing("S124", "Review dismissed.")
            .extract(&EffectiveTypeTable::default())
            .unwrap();
        assert!(e.flags.no_opinions);
        assert!(!e.flags.charted());
    }

    #[test]
    fn several_majorities_are_excluded() {
        let text = format!("{MAJORITY} Justice Jones authored the opinion of the court.");
        let e = filing("S125", &text)
            .extract(&EffectiveTypeTable::default())
            .unwrap();
        assert!(e.flags.exclude_from_chart);
    }

    #[test]
    fn case_filing_json_roundtrip() {
        let f = filing("S245203", MAJORITY);
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"filed_on\":\"2019-03-04\""));
        let parsed: CaseFiling = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, f);
    }
}
