//! Manual review: finishing flagged filings by hand.

use anyhow::{Context, bail};
use scoca_core::{Opinion, OpinionType, Roster};
use scoca_store::DuckStore;

/// Add an opinion typed in by hand. Every name must resolve against
/// the roster; a typo is an error here, not a warning.
pub fn add_opinion(
    store: &mut DuckStore,
    roster: &Roster,
    docket_number: &str,
    author: &str,
    kind: OpinionType,
    effective_type: Option<OpinionType>,
    concurring: Vec<String>,
) -> anyhow::Result<i64> {
    let opinion = Opinion::new(author, kind, effective_type, concurring)?;
    let Some(resolved) = opinion.resolve(roster) else {
        bail!("{author} is not a justice on the roster");
    };
    if !resolved.unknown.is_empty() {
        bail!("unknown concurring justices: {}", resolved.unknown.join(", "));
    }
    store
        .add_opinion(docket_number, &resolved)
        .with_context(|| format!("adding opinion to {docket_number}"))
}

/// Which review flags to change; `None` leaves a flag as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagChanges {
    pub ends_in_letter: Option<bool>,
    pub no_opinions: Option<bool>,
    pub exclude_from_chart: Option<bool>,
}

pub fn update_flags(
    store: &DuckStore,
    docket_number: &str,
    changes: FlagChanges,
) -> anyhow::Result<scoca_core::FilingFlags> {
    let mut flags = store.filing_flags(docket_number)?;
    if let Some(v) = changes.ends_in_letter {
        flags.ends_in_letter = v;
    }
    if let Some(v) = changes.no_opinions {
        flags.no_opinions = v;
    }
    if let Some(v) = changes.exclude_from_chart {
        flags.exclude_from_chart = v;
    }
    store.set_flags(docket_number, flags)?;
    Ok(flags)
}
