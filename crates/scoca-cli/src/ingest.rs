//! Ingest pipeline: classifies fetched case filings, extracts and resolves
//! their opinions, and writes each one to DuckDB as soon as it arrives.

use std::time::Instant;

use anyhow::Context;
use scoca_core::{CaseFiling, EffectiveTypeTable, ResolvedOpinion, Roster};
use scoca_store::DuckStore;
use scoca_sync::FilingSink;
use tracing::{info, info_span, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: usize,
    pub inserted: usize,
    pub already_stored: usize,
    pub variants: usize,
    pub no_opinions: usize,
    pub excluded: usize,
    pub opinions: usize,
    pub unresolved: usize,
    pub elapsed_ms: u128,
}

/// Stores case filings one at a time, committing each before the next
/// arrives.
///
/// A filing is written once and never overwritten. Opinions are only saved
/// for newly inserted filings, in the same order they appear in the text.
pub struct Ingester<'a> {
    store: &'a mut DuckStore,
    roster: &'a Roster,
    effective_types: &'a EffectiveTypeTable,
    stats: IngestStats,
    start: Instant,
}

impl<'a> Ingester<'a> {
    pub fn new(
        store: &'a mut DuckStore,
        roster: &'a Roster,
        effective_types: &'a EffectiveTypeTable,
    ) -> Self {
        Self {
            store,
            roster,
            effective_types,
            stats: IngestStats::default(),
            start: Instant::now(),
        }
    }

    pub fn ingest(&mut self, filing: &CaseFiling) -> anyhow::Result<()> {
        let span = info_span!("filing", docket_number = %filing.docket_number);
        let _guard = span.enter();
        self.stats.received += 1;

        let extraction = filing
            .extract(self.effective_types)
            .with_context(|| format!("extracting opinions from {}", filing.docket_number))?;
        let mut flags = extraction.flags;
        let mut resolved: Vec<ResolvedOpinion> = Vec::new();

        let opinions = extraction.opinions.opinions();
        if let Some((majority, secondary)) = opinions.split_first() {
            match majority.resolve(self.roster) {
                Some(m) => {
                    resolved.push(m);
                    resolved.extend(secondary.iter().filter_map(|o| o.resolve(self.roster)));
                }
                None => {
                    warn!(author = majority.author(), "majority author unknown; excluding filing");
                    flags.exclude_from_chart = true;
                }
            }
        }

        if !self
            .store
            .insert_case_filing(filing, flags)
            .with_context(|| format!("storing case filing {}", filing.docket_number))?
        {
            self.stats.already_stored += 1;
            return Ok(());
        }
        self.stats.inserted += 1;
        self.stats.variants += usize::from(flags.ends_in_letter);
        self.stats.no_opinions += usize::from(flags.no_opinions);
        self.stats.excluded += usize::from(flags.exclude_from_chart);

        if resolved.is_empty() {
            return Ok(());
        }
        self.store
            .save_opinions(&filing.docket_number, &resolved)
            .with_context(|| format!("storing opinions of {}", filing.docket_number))?;
        self.stats.opinions += resolved.len();
        self.stats.unresolved += resolved.iter().filter(|o| o.effective_type.is_none()).count();
        Ok(())
    }

    pub fn finish(mut self) -> IngestStats {
        self.stats.elapsed_ms = self.start.elapsed().as_millis();
        let stats = self.stats;
        info!(
            received = stats.received,
            inserted = stats.inserted,
            opinions = stats.opinions,
            flagged = stats.variants + stats.no_opinions + stats.excluded,
            "ingest complete"
        );
        stats
    }
}

impl FilingSink for Ingester<'_> {
    type Error = anyhow::Error;

    fn contains(&mut self, docket_number: &str) -> bool {
        match self.store.has_case_filing(docket_number) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(docket_number, error = %e, "stored-filing lookup failed; fetching anyway");
                false
            }
        }
    }

    fn accept(&mut self, filing: CaseFiling) -> anyhow::Result<()> {
        self.ingest(&filing)
    }
}
