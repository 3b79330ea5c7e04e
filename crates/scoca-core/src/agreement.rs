//! Pairwise agreement aggregation.
//!
//! Input is one flat stream of [`OpinionRow`]s: one row per (opinion,
//! concurring justice), or one row with no concurring justice for an opinion
//! nobody joined. The stream must be ordered by docket number, then opinion
//! type code, then author, so that each filing's rows are contiguous and its
//! majority opinion comes first. That ordering is the only thing the
//! aggregator relies on from storage, and every violation of it is fatal.
//!
//! # Per-filing relations
//!
//! The majority author is the filing's *anchor*. For one filing:
//!
//! - The author of any opinion and the justices joining it agree with each
//!   other (for the majority opinion this makes every joiner agree with the
//!   anchor).
//! - A concurring opinion's author and joiners agree with the anchor.
//! - A dissenting opinion's author and joiners disagree with the anchor.
//! - A concurring-and-dissenting opinion counts as whichever of the two its
//!   effective type says.
//!
//! Relations are unordered pairs of distinct justices, collected as sets, so
//! one filing contributes at most one agreement and one disagreement to any
//! pair. On flush every agreeing pair gets `agreements += 1, total += 1` and
//! every disagreeing pair gets `total += 1`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use crate::opinion::OpinionType;
use crate::{CoreError, Roster};

/// One row of the ordered opinion/concurrence read-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpinionRow {
    pub docket_number: String,
    pub opinion_id: i64,
    pub kind: OpinionType,
    pub effective_type: Option<OpinionType>,
    /// Shorthand of the authoring justice.
    pub author: String,
    /// Shorthand of one justice joining the opinion, if any.
    pub concurring: Option<String>,
}

/// Unordered pair of two distinct justice shorthands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JusticePair(String, String);

impl JusticePair {
    /// `None` for a self-pair.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self(a.to_string(), b.to_string())),
            std::cmp::Ordering::Greater => Some(Self(b.to_string(), a.to_string())),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }

    pub fn contains(&self, shorthand: &str) -> bool {
        self.0 == shorthand || self.1 == shorthand
    }
}

impl fmt::Display for JusticePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub agreements: u64,
    pub total: u64,
}

impl Tally {
    pub fn rate(&self) -> AgreementRate {
        AgreementRate::from_counts(self.agreements, self.total)
    }
}

/// Percentage of interactions in which a pair agreed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgreementRate {
    /// 0–100, rounded to two decimals.
    Percent(f64),
    /// The pair never interacted.
    NoData,
}

impl AgreementRate {
    pub fn from_counts(agreements: u64, total: u64) -> Self {
        if total == 0 {
            return AgreementRate::NoData;
        }
        let pct = agreements as f64 * 100.0 / total as f64;
        AgreementRate::Percent((pct * 100.0).round() / 100.0)
    }

    pub fn percent(&self) -> Option<f64> {
        match self {
            AgreementRate::Percent(p) => Some(*p),
            AgreementRate::NoData => None,
        }
    }

    /// Legacy numeric encoding: the percentage, or `-1.0` for no data.
    pub fn as_sentinel(&self) -> f64 {
        self.percent().unwrap_or(-1.0)
    }
}

impl fmt::Display for AgreementRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgreementRate::Percent(p) => write!(f, "{p:.2}%"),
            AgreementRate::NoData => f.write_str("no data"),
        }
    }
}

/// Agreement counters for every unordered pair of roster justices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementTally {
    tallies: BTreeMap<JusticePair, Tally>,
}

impl AgreementTally {
    /// Zeroed counters for every pair of distinct roster justices.
    pub fn new(roster: &Roster) -> Self {
        let justices = roster.justices();
        let mut tallies = BTreeMap::new();
        for (i, a) in justices.iter().enumerate() {
            for b in &justices[i + 1..] {
                if let Some(pair) = JusticePair::new(&a.shorthand, &b.shorthand) {
                    tallies.insert(pair, Tally::default());
                }
            }
        }
        Self { tallies }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<Tally> {
        self.tallies.get(&JusticePair::new(a, b)?).copied()
    }

    /// Sum of `total` over every pair involving `shorthand`.
    pub fn interactions(&self, shorthand: &str) -> u64 {
        self.tallies
            .iter()
            .filter(|(pair, _)| pair.contains(shorthand))
            .map(|(_, t)| t.total)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JusticePair, &Tally)> {
        self.tallies.iter()
    }

    pub fn rates(&self) -> RateTable {
        RateTable {
            rates: self
                .tallies
                .iter()
                .map(|(pair, t)| (pair.clone(), t.rate()))
                .collect(),
        }
    }

    fn fold(&mut self, docket_number: &str, relations: &FilingRelations) {
        for (pair, agreed) in relations
            .agree
            .iter()
            .map(|p| (p, true))
            .chain(relations.disagree.iter().map(|p| (p, false)))
        {
            let Some(tally) = self.tallies.get_mut(pair) else {
                warn!(docket_number, %pair, "pair involves a justice outside the roster; skipped");
                continue;
            };
            tally.total += 1;
            if agreed {
                tally.agreements += 1;
            }
        }
    }
}

/// Final agreement rate for every unordered pair of roster justices.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<JusticePair, AgreementRate>,
}

impl RateTable {
    pub fn get(&self, a: &str, b: &str) -> Option<AgreementRate> {
        self.rates.get(&JusticePair::new(a, b)?).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JusticePair, &AgreementRate)> {
        self.rates.iter()
    }
}

/// Agreeing and disagreeing pairs found in one case filing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilingRelations {
    pub agree: BTreeSet<JusticePair>,
    pub disagree: BTreeSet<JusticePair>,
}

impl FilingRelations {
    fn agree(&mut self, a: &str, b: &str) {
        if let Some(pair) = JusticePair::new(a, b) {
            self.agree.insert(pair);
        }
    }

    fn disagree(&mut self, a: &str, b: &str) {
        if let Some(pair) = JusticePair::new(a, b) {
            self.disagree.insert(pair);
        }
    }

    /// Number of relations (agreeing plus disagreeing) involving `shorthand`.
    pub fn count_for(&self, shorthand: &str) -> usize {
        self.agree
            .iter()
            .chain(&self.disagree)
            .filter(|p| p.contains(shorthand))
            .count()
    }
}

#[derive(Debug)]
struct OpinionGroup {
    author: String,
    stance: OpinionType,
    joiners: BTreeSet<String>,
}

#[derive(Debug)]
struct FilingState {
    docket_number: String,
    anchor: String,
    majority_id: i64,
    opinions: BTreeMap<i64, OpinionGroup>,
}

impl FilingState {
    fn add(&mut self, row: OpinionRow, stance: OpinionType) -> Result<(), CoreError> {
        if row.kind == OpinionType::Majority && row.opinion_id != self.majority_id {
            return Err(CoreError::DuplicateMajority {
                docket_number: row.docket_number,
                opinion_id: row.opinion_id,
                first_id: self.majority_id,
            });
        }
        let group = self
            .opinions
            .entry(row.opinion_id)
            .or_insert_with(|| OpinionGroup {
                author: row.author,
                stance,
                joiners: BTreeSet::new(),
            });
        if let Some(justice) = row.concurring {
            group.joiners.insert(justice);
        }
        Ok(())
    }

    fn relations(&self) -> FilingRelations {
        let mut rel = FilingRelations::default();
        for group in self.opinions.values() {
            let members: Vec<&str> = std::iter::once(group.author.as_str())
                .chain(group.joiners.iter().map(String::as_str))
                .collect();
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    rel.agree(a, b);
                }
            }
            match group.stance {
                OpinionType::Concurring => {
                    for m in &members {
                        rel.agree(&self.anchor, m);
                    }
                }
                OpinionType::Dissenting => {
                    for m in &members {
                        rel.disagree(&self.anchor, m);
                    }
                }
                _ => {}
            }
        }
        rel
    }
}

#[derive(Debug)]
enum State {
    AwaitingFiling,
    WithinFiling(FilingState),
}

/// Streaming aggregator over ordered [`OpinionRow`]s.
///
/// Any error returned by [`push`](Self::push) is a consistency violation in
/// the input; the aggregator must then be discarded, since the partial tally
/// is not trustworthy.
#[derive(Debug)]
pub struct Aggregator {
    tally: AgreementTally,
    state: State,
    flushed: HashSet<String>,
}

impl Aggregator {
    pub fn new(roster: &Roster) -> Self {
        Self {
            tally: AgreementTally::new(roster),
            state: State::AwaitingFiling,
            flushed: HashSet::new(),
        }
    }

    pub fn push(&mut self, row: OpinionRow) -> Result<(), CoreError> {
        let stance = stance_of(&row)?;
        if let State::WithinFiling(filing) = &mut self.state
            && filing.docket_number == row.docket_number
        {
            return filing.add(row, stance);
        }

        self.flush();
        if self.flushed.contains(&row.docket_number) {
            return Err(CoreError::OutOfOrder(row.docket_number));
        }
        if row.kind != OpinionType::Majority {
            return Err(CoreError::MissingMajority {
                docket_number: row.docket_number,
                opinion_id: row.opinion_id,
                kind: row.kind,
            });
        }
        let mut filing = FilingState {
            docket_number: row.docket_number.clone(),
            anchor: row.author.clone(),
            majority_id: row.opinion_id,
            opinions: BTreeMap::new(),
        };
        filing.add(row, stance)?;
        self.state = State::WithinFiling(filing);
        Ok(())
    }

    /// Number of filings folded so far (not counting the open one).
    pub fn filings(&self) -> usize {
        self.flushed.len()
    }

    /// Flush the last filing and return the tally.
    pub fn finish(mut self) -> AgreementTally {
        self.flush();
        info!(filings = self.flushed.len(), "agreement tally complete");
        self.tally
    }

    fn flush(&mut self) {
        let State::WithinFiling(filing) =
            std::mem::replace(&mut self.state, State::AwaitingFiling)
        else {
            return;
        };
        let relations = filing.relations();
        debug!(
            docket_number = %filing.docket_number,
            agree = relations.agree.len(),
            disagree = relations.disagree.len(),
            "flushing filing"
        );
        self.tally.fold(&filing.docket_number, &relations);
        self.flushed.insert(filing.docket_number);
    }
}

/// The type a row counts as: its own type, or the effective type of a
/// concurring-and-dissenting opinion.
fn stance_of(row: &OpinionRow) -> Result<OpinionType, CoreError> {
    match (row.kind, row.effective_type) {
        (OpinionType::ConcurringAndDissenting, None) => Err(CoreError::UnresolvedEffectiveType {
            docket_number: row.docket_number.clone(),
            opinion_id: row.opinion_id,
        }),
        (OpinionType::ConcurringAndDissenting, Some(e)) if e.is_stance() => Ok(e),
        (kind, None) => Ok(kind),
        (kind, Some(e)) if kind == e && kind != OpinionType::ConcurringAndDissenting => Ok(kind),
        (kind, Some(effective)) => Err(CoreError::InvalidEffectiveType { kind, effective }),
    }
}

/// Run a whole ordered stream through an [`Aggregator`].
pub fn aggregate<I>(roster: &Roster, rows: I) -> Result<AgreementTally, CoreError>
where
    I: IntoIterator<Item = OpinionRow>,
{
    let mut aggregator = Aggregator::new(roster);
    for row in rows {
        aggregator.push(row)?;
    }
    Ok(aggregator.finish())
}
