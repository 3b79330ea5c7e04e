//! Domain core: reading opinions out of case filing text, resolving justice
//! names against the roster, and folding the results into pairwise
//! agreement rates.

pub mod agreement;
pub mod config;
pub mod docket;
mod error;
pub mod filing;
pub mod names;
pub mod normalize;
pub mod opinion;
pub mod pattern;
pub mod roster;
pub mod schema;

pub use agreement::{
    AgreementRate, AgreementTally, Aggregator, JusticePair, OpinionRow, RateTable, Tally,
    aggregate,
};
pub use config::{Config, CourtListenerConfig, EffectiveTypeEntry};
pub use docket::{DocketNumber, docket_sort_key, is_variant_filing};
pub use error::CoreError;
pub use filing::{CaseFiling, Extraction, FilingFlags};
pub use names::split_justices;
pub use normalize::normalize_whitespace;
pub use opinion::{
    EffectiveTypeTable, Opinion, OpinionType, ParsedOpinions, ResolvedOpinion, parse_opinions,
};
pub use roster::{Justice, Roster};
pub use schema::{batch_from_rows, opinion_rows_schema, rows_from_batch};
