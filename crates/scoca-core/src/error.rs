use thiserror::Error;

use crate::opinion::OpinionType;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown opinion type: {0:?}")]
    UnknownOpinionType(String),

    #[error("unknown opinion type code: {0}")]
    UnknownOpinionTypeCode(i64),

    #[error("{kind} opinion cannot have effective type {effective}")]
    InvalidEffectiveType {
        kind: OpinionType,
        effective: OpinionType,
    },

    // ── Fatal consistency violations (abort aggregation) ──
    #[error("case filing {docket_number}: first opinion #{opinion_id} is {kind}, expected majority")]
    MissingMajority {
        docket_number: String,
        opinion_id: i64,
        kind: OpinionType,
    },

    #[error("case filing {docket_number}: second majority opinion #{opinion_id} (first was #{first_id})")]
    DuplicateMajority {
        docket_number: String,
        opinion_id: i64,
        first_id: i64,
    },

    #[error("opinion #{opinion_id} in {docket_number} is concurring and dissenting with no effective type")]
    UnresolvedEffectiveType {
        docket_number: String,
        opinion_id: i64,
    },

    #[error("case filing {0} reappeared after it was flushed; rows are not ordered by docket number")]
    OutOfOrder(String),

    // ── Roster / configuration ──
    #[error("justice {0:?} appears more than once in the roster")]
    DuplicateJustice(String),

    #[error("justice roster is empty")]
    EmptyRoster,

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}
