use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no results for query")]
    NoResults,

    #[error("no case filing with docket number {0}")]
    UnknownFiling(String),

    #[error("no opinion with id {0}")]
    UnknownOpinion(i64),

    #[error("justice {0} is not in the stored roster")]
    UnknownJustice(String),

    #[error("case filing {docket_number} already has majority opinion #{opinion_id}")]
    MajorityExists {
        docket_number: String,
        opinion_id: i64,
    },

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Core(#[from] scoca_core::CoreError),

    #[error("{0}")]
    Other(String),
}
