//! Storage layer: DuckDB tables for case filings, opinions and concurrences.

mod error;
pub use error::StoreError;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{DuckStore, FlaggedFiling, UnresolvedOpinion};
