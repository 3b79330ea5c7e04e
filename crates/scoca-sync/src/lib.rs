//! Sync layer: CourtListener REST client and the opinion posting schedule.

pub mod query;
pub mod schedule;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{CourtListenerClient, FilingSink, SyncError, WalkSummary};
pub use query::{FilterValue, filters_to_query};
pub use schedule::{fetch_is_current, next_posting_date};
