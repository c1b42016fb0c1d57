//! Long-running pipelines and request-scoped services.
//!
//! Each processor owns its dependencies and exposes either `run*` entry
//! points (sync, ticker, listener-driven callbacks) or request/response
//! methods called from the HTTP layer. Business logic lives here; the
//! handlers stay thin.

pub mod aggregation;
pub mod market_query;
pub mod odds_sync;
pub mod order_service;
pub mod result_sync;
pub mod sync;

/// Unix milliseconds for a DB timestamp (stored as UTC).
pub(crate) fn unix_millis(dt: time::PrimitiveDateTime) -> i64 {
    (dt.assume_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Current unix seconds.
pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
