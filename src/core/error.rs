//! Typed failures for the scrape and cache layers.

use chrono::NaiveDate;
use thiserror::Error;

/// Failure modes of a provider fetch or the dispatcher wrapped around it.
///
/// `Retrieval` means the outbound request itself did not succeed; `NoData`
/// means the request succeeded but zero usable rows came back. Callers one
/// level up treat both as "this fund is unavailable right now", but the
/// distinction is preserved for logs and tests.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{provider} retrieval failed for {fund}: {reason}")]
    Retrieval {
        fund: String,
        provider: String,
        reason: String,
    },
    #[error("{provider} returned no holdings for {fund}")]
    NoData { fund: String, provider: String },
}

impl ScrapeError {
    pub fn retrieval(fund: &str, provider: &str, reason: impl std::fmt::Display) -> Self {
        ScrapeError::Retrieval {
            fund: fund.to_string(),
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn no_data(fund: &str, provider: &str) -> Self {
        ScrapeError::NoData {
            fund: fund.to_string(),
            provider: provider.to_string(),
        }
    }
}

/// Failure modes of the cache store contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested date is strictly after today. Hard validation error,
    /// rejected before any I/O.
    #[error("requested date {0} is in the future")]
    FutureDate(NaiveDate),

    /// Cache miss for a past date. Backfill only ever happens for today;
    /// gaps in history are permanent.
    #[error("no cached holdings for {fund} on {date}; only today's data can be fetched")]
    NoHistoricalData { fund: String, date: NaiveDate },

    /// Batch query received no usable fund tickers.
    #[error("no fund tickers given")]
    EmptyTickerList,

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// The storage engine rejected a read or write.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<fjall::Error> for StoreError {
    fn from(err: fjall::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
