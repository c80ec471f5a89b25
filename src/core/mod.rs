//! Core business logic abstractions

pub mod analysis;
pub mod cache;
pub mod error;
pub mod holdings;
pub mod log;

// Re-export main types for cleaner imports
pub use cache::HoldingsCache;
pub use error::{ScrapeError, StoreError};
pub use holdings::{BatchHoldings, HoldingRecord, HoldingWeight, HoldingsMap};
