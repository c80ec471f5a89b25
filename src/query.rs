//! Multi-fund read facade over the cache store.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::core::holdings::normalize_ticker;
use crate::core::{BatchHoldings, StoreError};
use crate::store::CacheStore;

/// Entry point for callers that think in lists of funds rather than
/// single tickers.
pub struct HoldingsQuery {
    store: Arc<dyn CacheStore>,
}

impl HoldingsQuery {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        HoldingsQuery { store }
    }

    /// Holdings for several funds on one date (today when `None`).
    ///
    /// Tickers are normalized and deduplicated before the lookup, keeping
    /// first occurrence order for the fetch. An input with no usable
    /// tickers at all is an error; individual unavailable funds are not.
    pub async fn holdings_for_tickers(
        &self,
        tickers: &[String],
        date: Option<NaiveDate>,
    ) -> Result<BatchHoldings, StoreError> {
        let mut funds: Vec<String> = Vec::new();
        for raw in tickers {
            let fund = normalize_ticker(raw);
            if fund.is_empty() {
                debug!("Dropping blank fund ticker from query");
                continue;
            }
            if !funds.contains(&fund) {
                funds.push(fund);
            }
        }

        if funds.is_empty() {
            return Err(StoreError::EmptyTickerList);
        }

        self.store.holdings_for_many(&funds, date).await
    }
}
