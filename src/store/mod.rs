//! Fetch-or-cache persistence for daily holdings snapshots.

pub mod fjallkv;
pub mod sqlite;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::core::holdings::{normalize_ticker, today, weight_map};
use crate::core::{BatchHoldings, HoldingRecord, HoldingsCache, HoldingsMap, StoreError};
use crate::scrape::{HoldingsScraper, Scraper};

pub use fjallkv::FjallStore;
pub use sqlite::SqliteStore;

/// What a backend holds for one fund on one day.
///
/// `Incomplete` is the crash leftover: the fund is known to the backend
/// but the day has no holdings rows. The caller clears it and refetches.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedDay {
    Missing,
    Incomplete,
    Complete(Vec<HoldingRecord>),
}

/// A holdings cache backed by a storage engine.
///
/// Backends implement the raw day-level reads and writes; the
/// fetch-or-cache orchestration lives in the provided methods so every
/// backend behaves identically. Fund tickers passed to the required
/// methods are already normalized to uppercase.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn scraper(&self) -> &dyn Scraper;

    fn front_cache(&self) -> &HoldingsCache;

    /// Concurrency bound for batch reads.
    fn batch_workers(&self) -> usize;

    /// Funds with at least one cached day of holdings.
    async fn known_funds(&self) -> Result<BTreeSet<String>, StoreError>;

    async fn read_day(&self, fund: &str, date: NaiveDate) -> Result<CachedDay, StoreError>;

    /// Removes the day's rows and, if nothing else references the fund,
    /// the fund identity itself.
    async fn clear_day(&self, fund: &str, date: NaiveDate) -> Result<(), StoreError>;

    /// Writes a full day's snapshot. Must leave the backend either with
    /// the complete snapshot or without the day at all, never partial.
    async fn persist_day(
        &self,
        fund: &str,
        date: NaiveDate,
        holdings: &HoldingsMap,
    ) -> Result<(), StoreError>;

    /// Returns the fund's holdings for the given date (today when `None`),
    /// fetching and caching today's data on a miss.
    ///
    /// Past dates are served from cache only; a miss there is permanent.
    async fn holdings(
        &self,
        fund: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<HoldingRecord>, StoreError> {
        let fund = normalize_ticker(fund);
        let current = today();
        let date = date.unwrap_or(current);
        if date > current {
            return Err(StoreError::FutureDate(date));
        }

        if let Some(rows) = self.front_cache().get(&fund, date).await {
            return Ok(rows);
        }

        match self.read_day(&fund, date).await? {
            CachedDay::Complete(rows) => {
                debug!("Serving {} {} from the backend", fund, date);
                self.front_cache().put(&fund, date, rows.clone()).await;
                return Ok(rows);
            }
            CachedDay::Incomplete => {
                warn!("Clearing incomplete snapshot for {} on {}", fund, date);
                self.front_cache().invalidate(&fund, date).await;
                self.clear_day(&fund, date).await?;
            }
            CachedDay::Missing => {}
        }

        if date != current {
            return Err(StoreError::NoHistoricalData { fund, date });
        }

        let holdings = self.scraper().scrape(&fund).await?;
        self.persist_day(&fund, date, &holdings).await?;
        info!("Cached {} holdings for {} on {}", holdings.len(), fund, date);

        match self.read_day(&fund, date).await? {
            CachedDay::Complete(rows) => {
                self.front_cache().put(&fund, date, rows.clone()).await;
                Ok(rows)
            }
            _ => Err(StoreError::Backend(format!(
                "snapshot for {fund} on {date} not readable after write"
            ))),
        }
    }

    /// Batch variant of [`holdings`](CacheStore::holdings): funds are
    /// fetched concurrently and per-fund failures land in `unavailable`
    /// instead of failing the batch. A future date still fails the whole
    /// call.
    async fn holdings_for_many(
        &self,
        funds: &[String],
        date: Option<NaiveDate>,
    ) -> Result<BatchHoldings, StoreError> {
        let resolved = date.unwrap_or_else(today);
        if resolved > today() {
            return Err(StoreError::FutureDate(resolved));
        }

        let results: Vec<(String, Result<Vec<HoldingRecord>, StoreError>)> =
            stream::iter(funds.iter().cloned().map(|fund| async move {
                let result = self.holdings(&fund, Some(resolved)).await;
                (fund, result)
            }))
            .buffer_unordered(self.batch_workers().max(1))
            .collect()
            .await;

        let mut batch = BatchHoldings::default();
        for (fund, result) in results {
            let fund = normalize_ticker(&fund);
            match result {
                Ok(rows) => {
                    batch.available.insert(fund, weight_map(&rows));
                }
                Err(e) => {
                    warn!("{} unavailable for {}: {}", fund, resolved, e);
                    batch.unavailable.push(fund);
                }
            }
        }
        batch.unavailable.sort();
        batch.unavailable.dedup();
        Ok(batch)
    }
}

/// Opens the backend named by the config, with the scraper and front
/// cache wired in.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>, StoreError> {
    let scraper: Arc<dyn Scraper> = Arc::new(HoldingsScraper::from_config(config));
    let front = HoldingsCache::new(config.front_cache.capacity, config.front_cache_ttl());
    let workers = config.batch_workers.max(1);

    let data_dir = config
        .resolved_data_dir()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    std::fs::create_dir_all(&data_dir).map_err(|e| StoreError::Backend(e.to_string()))?;

    match config.backend {
        StoreBackend::Sqlite => {
            let db_path = data_dir.join("holdings.sqlite3");
            let store = SqliteStore::open(&db_path, scraper, front, workers).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Fjall => {
            let kv_path = data_dir.join("snapshots");
            let store = FjallStore::open(&kv_path, scraper, front, workers)?;
            Ok(Arc::new(store))
        }
    }
}
