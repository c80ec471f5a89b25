//! Document backend: one fjall record per fund per day.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{HoldingRecord, HoldingsCache, HoldingsMap, StoreError};
use crate::scrape::Scraper;
use crate::store::{CacheStore, CachedDay};

/// One fund-day snapshot, stored as a JSON document under `fund:date`.
/// An empty holdings map marks the day as incomplete.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    fund: String,
    date: NaiveDate,
    holdings: HoldingsMap,
}

pub struct FjallStore {
    keyspace: Keyspace,
    snapshots: PartitionHandle,
    scraper: Arc<dyn Scraper>,
    front: HoldingsCache,
    workers: usize,
}

impl FjallStore {
    pub fn open(
        path: impl AsRef<Path>,
        scraper: Arc<dyn Scraper>,
        front: HoldingsCache,
        workers: usize,
    ) -> Result<Self, StoreError> {
        let keyspace = Config::new(path.as_ref()).open()?;
        let snapshots = keyspace.open_partition("snapshots", PartitionCreateOptions::default())?;
        debug!("Opened fjall store at {}", path.as_ref().display());

        Ok(FjallStore {
            keyspace,
            snapshots,
            scraper,
            front,
            workers,
        })
    }

    fn key(fund: &str, date: NaiveDate) -> String {
        format!("{fund}:{date}")
    }
}

#[async_trait]
impl CacheStore for FjallStore {
    fn scraper(&self) -> &dyn Scraper {
        self.scraper.as_ref()
    }

    fn front_cache(&self) -> &HoldingsCache {
        &self.front
    }

    fn batch_workers(&self) -> usize {
        self.workers
    }

    async fn known_funds(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut funds = BTreeSet::new();
        for entry in self.snapshots.iter() {
            let (_, value) = entry?;
            let snapshot: Snapshot = serde_json::from_slice(&value)?;
            if !snapshot.holdings.is_empty() {
                funds.insert(snapshot.fund);
            }
        }
        Ok(funds)
    }

    async fn read_day(&self, fund: &str, date: NaiveDate) -> Result<CachedDay, StoreError> {
        let Some(raw) = self.snapshots.get(Self::key(fund, date))? else {
            return Ok(CachedDay::Missing);
        };
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;

        if snapshot.holdings.is_empty() {
            return Ok(CachedDay::Incomplete);
        }

        let rows = snapshot
            .holdings
            .iter()
            .map(|(holding, weight)| HoldingRecord {
                date,
                fund: fund.to_string(),
                holding: holding.clone(),
                weight: weight.weight,
            })
            .collect();
        Ok(CachedDay::Complete(rows))
    }

    async fn clear_day(&self, fund: &str, date: NaiveDate) -> Result<(), StoreError> {
        self.snapshots.remove(Self::key(fund, date))?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    async fn persist_day(
        &self,
        fund: &str,
        date: NaiveDate,
        holdings: &HoldingsMap,
    ) -> Result<(), StoreError> {
        let key = Self::key(fund, date);
        let snapshot = Snapshot {
            fund: fund.to_string(),
            date,
            holdings: holdings.clone(),
        };
        let doc = serde_json::to_vec(&snapshot)?;

        let written = self
            .snapshots
            .insert(&key, doc)
            .map_err(StoreError::from)
            .and_then(|_| {
                self.keyspace
                    .persist(PersistMode::SyncAll)
                    .map_err(StoreError::from)
            });

        if let Err(e) = written {
            // compensating delete keeps the day absent rather than partial
            let _ = self.snapshots.remove(&key);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HoldingWeight;
    use crate::core::holdings::today;
    use crate::store::testing::MockScraper;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_holdings() -> HoldingsMap {
        HoldingsMap::from([
            ("XYZ".to_string(), HoldingWeight::from(0.05)),
            ("QRS".to_string(), HoldingWeight::from(0.10)),
        ])
    }

    fn open_store(dir: &TempDir, scraper: Arc<MockScraper>) -> FjallStore {
        FjallStore::open(
            dir.path().join("snapshots"),
            scraper,
            HoldingsCache::new(16, Duration::from_secs(300)),
            4,
        )
        .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_persist_day_overwrites_existing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, Arc::new(MockScraper::new()));

        store
            .persist_day("AAA", today(), &sample_holdings())
            .await
            .unwrap();
        store
            .persist_day(
                "AAA",
                today(),
                &HoldingsMap::from([("TTT".to_string(), HoldingWeight::from(1.0))]),
            )
            .await
            .unwrap();

        match store.read_day("AAA", today()).await.unwrap() {
            CachedDay::Complete(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].holding, "TTT");
            }
            other => panic!("expected complete day, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_document_reads_as_incomplete_and_repairs() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new().with("AAA", sample_holdings()));
        let store = open_store(&dir, scraper.clone());

        let stub = Snapshot {
            fund: "AAA".to_string(),
            date: today(),
            holdings: HoldingsMap::new(),
        };
        store
            .snapshots
            .insert(
                FjallStore::key("AAA", today()),
                serde_json::to_vec(&stub).unwrap(),
            )
            .unwrap();

        assert_eq!(
            store.read_day("AAA", today()).await.unwrap(),
            CachedDay::Incomplete
        );

        let rows = store.holdings("AAA", None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(scraper.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_known_funds_skips_incomplete_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, Arc::new(MockScraper::new()));

        store
            .persist_day("AAA", today(), &sample_holdings())
            .await
            .unwrap();
        store
            .persist_day("BBB", today(), &HoldingsMap::new())
            .await
            .unwrap();

        let funds: Vec<String> = store.known_funds().await.unwrap().into_iter().collect();
        assert_eq!(funds, vec!["AAA"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_clear_day_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, Arc::new(MockScraper::new()));

        store
            .persist_day("AAA", today(), &sample_holdings())
            .await
            .unwrap();
        store.clear_day("AAA", today()).await.unwrap();

        assert_eq!(
            store.read_day("AAA", today()).await.unwrap(),
            CachedDay::Missing
        );
        store.clear_day("AAA", today()).await.unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_unreadable_document_is_a_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, Arc::new(MockScraper::new()));

        store
            .snapshots
            .insert(FjallStore::key("AAA", today()), b"not json")
            .unwrap();

        let err = store.read_day("AAA", today()).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
