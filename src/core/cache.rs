//! Bounded, time-aware front cache for per-(fund, date) query results.
//!
//! Sits in front of a cache store backend so repeat lookups within the TTL
//! skip the storage engine entirely. Entries expire after the TTL, the
//! oldest entry is evicted when the capacity bound is hit, and entries can
//! be invalidated explicitly when a day's rows are cleared.

use crate::core::holdings::HoldingRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Entry {
    rows: Vec<HoldingRecord>,
    stored_at: Instant,
    seq: u64,
}

struct Inner {
    entries: HashMap<(String, NaiveDate), Entry>,
    next_seq: u64,
}

pub struct HoldingsCache {
    inner: Arc<Mutex<Inner>>,
    capacity: usize,
    ttl: Duration,
}

impl HoldingsCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            })),
            capacity,
            ttl,
        }
    }

    pub async fn get(&self, fund: &str, date: NaiveDate) -> Option<Vec<HoldingRecord>> {
        let key = (fund.to_string(), date);
        let mut inner = self.inner.lock().await;
        match inner.entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() >= self.ttl => {
                debug!("Front cache entry expired for {fund} on {date}");
                inner.entries.remove(&key);
                None
            }
            Some(entry) => {
                debug!("Front cache HIT for {fund} on {date}");
                Some(entry.rows.clone())
            }
            None => {
                debug!("Front cache MISS for {fund} on {date}");
                None
            }
        }
    }

    pub async fn put(&self, fund: &str, date: NaiveDate, rows: Vec<HoldingRecord>) {
        if self.capacity == 0 {
            return;
        }
        let key = (fund.to_string(), date);
        let mut inner = self.inner.lock().await;
        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            // Evict the entry that has been resident the longest.
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone())
            {
                debug!("Front cache EVICT for {} on {}", oldest.0, oldest.1);
                inner.entries.remove(&oldest);
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!("Front cache PUT for {fund} on {date}");
        inner.entries.insert(
            key,
            Entry {
                rows,
                stored_at: Instant::now(),
                seq,
            },
        );
    }

    pub async fn invalidate(&self, fund: &str, date: NaiveDate) {
        let key = (fund.to_string(), date);
        let mut inner = self.inner.lock().await;
        if inner.entries.remove(&key).is_some() {
            debug!("Front cache INVALIDATE for {fund} on {date}");
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::holdings::today;
    use tokio::time::sleep;

    fn sample_rows(fund: &str, date: NaiveDate) -> Vec<HoldingRecord> {
        vec![HoldingRecord {
            date,
            fund: fund.to_string(),
            holding: "XYZ".to_string(),
            weight: 0.05,
        }]
    }

    #[tokio::test]
    async fn test_get_put_roundtrip() {
        let cache = HoldingsCache::new(8, Duration::from_secs(60));
        let date = today();

        assert!(cache.get("AAA", date).await.is_none());

        cache.put("AAA", date, sample_rows("AAA", date)).await;
        let rows = cache.get("AAA", date).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].holding, "XYZ");

        assert!(cache.get("BBB", date).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = HoldingsCache::new(8, Duration::from_millis(10));
        let date = today();

        cache.put("AAA", date, sample_rows("AAA", date)).await;
        assert!(cache.get("AAA", date).await.is_some());

        sleep(Duration::from_millis(20)).await;
        assert!(cache.get("AAA", date).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = HoldingsCache::new(2, Duration::from_secs(60));
        let date = today();

        cache.put("AAA", date, sample_rows("AAA", date)).await;
        cache.put("BBB", date, sample_rows("BBB", date)).await;
        cache.put("CCC", date, sample_rows("CCC", date)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("AAA", date).await.is_none());
        assert!(cache.get("BBB", date).await.is_some());
        assert!(cache.get("CCC", date).await.is_some());
    }

    #[tokio::test]
    async fn test_explicit_invalidation() {
        let cache = HoldingsCache::new(8, Duration::from_secs(60));
        let date = today();

        cache.put("AAA", date, sample_rows("AAA", date)).await;
        cache.invalidate("AAA", date).await;
        assert!(cache.get("AAA", date).await.is_none());
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_caching() {
        let cache = HoldingsCache::new(0, Duration::from_secs(60));
        let date = today();

        cache.put("AAA", date, sample_rows("AAA", date)).await;
        assert!(cache.get("AAA", date).await.is_none());
    }
}
