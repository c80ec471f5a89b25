//! Relational backend: normalized fund/holding tables in SQLite.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::debug;

use crate::core::{HoldingRecord, HoldingsCache, HoldingsMap, StoreError};
use crate::scrape::Scraper;
use crate::store::{CacheStore, CachedDay};

/// Fund and holding tickers live in their own tables; a day's snapshot is
/// the set of weighted associations between them for that date.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS funds (
        id INTEGER PRIMARY KEY,
        ticker TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS holdings (
        id INTEGER PRIMARY KEY,
        ticker TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS fund_holdings (
        id INTEGER PRIMARY KEY,
        day DATE NOT NULL,
        fund_id INTEGER NOT NULL REFERENCES funds (id),
        holding_id INTEGER NOT NULL REFERENCES holdings (id),
        weight REAL NOT NULL,
        UNIQUE (fund_id, holding_id, day)
    )",
    "CREATE INDEX IF NOT EXISTS idx_fund_holdings_day ON fund_holdings (fund_id, day)",
];

pub struct SqliteStore {
    pool: SqlitePool,
    scraper: Arc<dyn Scraper>,
    front: HoldingsCache,
    workers: usize,
}

#[derive(sqlx::FromRow)]
struct HoldingRow {
    day: NaiveDate,
    fund: String,
    holding: String,
    weight: f64,
}

impl From<HoldingRow> for HoldingRecord {
    fn from(row: HoldingRow) -> Self {
        HoldingRecord {
            date: row.day,
            fund: row.fund,
            holding: row.holding,
            weight: row.weight,
        }
    }
}

impl SqliteStore {
    pub async fn open(
        path: impl AsRef<Path>,
        scraper: Arc<dyn Scraper>,
        front: HoldingsCache,
        workers: usize,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        debug!("Opened SQLite store at {}", path.as_ref().display());
        let store = SqliteStore {
            pool,
            scraper,
            front,
            workers,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
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
        let funds: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT f.ticker
             FROM funds f
             JOIN fund_holdings fh ON fh.fund_id = f.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(funds.into_iter().collect())
    }

    async fn read_day(&self, fund: &str, date: NaiveDate) -> Result<CachedDay, StoreError> {
        let rows: Vec<HoldingRow> = sqlx::query_as(
            "SELECT fh.day, f.ticker AS fund, h.ticker AS holding, fh.weight
             FROM fund_holdings fh
             JOIN funds f ON f.id = fh.fund_id
             JOIN holdings h ON h.id = fh.holding_id
             WHERE f.ticker = ?1 AND fh.day = ?2
             ORDER BY h.ticker",
        )
        .bind(fund)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        if !rows.is_empty() {
            return Ok(CachedDay::Complete(
                rows.into_iter().map(HoldingRecord::from).collect(),
            ));
        }

        let fund_id: Option<i64> = sqlx::query_scalar("SELECT id FROM funds WHERE ticker = ?1")
            .bind(fund)
            .fetch_optional(&self.pool)
            .await?;

        match fund_id {
            None => Ok(CachedDay::Missing),
            Some(id) => {
                // A fund identity with zero associations on any date is a
                // leftover from an interrupted write.
                let associations: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM fund_holdings WHERE fund_id = ?1")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;
                if associations == 0 {
                    Ok(CachedDay::Incomplete)
                } else {
                    Ok(CachedDay::Missing)
                }
            }
        }
    }

    async fn clear_day(&self, fund: &str, date: NaiveDate) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM fund_holdings
             WHERE day = ?1 AND fund_id IN (SELECT id FROM funds WHERE ticker = ?2)",
        )
        .bind(date)
        .bind(fund)
        .execute(&mut *tx)
        .await?;

        // Drop the fund identity once nothing references it. Holding
        // tickers stay behind as a plain dictionary.
        sqlx::query(
            "DELETE FROM funds
             WHERE ticker = ?1 AND id NOT IN (SELECT DISTINCT fund_id FROM fund_holdings)",
        )
        .bind(fund)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn persist_day(
        &self,
        fund: &str,
        date: NaiveDate,
        holdings: &HoldingsMap,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO funds (ticker) VALUES (?1)")
            .bind(fund)
            .execute(&mut *tx)
            .await?;

        for (holding, weight) in holdings {
            sqlx::query("INSERT OR IGNORE INTO holdings (ticker) VALUES (?1)")
                .bind(holding)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT OR IGNORE INTO fund_holdings (day, fund_id, holding_id, weight)
                 SELECT ?1, f.id, h.id, ?2
                 FROM funds f, holdings h
                 WHERE f.ticker = ?3 AND h.ticker = ?4",
            )
            .bind(date)
            .bind(weight.weight)
            .bind(fund)
            .bind(holding)
            .execute(&mut *tx)
            .await?;
        }

        let written: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM fund_holdings fh
             JOIN funds f ON f.id = fh.fund_id
             WHERE f.ticker = ?1 AND fh.day = ?2",
        )
        .bind(fund)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        if (written as usize) < holdings.len() {
            // dropping the transaction rolls the snapshot back
            return Err(StoreError::Backend(format!(
                "wrote {written} of {} rows for {fund} on {date}",
                holdings.len()
            )));
        }

        tx.commit().await?;
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

    async fn open_store(dir: &TempDir, scraper: Arc<MockScraper>) -> SqliteStore {
        SqliteStore::open(
            dir.path().join("holdings.sqlite3"),
            scraper,
            HoldingsCache::new(16, Duration::from_secs(300)),
            4,
        )
        .await
        .unwrap()
    }

    async fn table_count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn test_persist_normalizes_into_three_tables() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new().with("AAA", sample_holdings()));
        let store = open_store(&dir, scraper).await;

        store.holdings("AAA", None).await.unwrap();

        assert_eq!(table_count(&store.pool, "funds").await, 1);
        assert_eq!(table_count(&store.pool, "holdings").await, 2);
        assert_eq!(table_count(&store.pool, "fund_holdings").await, 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_historical_read_hits_older_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new());
        let store = open_store(&dir, scraper.clone()).await;
        let yesterday = today() - chrono::Duration::days(1);

        store
            .persist_day("AAA", yesterday, &sample_holdings())
            .await
            .unwrap();

        let rows = store.holdings("AAA", Some(yesterday)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, yesterday);
        assert_eq!(scraper.calls(), 0);

        // same fund today is a plain miss, not an incomplete snapshot
        assert_eq!(
            store.read_day("AAA", today()).await.unwrap(),
            CachedDay::Missing
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_orphan_fund_identity_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new().with("AAA", sample_holdings()));
        let store = open_store(&dir, scraper.clone()).await;

        // identity without any associations, as left by an interrupted write
        sqlx::query("INSERT INTO funds (ticker) VALUES ('AAA')")
            .execute(&store.pool)
            .await
            .unwrap();
        assert_eq!(
            store.read_day("AAA", today()).await.unwrap(),
            CachedDay::Incomplete
        );

        let rows = store.holdings("AAA", None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(scraper.calls(), 1);
        assert_eq!(table_count(&store.pool, "funds").await, 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_reopen_after_lost_table_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new().with("AAA", sample_holdings()));
        let store = open_store(&dir, scraper.clone()).await;

        let rows = store.holdings("AAA", None).await.unwrap();
        assert_eq!(scraper.calls(), 1);

        sqlx::query("DROP TABLE fund_holdings")
            .execute(&store.pool)
            .await
            .unwrap();

        // the front cache still serves what it saw before the loss
        assert_eq!(store.holdings("AAA", None).await.unwrap(), rows);
        assert_eq!(scraper.calls(), 1);

        // a fresh store sees the orphaned identity, clears it and refetches
        let scraper2 = Arc::new(MockScraper::new().with("AAA", sample_holdings()));
        let store2 = open_store(&dir, scraper2.clone()).await;
        let rows2 = store2.holdings("AAA", None).await.unwrap();
        assert_eq!(rows2.len(), 2);
        assert_eq!(scraper2.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_clear_day_keeps_fund_with_other_days() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = Arc::new(MockScraper::new());
        let store = open_store(&dir, scraper).await;
        let yesterday = today() - chrono::Duration::days(1);

        store
            .persist_day("AAA", yesterday, &sample_holdings())
            .await
            .unwrap();
        store
            .persist_day("AAA", today(), &sample_holdings())
            .await
            .unwrap();

        store.clear_day("AAA", today()).await.unwrap();

        assert_eq!(table_count(&store.pool, "funds").await, 1);
        assert!(matches!(
            store.read_day("AAA", yesterday).await.unwrap(),
            CachedDay::Complete(_)
        ));

        store.clear_day("AAA", yesterday).await.unwrap();
        assert_eq!(table_count(&store.pool, "funds").await, 0);
    }
}
