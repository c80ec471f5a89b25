//! Core holdings types shared by the scraper, stores and query layers.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weight of one holding as a fraction of the fund's AUM.
///
/// Weights are non-negative but have no upper bound: leveraged funds and
/// provider-side rounding can push a day's sum above 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldingWeight {
    pub weight: f64,
}

impl From<f64> for HoldingWeight {
    fn from(weight: f64) -> Self {
        HoldingWeight { weight }
    }
}

/// Scraped or cached holdings for one fund on one day, keyed by holding ticker.
pub type HoldingsMap = BTreeMap<String, HoldingWeight>;

/// One (date, fund, holding, weight) fact as persisted by a cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub date: NaiveDate,
    pub fund: String,
    pub holding: String,
    pub weight: f64,
}

/// Result of a multi-fund query: resolved funds with their holdings, plus
/// the funds that could not be resolved right now.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchHoldings {
    pub available: BTreeMap<String, HoldingsMap>,
    pub unavailable: Vec<String>,
}

/// Wall-clock "today" used for cache keying and staleness decisions.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Collapses persisted records into the per-ticker weight mapping consumed
/// by downstream callers.
pub fn weight_map(records: &[HoldingRecord]) -> HoldingsMap {
    records
        .iter()
        .map(|r| (r.holding.clone(), HoldingWeight { weight: r.weight }))
        .collect()
}

/// Canonical ticker form: trimmed and upper-cased.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_map_collapses_records() {
        let date = today();
        let records = vec![
            HoldingRecord {
                date,
                fund: "AAA".to_string(),
                holding: "XYZ".to_string(),
                weight: 0.05,
            },
            HoldingRecord {
                date,
                fund: "AAA".to_string(),
                holding: "QRS".to_string(),
                weight: 0.10,
            },
        ];

        let map = weight_map(&records);
        assert_eq!(map.len(), 2);
        assert_eq!(map["XYZ"].weight, 0.05);
        assert_eq!(map["QRS"].weight, 0.10);
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker(" spy "), "SPY");
        assert_eq!(normalize_ticker("arkk"), "ARKK");
        assert_eq!(normalize_ticker(""), "");
    }
}
