//! Similarity measures over holdings mappings.
//!
//! Pure functions over the query output format; no I/O or caching. Two
//! mappings are compared over the union of their holding tickers, with a
//! missing ticker contributing weight 0.0.

use crate::core::holdings::HoldingsMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMeasure {
    Cosine,
    Jaccard,
    WeightedJaccard,
}

impl SimilarityMeasure {
    pub const ALL: [SimilarityMeasure; 3] = [
        SimilarityMeasure::Cosine,
        SimilarityMeasure::Jaccard,
        SimilarityMeasure::WeightedJaccard,
    ];

    pub fn apply(&self, a: &HoldingsMap, b: &HoldingsMap) -> f64 {
        match self {
            SimilarityMeasure::Cosine => cosine(a, b),
            SimilarityMeasure::Jaccard => jaccard(a, b),
            SimilarityMeasure::WeightedJaccard => weighted_jaccard(a, b),
        }
    }
}

impl Display for SimilarityMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SimilarityMeasure::Cosine => "Cosine",
                SimilarityMeasure::Jaccard => "Jaccard",
                SimilarityMeasure::WeightedJaccard => "Weighted Jaccard",
            }
        )
    }
}

fn ticker_union<'a>(a: &'a HoldingsMap, b: &'a HoldingsMap) -> BTreeSet<&'a str> {
    a.keys()
        .chain(b.keys())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
}

fn weight_of(map: &HoldingsMap, ticker: &str) -> f64 {
    map.get(ticker).map_or(0.0, |h| h.weight)
}

/// Cosine similarity of the two weight vectors. Returns 0.0 when either
/// vector has zero magnitude.
pub fn cosine(a: &HoldingsMap, b: &HoldingsMap) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for ticker in ticker_union(a, b) {
        let wa = weight_of(a, ticker);
        let wb = weight_of(b, ticker);
        dot += wa * wb;
        norm_a += wa * wa;
        norm_b += wb * wb;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Jaccard index over the two ticker sets: |intersection| / |union|.
/// Returns 0.0 when both mappings are empty.
pub fn jaccard(a: &HoldingsMap, b: &HoldingsMap) -> f64 {
    let union = ticker_union(a, b);
    if union.is_empty() {
        return 0.0;
    }
    let intersection = union
        .iter()
        .filter(|t| a.contains_key(**t) && b.contains_key(**t))
        .count();
    intersection as f64 / union.len() as f64
}

/// Weighted Jaccard similarity: sum of per-ticker minimum weights over the
/// sum of per-ticker maximum weights. Returns 0.0 when the maxima sum to 0.
pub fn weighted_jaccard(a: &HoldingsMap, b: &HoldingsMap) -> f64 {
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for ticker in ticker_union(a, b) {
        let wa = weight_of(a, ticker);
        let wb = weight_of(b, ticker);
        min_sum += wa.min(wb);
        max_sum += wa.max(wb);
    }
    if max_sum == 0.0 {
        return 0.0;
    }
    min_sum / max_sum
}

/// Similarity for every unordered fund pair, keyed by the lexicographically
/// ordered (fund, fund) tuple.
pub fn pairwise(
    funds: &BTreeMap<String, HoldingsMap>,
    measure: SimilarityMeasure,
) -> BTreeMap<(String, String), f64> {
    let names: Vec<&String> = funds.keys().collect();
    let mut similarities = BTreeMap::new();
    for (i, first) in names.iter().enumerate() {
        for second in names.iter().skip(i + 1) {
            similarities.insert(
                ((*first).clone(), (*second).clone()),
                measure.apply(&funds[*first], &funds[*second]),
            );
        }
    }
    similarities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::holdings::HoldingWeight;

    fn map(entries: &[(&str, f64)]) -> HoldingsMap {
        entries
            .iter()
            .map(|(t, w)| (t.to_string(), HoldingWeight { weight: *w }))
            .collect()
    }

    #[test]
    fn test_identical_maps_are_fully_similar() {
        let a = map(&[("AAPL", 0.5), ("MSFT", 0.5)]);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-9);
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-9);
        assert!((weighted_jaccard(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_maps_have_zero_similarity() {
        let a = map(&[("A", 0.5), ("B", 0.5)]);
        let b = map(&[("C", 1.0)]);
        assert_eq!(cosine(&a, &b), 0.0);
        assert_eq!(jaccard(&a, &b), 0.0);
        assert_eq!(weighted_jaccard(&a, &b), 0.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        // One shared ticker out of five distinct ones.
        let a = map(&[("A", 0.5), ("B", 0.5)]);
        let b = map(&[("A", 0.1), ("D", 0.3), ("E", 0.3), ("F", 0.3)]);
        assert!((jaccard(&a, &b) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_jaccard_partial_overlap() {
        let a = map(&[("A", 0.5), ("B", 0.5)]);
        let b = map(&[("A", 0.1), ("D", 0.3), ("E", 0.3), ("F", 0.3)]);
        // min sum = 0.1, max sum = 0.5 + 0.5 + 0.3 + 0.3 + 0.3 = 1.9
        let expected = 0.1 / 1.9;
        assert!((weighted_jaccard(&a, &b) - expected).abs() < 1e-9);
        assert!((weighted_jaccard(&b, &a) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_known_value() {
        let a = map(&[("X", 1.0)]);
        let b = map(&[("X", 1.0), ("Y", 1.0)]);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((cosine(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_maps_compare_as_zero() {
        let empty = HoldingsMap::new();
        assert_eq!(cosine(&empty, &empty), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
        assert_eq!(weighted_jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn test_pairwise_orders_fund_pairs() {
        let mut funds = BTreeMap::new();
        funds.insert("SPY".to_string(), map(&[("AAPL", 0.07)]));
        funds.insert("IVV".to_string(), map(&[("AAPL", 0.07)]));
        funds.insert("QQQ".to_string(), map(&[("NVDA", 0.09)]));

        let sims = pairwise(&funds, SimilarityMeasure::Jaccard);
        assert_eq!(sims.len(), 3);
        assert!((sims[&("IVV".to_string(), "SPY".to_string())] - 1.0).abs() < 1e-9);
        assert_eq!(sims[&("IVV".to_string(), "QQQ".to_string())], 0.0);
        assert_eq!(sims[&("QQQ".to_string(), "SPY".to_string())], 0.0);
    }
}
