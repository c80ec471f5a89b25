use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::core::{HoldingWeight, HoldingsMap};

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Rounds a weight to eight decimal places.
pub fn round8(weight: f64) -> f64 {
    (weight * 1e8).round() / 1e8
}

/// Parses a percentage cell ("4.09", "4.09%", "1,234.5") into a fractional
/// weight. Returns None for unparsable, negative or non-finite values.
pub fn parse_percent_weight(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').replace(',', "");
    let pct: f64 = cleaned.parse().ok()?;
    if !pct.is_finite() || pct < 0.0 {
        return None;
    }
    Some(round8(pct / 100.0))
}

/// Finalizes accumulated per-ticker weights into a holdings map.
pub fn into_holdings(weights: BTreeMap<String, f64>) -> HoldingsMap {
    weights
        .into_iter()
        .map(|(ticker, weight)| (ticker, HoldingWeight::from(round8(weight))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_with_retry_recovers_after_failures() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = with_retry(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            1,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, String> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>("down".to_string()) }
            },
            2,
            1,
        )
        .await;
        assert_eq!(result.unwrap_err(), "down");
        // one initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_parse_percent_weight() {
        assert_eq!(parse_percent_weight("4.09"), Some(0.0409));
        assert_eq!(parse_percent_weight("4.09%"), Some(0.0409));
        assert_eq!(parse_percent_weight("1,234.5"), Some(12.345));
        assert_eq!(parse_percent_weight(" 0.5 "), Some(0.005));
        assert_eq!(parse_percent_weight(""), None);
        assert_eq!(parse_percent_weight("n/a"), None);
        assert_eq!(parse_percent_weight("-1.2"), None);
        assert_eq!(parse_percent_weight("NaN"), None);
    }

    #[test]
    fn test_round8() {
        assert_eq!(round8(0.123456789), 0.12345679);
        assert_eq!(round8(0.1), 0.1);
    }
}
