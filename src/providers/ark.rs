use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::core::{HoldingsMap, ScrapeError};
use crate::providers::util::{into_holdings, parse_percent_weight, with_retry};
use crate::providers::{FetchSettings, HoldingsProvider};

/// Funds ARK publishes daily holdings CSVs for.
pub const FUNDS: &[&str] = &["ARKK", "ARKW", "ARKQ", "ARKF", "ARKG"];

// Column offsets in the published CSV.
const TICKER_COL: usize = 3;
const WEIGHT_COL: usize = 7;

/// Fetches ARK Invest holdings from their published CSV downloads.
pub struct ArkProvider {
    base_url: String,
    settings: FetchSettings,
}

impl ArkProvider {
    pub fn new(base_url: &str, settings: FetchSettings) -> Self {
        ArkProvider {
            base_url: base_url.to_string(),
            settings,
        }
    }

    fn download_url(&self, fund: &str) -> String {
        format!(
            "{}/wp-content/uploads/funds-etf-csv/ARK_INNOVATION_ETF_{}_HOLDINGS.csv",
            self.base_url,
            fund.to_uppercase()
        )
    }
}

#[async_trait]
impl HoldingsProvider for ArkProvider {
    fn name(&self) -> &'static str {
        "ark"
    }

    async fn fetch_holdings(
        &self,
        fund: &str,
        headers: Option<HeaderMap>,
    ) -> Result<HoldingsMap, ScrapeError> {
        let url = self.download_url(fund);
        debug!("Requesting ARK holdings from {}", url);

        let client = self
            .settings
            .client()
            .map_err(|e| ScrapeError::retrieval(fund, self.name(), e))?;

        // The download endpoint intermittently serves error pages, so bad
        // statuses are retried along with transport failures.
        let response = with_retry(
            || async {
                let mut request = client.get(&url);
                if let Some(extra) = &headers {
                    request = request.headers(extra.clone());
                }
                let response = request
                    .send()
                    .await
                    .map_err(|e| ScrapeError::retrieval(fund, self.name(), e))?;
                if !response.status().is_success() {
                    return Err(ScrapeError::retrieval(
                        fund,
                        self.name(),
                        format!("HTTP {}", response.status()),
                    ));
                }
                Ok(response)
            },
            4,
            500,
        )
        .await?;

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::retrieval(fund, self.name(), e))?;

        Ok(parse_holdings_csv(&body))
    }
}

/// Extracts ticker/weight pairs from the holdings CSV, summing duplicate
/// tickers and dropping rows without a usable ticker or weight.
fn parse_holdings_csv(body: &str) -> HoldingsMap {
    let mut weights: BTreeMap<String, f64> = BTreeMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    for record in reader.records().flatten() {
        let ticker = match record.get(TICKER_COL) {
            Some(t) if !t.trim().is_empty() => t.trim().to_uppercase(),
            _ => continue,
        };
        let Some(weight) = record.get(WEIGHT_COL).and_then(parse_percent_weight) else {
            continue;
        };
        *weights.entry(ticker).or_default() += weight;
    }

    into_holdings(weights)
}
