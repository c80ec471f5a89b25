use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::core::{HoldingsMap, ScrapeError};
use crate::providers::util::{into_holdings, parse_percent_weight};
use crate::providers::{FetchSettings, HoldingsProvider};

/// Matches one holding row inside the `etf_holdings.formatted_data` script
/// blob. The HTML lives inside a JS string, so quotes and slashes appear
/// escaped in the page source. Captures ticker, share count, weight and
/// 52-week change.
static HOLDING_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<span class=\\"hoverquote-symbol\\">([a-zA-Z]*?)<span class=\\"sr-only\\"><\\/span><\\/span><\\/a>", "([0-9,]+)", "([0-9,.]+)", "([0-9,.]+)""#,
    )
    .expect("holdings row pattern")
});

/// Scrapes holdings from the Zacks fund detail page. Unlike the issuer
/// endpoints this serves any listed ETF, which makes it the fallback for
/// funds no issuer fetcher claims.
pub struct ZacksProvider {
    base_url: String,
    settings: FetchSettings,
}

impl ZacksProvider {
    pub fn new(base_url: &str, settings: FetchSettings) -> Self {
        ZacksProvider {
            base_url: base_url.to_string(),
            settings,
        }
    }

    fn page_url(&self, fund: &str) -> String {
        format!("{}/funds/etf/{}/holding", self.base_url, fund.to_uppercase())
    }
}

#[async_trait]
impl HoldingsProvider for ZacksProvider {
    fn name(&self) -> &'static str {
        "zacks"
    }

    async fn fetch_holdings(
        &self,
        fund: &str,
        headers: Option<HeaderMap>,
    ) -> Result<HoldingsMap, ScrapeError> {
        let url = self.page_url(fund);
        debug!("Requesting Zacks holdings page {}", url);

        let client = self
            .settings
            .client()
            .map_err(|e| ScrapeError::retrieval(fund, self.name(), e))?;

        let mut request = client.get(&url);
        if let Some(extra) = headers {
            request = request.headers(extra);
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

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::retrieval(fund, self.name(), e))?;

        Ok(parse_holdings_page(&body))
    }
}

/// Pulls ticker/weight pairs out of the page script. Rows without a ticker
/// (unlisted holdings render an empty symbol span) are dropped and
/// duplicate tickers are summed.
fn parse_holdings_page(body: &str) -> HoldingsMap {
    let mut weights: BTreeMap<String, f64> = BTreeMap::new();

    for captures in HOLDING_ROW.captures_iter(body) {
        let ticker = captures[1].trim().to_uppercase();
        if ticker.is_empty() {
            continue;
        }
        let Some(weight) = parse_percent_weight(&captures[3]) else {
            continue;
        };
        *weights.entry(ticker).or_default() += weight;
    }

    into_holdings(weights)
}
