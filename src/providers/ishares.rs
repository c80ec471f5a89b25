use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::core::{HoldingsMap, ScrapeError};
use crate::providers::util::{into_holdings, parse_percent_weight};
use crate::providers::{FetchSettings, HoldingsProvider};

/// Product page path for each supported fund. The download endpoint hangs
/// off the product path, so funds without an entry here cannot be fetched.
#[rustfmt::skip]
pub const FUND_PATHS: &[(&str, &str)] = &[
    ("IVV",  "/239726/ishares-core-sp-500-etf"),
    ("ITOT", "/239724/ishares-core-sp-total-us-stock-market-etf"),
    ("IWM",  "/239710/ishares-russell-2000-etf"),
    ("IWF",  "/239706/ishares-russell-1000-growth-etf"),
    ("IWD",  "/239708/ishares-russell-1000-value-etf"),
    ("IJH",  "/239763/ishares-core-sp-midcap-etf"),
    ("IJR",  "/239774/ishares-core-sp-smallcap-etf"),
    ("IJK",  "/239762/ishares-sp-midcap-400-growth-etf"),
    ("DGRO", "/264623/ishares-core-dividend-growth-etf"),
    ("HDV",  "/239563/ishares-high-dividend-etf"),
    ("DVY",  "/239500/ishares-select-dividend-etf"),
    ("EFA",  "/239623/ishares-msci-eafe-etf"),
    ("IEFA", "/244049/ishares-core-msci-eafe-etf"),
    ("EEM",  "/239637/ishares-msci-emerging-markets-etf"),
    ("IEMG", "/244050/ishares-core-msci-emerging-markets-etf"),
    ("ACWI", "/239600/ishares-msci-acwi-etf"),
    ("ESGU", "/286007/fund"),
    ("DSI",  "/239667/ishares-msci-kld-400-social-etf"),
    ("IBB",  "/239699/ishares-nasdaq-biotechnology-etf"),
    ("ICLN", "/239738/ishares-global-clean-energy-etf"),
    ("IGV",  "/239771/ishares-north-american-techsoftware-etf"),
    ("ITA",  "/239502/ishares-us-aerospace-defense-etf"),
    ("SOXX", "/239705/ishares-phlx-semiconductor-etf"),
    ("MTUM", "/251614/ishares-msci-usa-momentum-factor-etf"),
    ("QUAL", "/256101/ishares-msci-usa-quality-factor-etf"),
    ("USMV", "/239695/ishares-msci-usa-minimum-volatility-etf"),
    ("VLUE", "/251616/ishares-msci-usa-value-factor-etf"),
    ("URTH", "/239696/ishares-msci-world-etf"),
    ("XT",   "/272532/ishares-exponential-technologies-etf"),
    ("SUSA", "/239692/ishares-msci-usa-esg-select-etf"),
];

const DOWNLOAD_SUFFIX: &str = "/1467271812596.ajax";

// The CSV opens with fund metadata before the holdings table starts.
const PREAMBLE_LINES: usize = 10;

// Column offsets in the holdings table.
const TICKER_COL: usize = 0;
const ASSET_CLASS_COL: usize = 3;
const WEIGHT_COL: usize = 5;

/// Fetches iShares holdings from the product page CSV download.
pub struct ISharesProvider {
    base_url: String,
    settings: FetchSettings,
}

impl ISharesProvider {
    pub fn new(base_url: &str, settings: FetchSettings) -> Self {
        ISharesProvider {
            base_url: base_url.to_string(),
            settings,
        }
    }

    fn download_url(&self, fund: &str) -> Option<String> {
        let fund = fund.to_uppercase();
        let (_, product_path) = FUND_PATHS.iter().find(|(f, _)| *f == fund)?;
        Some(format!(
            "{}/us/products{}{}?fileType=csv&fileName={}_holdings&dataType=fund",
            self.base_url, product_path, DOWNLOAD_SUFFIX, fund
        ))
    }
}

#[async_trait]
impl HoldingsProvider for ISharesProvider {
    fn name(&self) -> &'static str {
        "ishares"
    }

    async fn fetch_holdings(
        &self,
        fund: &str,
        headers: Option<HeaderMap>,
    ) -> Result<HoldingsMap, ScrapeError> {
        let url = self.download_url(fund).ok_or_else(|| {
            ScrapeError::retrieval(fund, self.name(), "no download path configured")
        })?;
        debug!("Requesting iShares holdings from {}", url);

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

        Ok(parse_holdings_csv(&body))
    }
}

/// Extracts equity ticker/weight pairs from the holdings table. Non-equity
/// rows (cash, futures, the column header itself) fail the asset class
/// check and are dropped.
fn parse_holdings_csv(body: &str) -> HoldingsMap {
    let table: String = body
        .lines()
        .skip(PREAMBLE_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut weights: BTreeMap<String, f64> = BTreeMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(table.as_bytes());

    for record in reader.records().flatten() {
        if record.get(ASSET_CLASS_COL).map(str::trim) != Some("Equity") {
            continue;
        }
        let ticker = match record.get(TICKER_COL).map(str::trim) {
            Some(t) if !t.is_empty() => t.to_uppercase(),
            _ => continue,
        };
        let Some(weight) = record.get(WEIGHT_COL).and_then(parse_percent_weight) else {
            continue;
        };
        *weights.entry(ticker).or_default() += weight;
    }

    into_holdings(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn holdings_body(rows: &str) -> String {
        let preamble = "iShares Core S&P 500 ETF\n\
            Fund Holdings as of,\"Jan 02, 2024\"\n\
            Inception Date,\"May 15, 2000\"\n\
            Shares Outstanding,\"850,000,000\"\n\
            Stock,\"-\"\n\
            Bond,\"-\"\n\
            Cash,\"-\"\n\
            Other,\"-\"\n\
            \n\
            \n";
        let header = "Ticker,Name,Sector,Asset Class,Market Value,Weight (%),Notional Value,Shares\n";
        format!("{preamble}{header}{rows}")
    }

    async fn create_ishares_mock_server(fund: &str, body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;
        let (_, product_path) = FUND_PATHS.iter().find(|(f, _)| *f == fund).unwrap();
        let expected_path = format!("/us/products{product_path}{DOWNLOAD_SUFFIX}");

        Mock::given(method("GET"))
            .and(path(&expected_path))
            .and(query_param("fileType", "csv"))
            .and(query_param("fileName", format!("{fund}_holdings")))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_ishares_fetch_parses_equity_rows() {
        let body = holdings_body(
            "AAPL,APPLE INC,Information Technology,Equity,\"300,000\",7.05,\"300,000\",1000\n\
             MSFT,MICROSOFT CORP,Information Technology,Equity,\"280,000\",6.60,\"280,000\",900\n\
             XTSLA,BLK CSH FND TREASURY,Cash and/or Derivatives,Money Market,\"9,000\",0.21,\"9,000\",9000\n",
        );
        let mock_server = create_ishares_mock_server("IVV", &body, 200).await;

        let provider = ISharesProvider::new(&mock_server.uri(), FetchSettings::default());
        let holdings = provider.fetch_holdings("IVV", None).await.unwrap();

        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings["AAPL"].weight, 0.0705);
        assert_eq!(holdings["MSFT"].weight, 0.066);
    }

    #[tokio::test]
    async fn test_ishares_fetch_lowercase_fund() {
        let body = holdings_body(
            "AAPL,APPLE INC,Information Technology,Equity,\"300,000\",7.05,\"300,000\",1000\n",
        );
        let mock_server = create_ishares_mock_server("IVV", &body, 200).await;

        let provider = ISharesProvider::new(&mock_server.uri(), FetchSettings::default());
        let holdings = provider.fetch_holdings("ivv", None).await.unwrap();

        assert_eq!(holdings.len(), 1);
    }

    #[tokio::test]
    async fn test_ishares_unknown_fund() {
        let provider = ISharesProvider::new("http://localhost:9", FetchSettings::default());
        let err = provider.fetch_holdings("ZZZT", None).await.unwrap_err();

        let msg = err.to_string();
        assert!(
            msg.contains("ishares retrieval failed for ZZZT: no download path configured"),
            "{msg}"
        );
    }

    #[tokio::test]
    async fn test_ishares_fetch_http_error() {
        let mock_server = create_ishares_mock_server("IVV", "nope", 403).await;

        let provider = ISharesProvider::new(&mock_server.uri(), FetchSettings::default());
        let err = provider.fetch_holdings("IVV", None).await.unwrap_err();

        assert!(err.to_string().contains("403"), "{err}");
    }
}
