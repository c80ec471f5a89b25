use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::core::{HoldingsMap, ScrapeError};
use crate::providers::util::{into_holdings, parse_percent_weight};
use crate::providers::{FetchSettings, HoldingsProvider};

/// Funds Invesco serves through its holdings download endpoint.
#[rustfmt::skip]
pub const FUNDS: &[&str] = &[
    "ADRE", "BKLN", "CGW", "CQQQ", "CSD", "CUT", "CVY", "CZA", "DEF", "DJD",
    "DWAS", "EELV", "EEMO", "EQAL", "EQWL", "EWCO", "EWMC", "EWRE", "EWSC",
    "IDHD", "IDHQ", "IDLB", "IDLV", "IDMO", "IPKW", "ISDX", "ISEM", "IUS",
    "IUSS", "IVDG", "IVLC", "IVRA", "IVSG", "KBWB", "KBWR", "OMFL", "OMFS",
    "PBD", "PBDM", "PBE", "PBEE", "PBJ", "PBP", "PBS", "PBSM", "PBUS", "PBW",
    "PCEF", "PDN", "PDP", "PEJ", "PEY", "PEZ", "PFI", "PFM", "PGJ", "PHDG",
    "PHO", "PID", "PIE", "PIN", "PIO", "PIZ", "PJP", "PKB", "PKW", "PNQI",
    "PPA", "PRF", "PRFZ", "PRN", "PSCD", "PSCF", "PSCH", "PSCI", "PSCM",
    "PSCT", "PSCU", "PSI", "PSJ", "PSL", "PSMB", "PSMC", "PSMG", "PSMM",
    "PSP", "PSR", "PTF", "PTH", "PUI", "PWB", "PWC", "PWV", "PXE", "PXF",
    "PXH", "PXI", "PXJ", "PXQ", "PYZ", "QQQ", "QQQJ", "QQQM", "RCD", "RDIV",
    "RFG", "RFV", "RGI", "RHS", "RPG", "RPV", "RSP", "RTM", "RWJ", "RWK",
    "RWL", "RYE", "RYF", "RYH", "RYJ", "RYT", "RYU", "RZG", "RZV", "SPGP",
    "SPHB", "SPHD", "SPHQ", "SPLV", "SPMO", "SPMV", "SPVM", "SPVU", "TAN",
    "USEQ", "USLB", "XLG", "XMHQ", "XMLV", "XMMO", "XMVM", "XRLV", "XSHD",
    "XSHQ", "XSLV", "XSMO", "XSVM",
];

const HOLDINGS_PATH: &str = "/us/financial-products/etfs/holdings/main/holdings/0";

// Column offsets in the download CSV.
const TICKER_COL: usize = 2;
const WEIGHT_COL: usize = 5;

/// Fetches Invesco holdings from their CSV download endpoint.
pub struct InvescoProvider {
    base_url: String,
    settings: FetchSettings,
}

impl InvescoProvider {
    pub fn new(base_url: &str, settings: FetchSettings) -> Self {
        InvescoProvider {
            base_url: base_url.to_string(),
            settings,
        }
    }

    fn download_url(&self, fund: &str) -> String {
        format!(
            "{}{}?audienceType=Investor&action=download&ticker={}",
            self.base_url,
            HOLDINGS_PATH,
            fund.to_uppercase()
        )
    }
}

#[async_trait]
impl HoldingsProvider for InvescoProvider {
    fn name(&self) -> &'static str {
        "invesco"
    }

    async fn fetch_holdings(
        &self,
        fund: &str,
        headers: Option<HeaderMap>,
    ) -> Result<HoldingsMap, ScrapeError> {
        let url = self.download_url(fund);
        debug!("Requesting Invesco holdings from {}", url);

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

/// Extracts ticker/weight pairs from the download CSV. Cash and collateral
/// rows carry a leading dash instead of a ticker and are dropped.
fn parse_holdings_csv(body: &str) -> HoldingsMap {
    let mut weights: BTreeMap<String, f64> = BTreeMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    for record in reader.records().flatten() {
        let ticker = match record.get(TICKER_COL).map(str::trim) {
            Some(t) if !t.is_empty() && !t.starts_with('-') => t.to_uppercase(),
            _ => continue,
        };
        let Some(weight) = record.get(WEIGHT_COL).and_then(parse_percent_weight) else {
            continue;
        };
        *weights.entry(ticker).or_default() += weight;
    }

    into_holdings(weights)
}
