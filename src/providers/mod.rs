//! Holdings fetchers for the supported ETF issuers.

pub mod ark;
pub mod invesco;
pub mod ishares;
pub mod util;
pub mod zacks;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::core::{HoldingsMap, ScrapeError};

pub use ark::ArkProvider;
pub use invesco::InvescoProvider;
pub use ishares::ISharesProvider;
pub use zacks::ZacksProvider;

/// Request knobs shared by all fetchers.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            user_agent: crate::config::FetchConfig::default().user_agent,
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetchSettings {
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        FetchSettings {
            user_agent: config.fetch.user_agent.clone(),
            timeout: config.fetch_timeout(),
        }
    }

    /// Builds a client with the configured user agent and timeout.
    pub(crate) fn client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()
    }
}

/// A single issuer's holdings fetcher.
///
/// Implementations take a fund ticker and return the fund's holdings as
/// fractional weights keyed by holding ticker. An empty map means the
/// request succeeded but yielded no usable rows; callers decide whether
/// that is an error.
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Fetches current holdings for `fund`, optionally sending extra
    /// request headers on top of the configured defaults.
    async fn fetch_holdings(
        &self,
        fund: &str,
        headers: Option<HeaderMap>,
    ) -> Result<HoldingsMap, ScrapeError>;
}
