//! Routing of fund tickers to the fetcher that claims them.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::core::holdings::normalize_ticker;
use crate::core::{HoldingsMap, ScrapeError};
use crate::providers::{
    ArkProvider, FetchSettings, HoldingsProvider, ISharesProvider, InvescoProvider, ZacksProvider,
    ark, invesco, ishares,
};

/// The fetcher a fund ticker resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Ishares,
    Ark,
    Invesco,
    Zacks,
}

impl Source {
    pub fn name(&self) -> &'static str {
        match self {
            Source::Ishares => "ishares",
            Source::Ark => "ark",
            Source::Invesco => "invesco",
            Source::Zacks => "zacks",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fund membership for the issuer fetchers, fixed at construction. Zacks
/// serves any listed ETF and so carries no list of its own.
#[derive(Debug, Clone)]
pub struct ProviderRoster {
    ishares: BTreeSet<String>,
    ark: BTreeSet<String>,
    invesco: BTreeSet<String>,
}

impl ProviderRoster {
    pub fn new<I, A, V>(ishares: I, ark: A, invesco: V) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        fn to_set<T: IntoIterator>(items: T) -> BTreeSet<String>
        where
            T::Item: AsRef<str>,
        {
            items
                .into_iter()
                .map(|fund| fund.as_ref().to_uppercase())
                .collect()
        }

        ProviderRoster {
            ishares: to_set(ishares),
            ark: to_set(ark),
            invesco: to_set(invesco),
        }
    }

    /// Resolves a fund to its source. Issuer lists are checked in a fixed
    /// order; anything unclaimed goes to the Zacks fallback.
    pub fn select(&self, fund: &str) -> Source {
        let fund = fund.to_uppercase();
        if self.ishares.contains(&fund) {
            Source::Ishares
        } else if self.ark.contains(&fund) {
            Source::Ark
        } else if self.invesco.contains(&fund) {
            Source::Invesco
        } else {
            Source::Zacks
        }
    }
}

impl Default for ProviderRoster {
    fn default() -> Self {
        ProviderRoster::new(
            ishares::FUND_PATHS.iter().map(|(fund, _)| *fund),
            ark::FUNDS.iter().copied(),
            invesco::FUNDS.iter().copied(),
        )
    }
}

/// Produces today's holdings for a fund ticker.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, fund: &str) -> Result<HoldingsMap, ScrapeError>;
}

/// Routes each fund to the fetcher its roster entry names. There is no
/// cross-provider fallback: if the selected fetcher fails, the scrape
/// fails.
pub struct HoldingsScraper {
    roster: ProviderRoster,
    ishares: ISharesProvider,
    ark: ArkProvider,
    invesco: InvescoProvider,
    zacks: ZacksProvider,
}

impl HoldingsScraper {
    pub fn new(
        roster: ProviderRoster,
        ishares: ISharesProvider,
        ark: ArkProvider,
        invesco: InvescoProvider,
        zacks: ZacksProvider,
    ) -> Self {
        HoldingsScraper {
            roster,
            ishares,
            ark,
            invesco,
            zacks,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let settings = FetchSettings::from_config(config);
        HoldingsScraper::new(
            ProviderRoster::default(),
            ISharesProvider::new(config.providers.ishares_url(), settings.clone()),
            ArkProvider::new(config.providers.ark_url(), settings.clone()),
            InvescoProvider::new(config.providers.invesco_url(), settings.clone()),
            ZacksProvider::new(config.providers.zacks_url(), settings),
        )
    }
}

#[async_trait]
impl Scraper for HoldingsScraper {
    async fn scrape(&self, fund: &str) -> Result<HoldingsMap, ScrapeError> {
        let fund = normalize_ticker(fund);
        let source = self.roster.select(&fund);
        debug!("Dispatching {} to {}", fund, source);

        let holdings = match source {
            Source::Ishares => self.ishares.fetch_holdings(&fund, None).await?,
            Source::Ark => self.ark.fetch_holdings(&fund, None).await?,
            Source::Invesco => self.invesco.fetch_holdings(&fund, None).await?,
            Source::Zacks => self.zacks.fetch_holdings(&fund, None).await?,
        };

        if holdings.is_empty() {
            return Err(ScrapeError::no_data(&fund, source.name()));
        }

        info!("Scraped {} holdings for {} via {}", holdings.len(), fund, source);
        Ok(holdings)
    }
}
