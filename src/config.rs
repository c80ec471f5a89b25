use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Storage engine backing the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Fjall,
}

const ISHARES_URL: &str = "https://www.ishares.com";
const ARK_URL: &str = "https://ark-funds.com";
const INVESCO_URL: &str = "https://www.invesco.com";
const ZACKS_URL: &str = "https://www.zacks.com";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
}

/// Base URL overrides for the provider fetchers. Membership in a provider's
/// fund list is compiled in; only the endpoints are configurable.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub ishares: Option<EndpointConfig>,
    pub ark: Option<EndpointConfig>,
    pub invesco: Option<EndpointConfig>,
    pub zacks: Option<EndpointConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            ishares: Some(EndpointConfig {
                base_url: ISHARES_URL.to_string(),
            }),
            ark: Some(EndpointConfig {
                base_url: ARK_URL.to_string(),
            }),
            invesco: Some(EndpointConfig {
                base_url: INVESCO_URL.to_string(),
            }),
            zacks: Some(EndpointConfig {
                base_url: ZACKS_URL.to_string(),
            }),
        }
    }
}

impl ProvidersConfig {
    fn url_or<'a>(endpoint: &'a Option<EndpointConfig>, fallback: &'a str) -> &'a str {
        endpoint.as_ref().map_or(fallback, |e| e.base_url.as_str())
    }

    pub fn ishares_url(&self) -> &str {
        Self::url_or(&self.ishares, ISHARES_URL)
    }

    pub fn ark_url(&self) -> &str {
        Self::url_or(&self.ark, ARK_URL)
    }

    pub fn invesco_url(&self) -> &str {
        Self::url_or(&self.invesco, INVESCO_URL)
    }

    pub fn zacks_url(&self) -> &str {
        Self::url_or(&self.zacks, ZACKS_URL)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FrontCacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for FrontCacheConfig {
    fn default() -> Self {
        FrontCacheConfig {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:83.0) Gecko/20100101 Firefox/83.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    256
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_batch_workers() -> usize {
    8
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory holding the database files. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub front_cache: FrontCacheConfig,
    #[serde(default = "default_batch_workers")]
    pub batch_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend: StoreBackend::default(),
            data_dir: None,
            providers: ProvidersConfig::default(),
            fetch: FetchConfig::default(),
            front_cache: FrontCacheConfig::default(),
            batch_workers: default_batch_workers(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "xetf", "xetf")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "xetf", "xetf")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Directory for database files, honoring the `data_dir` override.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_path(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn front_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.front_cache.ttl_secs)
    }
}
