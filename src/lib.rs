pub mod cli;
pub mod config;
pub mod core;
pub mod providers;
pub mod query;
pub mod scrape;
pub mod store;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Application commands, decoupled from the argument parser so they can
/// be driven from tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Show one fund's holdings for a date (today by default).
    Holdings {
        fund: String,
        date: Option<NaiveDate>,
    },
    /// Compare holdings across several funds.
    Compare {
        funds: Vec<String>,
        date: Option<NaiveDate>,
    },
    /// List funds with cached holdings.
    Funds,
    /// Ensure today's snapshot exists for every known fund.
    Refresh,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ETF holdings cache starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = store::open_store(&config).await?;

    match command {
        AppCommand::Holdings { fund, date } => cli::holdings::run(store, &fund, date).await,
        AppCommand::Compare { funds, date } => cli::compare::run(store, &funds, date).await,
        AppCommand::Funds => cli::funds::run(store).await,
        AppCommand::Refresh => cli::refresh::run(store).await,
    }
}
