use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use xetf::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show a fund's cached holdings, fetching today's on demand
    Holdings {
        /// Fund ticker
        fund: String,
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Compare holdings across funds
    Compare {
        /// Fund tickers to compare
        #[arg(num_args = 2..)]
        funds: Vec<String>,
        /// Snapshot date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List funds with cached holdings
    Funds,
    /// Fetch today's snapshot for every known fund
    Refresh,
}

impl From<Commands> for xetf::AppCommand {
    fn from(cmd: Commands) -> xetf::AppCommand {
        match cmd {
            Commands::Holdings { fund, date } => xetf::AppCommand::Holdings { fund, date },
            Commands::Compare { funds, date } => xetf::AppCommand::Compare { funds, date },
            Commands::Funds => xetf::AppCommand::Funds,
            Commands::Refresh => xetf::AppCommand::Refresh,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xetf::cli::setup::setup(),
        Some(cmd) => xetf::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
