//! tradeday CLI: keep a store of daily NYSE price files up to date.
//!
//! Commands:
//! - `download`: fetch every missing trading day in the lookback window
//! - `inventory`: list the days already stored at a destination
//! - `calendar`: print NYSE sessions for a date range

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tradeday_core::data::YahooProvider;
use tradeday_core::storage::{DayStore, Destination, GcsStore, LocalStore};
use tradeday_core::{
    download_missing_days, AppConfig, LogProgress, LookbackWindow, NyseCalendar,
    TradingCalendar, Universe,
};

#[derive(Parser)]
#[command(
    name = "tradeday",
    about = "tradeday: daily S&P 500 price files for NYSE trading days"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download prices for every trading day in the window that is not stored yet.
    Download {
        /// Number of calendar days to look back, not counting today.
        #[arg(long)]
        days: Option<u32>,

        /// Write to this existing directory instead of the cloud bucket.
        #[arg(long)]
        local: Option<PathBuf>,

        /// TOML config file. Defaults to ./tradeday.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the dates already stored at a destination.
    Inventory {
        /// Read this directory instead of the cloud bucket.
        #[arg(long)]
        local: Option<PathBuf>,

        /// TOML config file. Defaults to ./tradeday.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print NYSE sessions between two dates (inclusive).
    Calendar {
        /// First date (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// Last date (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            days,
            local,
            config,
        } => run_download(days, local, config.as_deref()),
        Commands::Inventory { local, config } => run_inventory(local, config.as_deref()),
        Commands::Calendar { start, end } => run_calendar(start, end),
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .init();
}

/// Pick the destination for `local`.
///
/// A local path that is not an existing directory ends the process here,
/// before the config is read or anything is fetched or written.
fn resolve_destination(local: Option<PathBuf>) -> Destination {
    let destination = Destination::resolve(local);
    if let Destination::Local(dir) = &destination {
        if let Err(err) = LocalStore::check_dir(dir) {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
    destination
}

/// Open the store for a resolved destination.
fn open_store(destination: Destination, config: &AppConfig) -> Result<Box<dyn DayStore>> {
    let prefix = config.download.file_prefix.clone();

    let store: Box<dyn DayStore> = match destination {
        Destination::Local(dir) => Box::new(LocalStore::open(dir, prefix)?),
        Destination::Cloud => Box::new(GcsStore::new(&config.gcs, prefix)?),
    };
    Ok(store)
}

fn run_download(
    days: Option<u32>,
    local: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let destination = resolve_destination(local);
    let config = AppConfig::load(config_path)?;
    let store = open_store(destination, &config)?;
    store.prepare()?;

    let universe = Universe::sp500_sample();
    let provider = YahooProvider::new(&config.yahoo)?;
    let window = LookbackWindow::new(
        days.unwrap_or(config.download.lookback_days),
        chrono::Local::now().date_naive(),
    );

    download_missing_days(
        &NyseCalendar::new(),
        store.as_ref(),
        &provider,
        &universe.tickers(),
        &window,
        &LogProgress,
    )?;
    Ok(())
}

fn run_inventory(local: Option<PathBuf>, config_path: Option<&Path>) -> Result<()> {
    let destination = resolve_destination(local);
    let config = AppConfig::load(config_path)?;
    let store = open_store(destination, &config)?;
    let inventory = store.inventory()?;

    if inventory.is_empty() {
        println!("No days stored in {} storage.", store.name());
        return Ok(());
    }

    for date in inventory.dates() {
        println!("{date}");
    }
    println!("{} days stored in {} storage.", inventory.len(), store.name());
    Ok(())
}

fn run_calendar(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        bail!("--end ({end}) is before --start ({start})");
    }

    let calendar = NyseCalendar::new();
    let sessions = calendar.schedule(start, end);

    println!("{:<12} {:>6} {:>6}  NOTE", "DATE", "OPEN", "CLOSE");
    for session in sessions.values() {
        println!(
            "{:<12} {:>6} {:>6}  {}",
            session.date.to_string(),
            session.market_open.format("%H:%M").to_string(),
            session.market_close.format("%H:%M").to_string(),
            if session.early_close { "early close" } else { "" }
        );
    }
    println!(
        "{} sessions between {start} and {end} (times in UTC).",
        sessions.len()
    );
    Ok(())
}
