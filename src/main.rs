//! # Trending Scrape
//!
//! Collects YouTube "trending videos" metadata per country through the
//! YouTube Data API v3 and turns it into tabular data.
//!
//! ## Usage
//!
//! ```sh
//! trending_scrape scrape --output-dir data/current
//! trending_scrape normalize --pattern 'data/current/*videos.csv' --output normalized.csv
//! ```
//!
//! ## Architecture
//!
//! 1. **Paging**: walk `videos.list?chart=mostPopular` per country until no
//!    `nextPageToken` is returned
//! 2. **Extraction**: flatten each item into a [`models::TrendingRecord`]
//! 3. **Output**: write `{country}videos.csv` per country once its sweep ends
//! 4. **Normalization**: merge all country files, join category names,
//!    parse dates and drop incomplete rows

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod models;
mod normalize;
mod outputs;
mod scrapers;
mod utils;

use api::{RetryFetch, YouTubeClient};
use cli::{Cli, Command, NormalizeArgs, ScrapeArgs};
use config::{ScrapeConfig, Settings};
use scrapers::youtube::{ScrapeError, scrape_countries};
use utils::{ensure_writable_dir, trending_stamp};

const RATE_LIMIT_MESSAGE: &str = "Temp-Banned due to excess requests, please wait and continue later";

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = match &args.command {
        Command::Scrape(scrape_args) => run_scrape(args.config.as_deref(), scrape_args).await,
        Command::Normalize(normalize_args) => run_normalize(args.config.as_deref(), normalize_args),
    };

    let elapsed = start_time.elapsed();
    match result {
        Ok(()) => {
            info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");
            ExitCode::SUCCESS
        }
        Err(e) if is_rate_limited(e.as_ref()) => {
            error!(?elapsed, error = %e, "{RATE_LIMIT_MESSAGE}");
            eprintln!("{RATE_LIMIT_MESSAGE}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(?elapsed, error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

/// Whether a run failed because the API rate limited a page request.
fn is_rate_limited(e: &(dyn Error + 'static)) -> bool {
    e.downcast_ref::<ScrapeError>()
        .is_some_and(ScrapeError::is_rate_limited)
}

async fn run_scrape(
    settings_path: Option<&Path>,
    scrape_args: &ScrapeArgs,
) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load(settings_path)?;
    scrape_args.apply(&mut settings);
    let config = ScrapeConfig::from_settings(&settings, scrape_args.api_key.clone())?;

    // Fail early on an unwritable output directory, before spending quota.
    ensure_writable_dir(&config.output_dir).await?;

    let client = YouTubeClient::new(&config)?;
    let fetcher = RetryFetch::new(client, config.retries, StdDuration::from_secs(1));
    let stamp = trending_stamp();
    info!(
        countries = config.country_codes.len(),
        trending_date = %stamp,
        retries = config.retries,
        "Starting scrape"
    );

    let files = scrape_countries(
        &fetcher,
        &config.country_codes,
        &config.output_dir,
        config.concurrency,
        &stamp,
    )
    .await?;
    info!(files = files.len(), "All countries written");
    Ok(())
}

fn run_normalize(
    settings_path: Option<&Path>,
    normalize_args: &NormalizeArgs,
) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load(settings_path)?;
    normalize_args.apply(&mut settings);

    let table = normalize::normalize(&settings.csv_pattern, &settings.category_path)?;
    info!(
        rows = table.len(),
        columns = table.columns.len(),
        "Normalized trending table"
    );
    if table.is_empty() {
        warn!(pattern = %settings.csv_pattern, "No complete rows survived normalization");
    }

    if let Some(output) = &normalize_args.output {
        outputs::csv::write_table_csv(output, &table)?;
    }
    Ok(())
}
