//! Command-line interface definitions.
//!
//! Flags override values from the optional YAML settings file, which in turn
//! override the built-in defaults in [`crate::config::Settings`].

use crate::config::Settings;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Scrape YouTube trending videos per country and normalize the results.
///
/// # Examples
///
/// ```sh
/// # Scrape every country listed in country_codes.txt into data/current
/// trending_scrape scrape
///
/// # Two countries at a time, retrying rate limits up to 3 times
/// trending_scrape scrape --concurrency 2 --retries 3
///
/// # Merge all per-country files into one cleaned table
/// trending_scrape normalize --output data/normalized.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch trending pages for every configured country and write CSVs
    Scrape(ScrapeArgs),
    /// Load scraped CSVs, join category names and drop incomplete rows
    Normalize(NormalizeArgs),
}

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// File whose first line is the API key
    #[arg(long)]
    pub key_path: Option<PathBuf>,

    /// API key; takes precedence over the key file
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// File with one two-letter country code per line
    #[arg(long)]
    pub country_codes_path: Option<PathBuf>,

    /// Directory receiving `{country}videos.csv` files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Countries scraped at the same time
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Retries for rate-limited or failed pages (0 stops on the first rate limit)
    #[arg(long)]
    pub retries: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub struct NormalizeArgs {
    /// Glob matching the per-country CSV files
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Category mapping JSON (`videoCategories.list` dump)
    #[arg(long)]
    pub categories: Option<PathBuf>,

    /// Write the normalized table to this CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ScrapeArgs {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.key_path {
            settings.key_path = path.clone();
        }
        if let Some(path) = &self.country_codes_path {
            settings.country_codes_path = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(n) = self.concurrency {
            settings.concurrency = n;
        }
        if let Some(n) = self.retries {
            settings.retries = n;
        }
        if self.timeout_secs.is_some() {
            settings.timeout_secs = self.timeout_secs;
        }
    }
}

impl NormalizeArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(pattern) = &self.pattern {
            settings.csv_pattern = pattern.clone();
        }
        if let Some(path) = &self.categories {
            settings.category_path = path.clone();
        }
    }
}
