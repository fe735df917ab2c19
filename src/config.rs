//! Run configuration: defaults, optional YAML settings, and the input files.
//!
//! Values are resolved in three layers, later layers winning:
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional YAML settings file passed with `--config`
//! 3. Command-line flags
//!
//! The resolved values for a scrape are collected into a [`ScrapeConfig`]
//! that is handed to the fetcher and the pager for the lifetime of one run.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3/videos";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("API key file {0} is empty")]
    EmptyApiKey(PathBuf),
    #[error("invalid country code {code:?} on line {line} of {path}")]
    InvalidCountryCode {
        path: PathBuf,
        line: usize,
        code: String,
    },
    #[error("no country codes found in {0}")]
    NoCountryCodes(PathBuf),
    #[error("invalid settings file {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// File-level settings. Every field is optional in YAML.
///
/// ```yaml
/// key_path: secrets/api_key.txt
/// country_codes_path: country_codes.txt
/// output_dir: data/current
/// concurrency: 2
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub key_path: PathBuf,
    pub country_codes_path: PathBuf,
    pub output_dir: PathBuf,
    pub api_base: String,
    pub max_results: u32,
    pub concurrency: usize,
    pub retries: usize,
    pub timeout_secs: Option<u64>,
    pub csv_pattern: String,
    pub category_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("api_key.txt"),
            country_codes_path: PathBuf::from("country_codes.txt"),
            output_dir: PathBuf::from("data/current"),
            api_base: DEFAULT_API_BASE.to_string(),
            max_results: 50,
            concurrency: 1,
            retries: 0,
            timeout_secs: None,
            csv_pattern: "data/current/*videos.csv".to_string(),
            category_path: PathBuf::from("data/category_id/US_category_id.json"),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or return the defaults when `path` is `None`.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = read_to_string(path)?;
        let settings = serde_yaml::from_str(&text).map_err(|source| ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?settings, "Loaded settings file");
        Ok(settings)
    }
}

/// Everything the fetcher and pager need for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub api_key: String,
    pub country_codes: Vec<String>,
    pub output_dir: PathBuf,
    pub api_base: String,
    pub max_results: u32,
    pub concurrency: usize,
    pub retries: usize,
    pub timeout_secs: Option<u64>,
}

impl ScrapeConfig {
    /// Read the key and country files named in `settings`.
    ///
    /// `api_key_override` (from the CLI or environment) skips the key file.
    #[instrument(level = "info", skip_all)]
    pub fn from_settings(
        settings: &Settings,
        api_key_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_key = match api_key_override {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => read_api_key(&settings.key_path)?,
        };
        let country_codes = read_country_codes(&settings.country_codes_path)?;
        info!(
            countries = country_codes.len(),
            output_dir = %settings.output_dir.display(),
            "Resolved scrape configuration"
        );

        Ok(Self {
            api_key,
            country_codes,
            output_dir: settings.output_dir.clone(),
            api_base: settings.api_base.clone(),
            max_results: settings.max_results,
            concurrency: settings.concurrency.max(1),
            retries: settings.retries,
            timeout_secs: settings.timeout_secs,
        })
    }
}

/// The API key is the first line of the file, surrounding whitespace removed.
pub fn read_api_key(path: &Path) -> Result<String, ConfigError> {
    let text = read_to_string(path)?;
    let key = text.lines().next().unwrap_or_default().trim();
    if key.is_empty() {
        return Err(ConfigError::EmptyApiKey(path.to_path_buf()));
    }
    Ok(key.to_string())
}

/// One two-letter code per line. Blank lines are skipped; codes are
/// upper-cased for the `regionCode` parameter and the output file name.
pub fn read_country_codes(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = read_to_string(path)?;
    let mut codes = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let code = raw.trim();
        if code.is_empty() {
            continue;
        }
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidCountryCode {
                path: path.to_path_buf(),
                line: idx + 1,
                code: code.to_string(),
            });
        }
        codes.push(code.to_ascii_uppercase());
    }
    if codes.is_empty() {
        return Err(ConfigError::NoCountryCodes(path.to_path_buf()));
    }
    Ok(codes)
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
