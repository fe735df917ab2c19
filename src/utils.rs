//! Utility functions for capture stamps, log truncation, and output directories.

use chrono::{DateTime, Local, TimeZone};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Format used for the `trending_date` column: two-digit year, day, month.
pub const TRENDING_DATE_FORMAT: &str = "%y.%d.%m";

/// Capture stamp for records scraped right now.
pub fn trending_stamp() -> String {
    trending_stamp_at(&Local::now())
}

/// Capture stamp for an explicit instant, e.g. `21.15.03` for 2021-03-15.
pub fn trending_stamp_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TRENDING_DATE_FORMAT).to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backed off to a char
/// boundary) with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
