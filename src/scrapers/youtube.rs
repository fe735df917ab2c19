//! YouTube `mostPopular` scraper.
//!
//! Pages are requested through any [`PageFetcher`], so the same pager runs
//! against the live API, a retrying wrapper, or in-memory fixture pages.

use crate::api::{FetchError, PageFetcher};
use crate::models::{CountryDataset, NO_TAGS, TrendingRecord, VideoItem};
use crate::outputs::csv::{EmitError, write_country_csv};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// A country that could not be fetched or written, with the cause.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("fetching {country} failed: {source}")]
    Fetch {
        country: String,
        #[source]
        source: FetchError,
    },
    #[error("writing {country} failed: {source}")]
    Emit {
        country: String,
        #[source]
        source: EmitError,
    },
}

impl ScrapeError {
    /// True when the run stopped because a page request was rate limited.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            ScrapeError::Fetch {
                source: FetchError::RateLimited,
                ..
            }
        )
    }
}

/// Flatten one page of items. Items without statistics are skipped.
pub fn extract_records(items: &[VideoItem], trending_date: &str) -> Vec<TrendingRecord> {
    items
        .iter()
        .filter_map(|item| extract_record(item, trending_date))
        .collect()
}

fn extract_record(item: &VideoItem, trending_date: &str) -> Option<TrendingRecord> {
    // No statistics usually means the video was deleted or made private.
    let statistics = item.statistics.as_ref()?;
    let snippet = &item.snippet;

    let parse_count = |s: Option<&String>| -> u64 { s.and_then(|s| s.parse().ok()).unwrap_or(0) };

    // The API omits counters instead of zeroing them when the creator
    // disabled ratings or comments.
    let (likes, dislikes, ratings_disabled) =
        match (&statistics.like_count, &statistics.dislike_count) {
            (Some(likes), Some(dislikes)) => (
                parse_count(Some(likes)),
                parse_count(Some(dislikes)),
                false,
            ),
            _ => (0, 0, true),
        };
    let (comment_count, comments_disabled) = match &statistics.comment_count {
        Some(count) => (parse_count(Some(count)), false),
        None => (0, true),
    };

    let tags = match &snippet.tags {
        Some(tags) => tags.join("|"),
        None => NO_TAGS.to_string(),
    };
    let thumbnail_link = snippet
        .thumbnails
        .as_ref()
        .and_then(|t| t.default.as_ref())
        .map(|t| t.url.clone())
        .unwrap_or_default();

    Some(TrendingRecord {
        video_id: item.id.clone(),
        title: snippet.title.clone().unwrap_or_default(),
        published_at: snippet.published_at.clone().unwrap_or_default(),
        channel_id: snippet.channel_id.clone().unwrap_or_default(),
        channel_title: snippet.channel_title.clone().unwrap_or_default(),
        category_id: snippet.category_id.clone().unwrap_or_default(),
        trending_date: trending_date.to_string(),
        tags,
        view_count: parse_count(statistics.view_count.as_ref()),
        likes,
        dislikes,
        comment_count,
        thumbnail_link,
        comments_disabled,
        ratings_disabled,
        description: snippet.description.clone().unwrap_or_default(),
    })
}

/// Walk every page for `country_code` and collect the extracted records.
///
/// Stops when a page comes back without `nextPageToken`. There is no page
/// cap and no de-duplication across pages.
#[instrument(level = "info", skip(fetcher, trending_date))]
pub async fn fetch_country<F: PageFetcher>(
    fetcher: &F,
    country_code: &str,
    trending_date: &str,
) -> Result<CountryDataset, FetchError> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetcher
            .fetch_page(country_code, page_token.as_deref())
            .await?;
        pages += 1;

        let extracted = extract_records(&page.items, trending_date);
        debug!(
            page = pages,
            items = page.items.len(),
            kept = extracted.len(),
            "Extracted page"
        );
        records.extend(extracted);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    info!(pages, records = records.len(), "Finished country");
    Ok(CountryDataset {
        country_code: country_code.to_string(),
        records,
    })
}

/// Scrape every country and write one CSV per country into `output_dir`.
///
/// Each country's file is written as soon as its sweep completes. The first
/// error stops the run; countries still in flight are dropped unwritten.
#[instrument(level = "info", skip_all, fields(countries = country_codes.len(), concurrency = concurrency))]
pub async fn scrape_countries<F: PageFetcher>(
    fetcher: &F,
    country_codes: &[String],
    output_dir: &Path,
    concurrency: usize,
    trending_date: &str,
) -> Result<Vec<PathBuf>, ScrapeError> {
    let mut written = Vec::with_capacity(country_codes.len());

    let mut results = stream::iter(country_codes.iter().unique())
        .map(|code| async move {
            let dataset = fetch_country(fetcher, code, trending_date)
                .await
                .map_err(|source| ScrapeError::Fetch {
                    country: code.clone(),
                    source,
                })?;
            write_country_csv(output_dir, &dataset)
                .await
                .map_err(|source| ScrapeError::Emit {
                    country: code.clone(),
                    source,
                })
        })
        .buffer_unordered(concurrency.max(1));

    while let Some(result) = results.next().await {
        written.push(result?);
    }

    info!(files = written.len(), "Scrape complete");
    Ok(written)
}
