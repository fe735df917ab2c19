//! YouTube Data API page fetching with optional backoff retry.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the pager can be driven by any
//! page source:
//! - [`PageFetcher`]: Core trait returning one `videos.list` page
//! - [`YouTubeClient`]: `reqwest` implementation against the real endpoint
//! - [`RetryFetch`]: Decorator that adds retry logic to any `PageFetcher`
//!
//! # Rate limiting
//!
//! HTTP 429, and 403 responses reporting an exhausted quota, come back as
//! [`FetchError::RateLimited`]. Whether that ends the run is the caller's
//! decision; with zero retries configured the binary stops immediately.

use crate::config::ScrapeConfig;
use crate::models::VideoListResponse;
use crate::utils::truncate_for_log;
use rand::{rng, Rng};
use reqwest::StatusCode;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Why a page could not be fetched.
///
/// [`FetchError::RateLimited`] is the only variant callers need to tell
/// apart; everything else ends the run with its message.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited by the YouTube API")]
    RateLimited,
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed page JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Errors worth another attempt when retries are enabled.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited | FetchError::Http(_) => true,
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::Json(_) | FetchError::Url(_) => false,
        }
    }
}

/// A source of `mostPopular` pages for one region.
pub trait PageFetcher {
    /// Fetch the page identified by `page_token`, or the first page when `None`.
    async fn fetch_page(
        &self,
        country_code: &str,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse, FetchError>;
}

impl<T: PageFetcher> PageFetcher for &T {
    async fn fetch_page(
        &self,
        country_code: &str,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse, FetchError> {
        (**self).fetch_page(country_code, page_token).await
    }
}

/// `videos.list` client bound to one API key.
pub struct YouTubeClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    max_results: u32,
}

impl fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("api_base", &self.api_base)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    /// Build a client from the resolved scrape configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the API key, endpoint, page size and optional
    ///   per-request timeout
    ///
    /// # Returns
    ///
    /// A client ready to serve [`PageFetcher::fetch_page`], or
    /// [`FetchError::Http`] if the underlying `reqwest` client cannot be built.
    pub fn new(config: &ScrapeConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(StdDuration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            max_results: config.max_results,
        })
    }

    pub fn request_url(&self, country_code: &str, page_token: Option<&str>) -> Result<Url, FetchError> {
        build_request_url(
            &self.api_base,
            &self.api_key,
            country_code,
            page_token,
            self.max_results,
        )
    }
}

impl PageFetcher for YouTubeClient {
    #[instrument(level = "debug", skip(self), fields(has_token = page_token.is_some()))]
    async fn fetch_page(
        &self,
        country_code: &str,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse, FetchError> {
        let url = self.request_url(country_code, page_token)?;
        let t0 = Instant::now();
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        classify_response(status, &body)
    }
}

/// Build the `videos.list` URL for one page.
///
/// Parameter order: `part`, `pageToken` (when continuing), `chart`,
/// `regionCode`, `maxResults`, `key`.
pub fn build_request_url(
    api_base: &str,
    api_key: &str,
    country_code: &str,
    page_token: Option<&str>,
    max_results: u32,
) -> Result<Url, FetchError> {
    let max_results = max_results.to_string();
    let mut params: Vec<(&str, &str)> = vec![("part", "id,statistics,snippet")];
    if let Some(token) = page_token {
        params.push(("pageToken", token));
    }
    params.extend([
        ("chart", "mostPopular"),
        ("regionCode", country_code),
        ("maxResults", max_results.as_str()),
        ("key", api_key),
    ]);
    Ok(Url::parse_with_params(api_base, &params)?)
}

/// Turn a status and raw body into a page or a typed error.
pub fn classify_response(status: StatusCode, body: &str) -> Result<VideoListResponse, FetchError> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && is_quota_error(body))
    {
        return Err(FetchError::RateLimited);
    }
    error!(
        status = status.as_u16(),
        body = %truncate_for_log(body, 300),
        "Unexpected status from videos.list"
    );
    Err(FetchError::Status {
        status,
        body: body.to_string(),
    })
}

fn is_quota_error(body: &str) -> bool {
    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: ErrorBody,
    }
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: String,
        #[serde(default)]
        errors: Vec<ErrorReason>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorReason {
        #[serde(default)]
        reason: String,
    }

    let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) else {
        return false;
    };
    parsed
        .error
        .message
        .starts_with("The request cannot be completed because you have exceeded your")
        || parsed
            .error
            .errors
            .iter()
            .any(|e| e.reason == "quotaExceeded" || e.reason == "rateLimitExceeded")
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// With `max_retries == 0` every error is returned on the first failure.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    /// Wrap `inner` with exponential backoff.
    ///
    /// # Arguments
    ///
    /// * `inner` - The fetcher to retry
    /// * `max_retries` - Extra attempts after the first failure; 0 passes every
    ///   error straight through
    /// * `base_delay` - Delay before the first retry, doubled per attempt up to 30s
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(
        &self,
        country_code: &str,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_page(country_code, page_token).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retryable() || attempt > self.max_retries {
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch_page() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_first_page_url() {
        let url = build_request_url(
            "https://www.googleapis.com/youtube/v3/videos",
            "KEY",
            "US",
            None,
            50,
        )
        .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["part", "chart", "regionCode", "maxResults", "key"]);
        assert_eq!(pairs[0].1, "id,statistics,snippet");
        assert_eq!(pairs[1].1, "mostPopular");
        assert_eq!(pairs[2].1, "US");
        assert_eq!(pairs[3].1, "50");
        assert_eq!(pairs[4].1, "KEY");
    }

    #[test]
    fn test_continuation_url_carries_token() {
        let url = build_request_url(
            "https://www.googleapis.com/youtube/v3/videos",
            "KEY",
            "GB",
            Some("CDIQAA"),
            50,
        )
        .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[1], ("pageToken".to_string(), "CDIQAA".to_string()));
        assert_eq!(pairs[3].1, "GB");
    }

    #[test]
    fn test_classify_success() {
        let page = classify_response(
            StatusCode::OK,
            r#"{"items": [{"id": "a"}], "nextPageToken": "N"}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("N"));
    }

    #[test]
    fn test_classify_too_many_requests() {
        let err = classify_response(StatusCode::TOO_MANY_REQUESTS, "").unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
    }

    #[test]
    fn test_classify_quota_forbidden() {
        let body = r#"{"error": {"code": 403, "message": "The request cannot be completed because you have exceeded your quota.",
            "errors": [{"reason": "quotaExceeded"}]}}"#;
        let err = classify_response(StatusCode::FORBIDDEN, body).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
    }

    #[test]
    fn test_classify_other_forbidden_keeps_body() {
        let body = r#"{"error": {"code": 403, "message": "API key not valid", "errors": [{"reason": "forbidden"}]}}"#;
        match classify_response(StatusCode::FORBIDDEN, body) {
            Err(FetchError::Status { status, body: raw }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(raw.contains("API key not valid"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_classify_malformed_json() {
        let err = classify_response(StatusCode::OK, "{not json").unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
        assert!(!err.is_retryable());
    }

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl PageFetcher for Flaky {
        async fn fetch_page(
            &self,
            _country_code: &str,
            _page_token: Option<&str>,
        ) -> Result<VideoListResponse, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(FetchError::RateLimited)
            } else {
                Ok(VideoListResponse::default())
            }
        }
    }

    #[tokio::test]
    async fn test_retry_disabled_returns_first_error() {
        let flaky = Flaky { failures: 1, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(&flaky, 0, StdDuration::from_millis(1));
        let res = fetcher.fetch_page("US", None).await;
        assert!(matches!(res, Err(FetchError::RateLimited)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_rate_limit() {
        let flaky = Flaky { failures: 2, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(&flaky, 3, StdDuration::from_millis(1));
        assert!(fetcher.fetch_page("US", None).await.is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Flaky { failures: 10, calls: AtomicUsize::new(0) };
        let fetcher = RetryFetch::new(&flaky, 2, StdDuration::from_millis(1));
        assert!(fetcher.fetch_page("US", None).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }
}
