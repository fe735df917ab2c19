//! Trending-video scrapers.
//!
//! Scraping follows a two-phase pattern per country:
//!
//! 1. **Paging**: walk `videos.list?chart=mostPopular` page by page until the
//!    API stops returning a `nextPageToken`
//! 2. **Extraction**: flatten each page's items into [`TrendingRecord`]s,
//!    dropping videos that carry no statistics
//!
//! Countries run one after another unless a concurrency above 1 is
//! configured. A rate-limit error aborts every country still in flight.
//!
//! [`TrendingRecord`]: crate::models::TrendingRecord

pub mod youtube;
