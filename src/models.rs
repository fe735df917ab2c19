//! Data models for API pages, flattened trending records, and category mappings.
//!
//! This module defines the core data structures used throughout the application:
//! - [`VideoListResponse`]: One page of the `videos.list` endpoint
//! - [`TrendingRecord`]: One flattened row of a per-country CSV file
//! - [`CategoryList`]: The region-specific `videoCategories` mapping file
//!
//! The API types mirror the camelCase JSON returned by YouTube Data API v3,
//! hence the `#[serde(rename = ...)]` attributes.

use serde::Deserialize;
use std::collections::HashMap;

/// Column order of every per-country CSV file.
pub const CSV_HEADER: [&str; 16] = [
    "video_id",
    "title",
    "publishedAt",
    "channelId",
    "channelTitle",
    "categoryId",
    "trending_date",
    "tags",
    "view_count",
    "likes",
    "dislikes",
    "comment_count",
    "thumbnail_link",
    "comments_disabled",
    "ratings_disabled",
    "description",
];

/// Value emitted in the `tags` column when a video carries no tags.
pub const NO_TAGS: &str = "[none]";

/// One page of `GET /youtube/v3/videos?chart=mostPopular`.
#[derive(Debug, Default, Deserialize)]
pub struct VideoListResponse {
    /// Videos on this page. Missing in the JSON means an empty page.
    #[serde(default)]
    pub items: Vec<VideoItem>,
    /// Cursor for the next page; absent on the last page.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    /// Absent for deleted or unavailable videos.
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoSnippet {
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(rename = "channelId")]
    pub channel_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnails: Option<Thumbnails>,
    #[serde(rename = "channelTitle")]
    pub channel_title: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(rename = "categoryId")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
}

/// Counters as the API returns them: decimal strings, omitted when the
/// creator disabled the corresponding interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoStatistics {
    #[serde(rename = "viewCount")]
    pub view_count: Option<String>,
    #[serde(rename = "likeCount")]
    pub like_count: Option<String>,
    #[serde(rename = "dislikeCount")]
    pub dislike_count: Option<String>,
    #[serde(rename = "commentCount")]
    pub comment_count: Option<String>,
}

/// A single trending observation, flattened for CSV output.
///
/// Field order matches [`CSV_HEADER`]. Values are stored raw; quoting and
/// removal of CSV-unsafe characters happen in [`crate::outputs::csv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingRecord {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
    pub channel_id: String,
    pub channel_title: String,
    pub category_id: String,
    /// Capture stamp in `%y.%d.%m`, taken when the page was scraped.
    pub trending_date: String,
    /// Tags joined with `|`, or [`NO_TAGS`].
    pub tags: String,
    pub view_count: u64,
    pub likes: u64,
    pub dislikes: u64,
    pub comment_count: u64,
    pub thumbnail_link: String,
    pub comments_disabled: bool,
    pub ratings_disabled: bool,
    pub description: String,
}

impl TrendingRecord {
    /// Raw column values in [`CSV_HEADER`] order.
    ///
    /// Booleans are rendered `True`/`False` to keep files compatible with
    /// existing trending datasets.
    pub fn fields(&self) -> [String; 16] {
        [
            self.video_id.clone(),
            self.title.clone(),
            self.published_at.clone(),
            self.channel_id.clone(),
            self.channel_title.clone(),
            self.category_id.clone(),
            self.trending_date.clone(),
            self.tags.clone(),
            self.view_count.to_string(),
            self.likes.to_string(),
            self.dislikes.to_string(),
            self.comment_count.to_string(),
            self.thumbnail_link.clone(),
            bool_field(self.comments_disabled).to_string(),
            bool_field(self.ratings_disabled).to_string(),
            self.description.clone(),
        ]
    }
}

fn bool_field(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// All records scraped for one country during a single run.
#[derive(Debug, Clone)]
pub struct CountryDataset {
    /// Two-letter region code, also the output file prefix.
    pub country_code: String,
    pub records: Vec<TrendingRecord>,
}

/// The `videoCategories.list` dump used to name category ids.
///
/// ```json
/// {"items": [{"id": "10", "snippet": {"title": "Music"}}]}
/// ```
#[derive(Debug, Deserialize)]
pub struct CategoryList {
    #[serde(default)]
    pub items: Vec<CategoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryItem {
    pub id: String,
    pub snippet: CategorySnippet,
}

#[derive(Debug, Deserialize)]
pub struct CategorySnippet {
    pub title: String,
}

impl CategoryList {
    /// Collapse the list into an `id → title` lookup.
    pub fn into_map(self) -> HashMap<String, String> {
        self.items
            .into_iter()
            .map(|item| (item.id, item.snippet.title))
            .collect()
    }
}
