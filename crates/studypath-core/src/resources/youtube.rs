use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{truncate_chars, FetchError, ResourceFetcher, ResourceQuery};
use crate::config::{
    ResourcesConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_YOUTUBE_MAX_RESULTS, DEFAULT_YOUTUBE_URL,
    MAX_DESCRIPTION_CHARS,
};
use crate::roadmap::{Resource, ResourceMetadata, ResourceType};

const SOURCE: &str = "YouTube";

/// Videos kept after filtering.
const MAX_VIDEOS: usize = 3;

/// Accepted video length in minutes.
const MIN_MINUTES: u64 = 5;
const MAX_MINUTES: u64 = 180;

/// YouTube Data API v3 client.
///
/// Searches for tutorial videos, then looks up durations and view counts
/// in a second request. When the detail lookup fails the search results
/// are returned without those fields.
pub struct YouTubeClient {
    api_key: String,
    base_url: String,
    max_results: u32,
    timeout: Duration,
    client: Client,
}

impl YouTubeClient {
    /// Creates a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_YOUTUBE_URL.to_string(),
            max_results: DEFAULT_YOUTUBE_MAX_RESULTS,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            client: Client::new(),
        }
    }

    /// Creates a client from configuration, failing when no key is set.
    pub fn from_config(config: &ResourcesConfig) -> Result<Self, FetchError> {
        config
            .youtube_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .map(Self::new)
            .ok_or(FetchError::MissingApiKey("YOUTUBE_API_KEY"))
    }

    /// Sets the API base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let q = format!("{query} tutorial");
        let max_results = self.max_results.to_string();

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("part", "snippet"),
                ("q", q.as_str()),
                ("type", "video"),
                ("videoDuration", "medium"),
                ("relevanceLanguage", "en"),
                ("order", "relevance"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(SOURCE, status, error_text));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(body.items)
    }

    async fn details(&self, ids: &[&str]) -> Result<Vec<VideoItem>, FetchError> {
        let url = format!("{}/videos", self.base_url);
        let joined = ids.join(",");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("part", "contentDetails,statistics"),
                ("id", joined.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(SOURCE, status, error_text));
        }

        let body: VideosResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(body.items)
    }
}

#[async_trait]
impl ResourceFetcher for YouTubeClient {
    async fn fetch_resources(&self, query: &ResourceQuery) -> Result<Vec<Resource>, FetchError> {
        let items = self.search(&query.search_text()).await?;
        let candidates: Vec<SearchItem> = items
            .into_iter()
            .filter(|item| item.id.video_id.is_some())
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = candidates
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect();
        let details = match self.details(&ids).await {
            Ok(details) => details,
            Err(e) => {
                warn!(error = %e, "video detail lookup failed, using search results only");
                Vec::new()
            }
        };

        let videos = shape_videos(candidates, &details);
        debug!(query = %query.search_text(), count = videos.len(), "fetched videos");
        Ok(videos)
    }
}

/// Turns search hits into resources, dropping videos outside the accepted
/// length when their duration is known.
fn shape_videos(candidates: Vec<SearchItem>, details: &[VideoItem]) -> Vec<Resource> {
    candidates
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let detail = details.iter().find(|d| d.id == video_id);

            let length = detail
                .and_then(|d| d.content_details.as_ref())
                .and_then(|c| parse_iso_duration(&c.duration));
            if let Some(length) = length {
                let minutes = length.as_secs() / 60;
                if !(MIN_MINUTES..=MAX_MINUTES).contains(&minutes) {
                    return None;
                }
            }
            let views = detail
                .and_then(|d| d.statistics.as_ref())
                .and_then(|s| s.view_count.as_deref())
                .and_then(|v| v.parse::<u64>().ok());

            Some((video_id, item.snippet, length, views))
        })
        .take(MAX_VIDEOS)
        .enumerate()
        .map(|(index, (video_id, snippet, length, views))| {
            let description = truncate_chars(&snippet.description, MAX_DESCRIPTION_CHARS);
            let channel = Some(snippet.channel_title).filter(|c| !c.is_empty());
            let thumbnail = snippet
                .thumbnails
                .high
                .or(snippet.thumbnails.default)
                .map(|t| t.url);

            Resource {
                id: format!("resource_yt_{}", index + 1),
                kind: ResourceType::Video,
                title: Some(snippet.title)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Untitled Video".to_string()),
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                description: if description.is_empty() {
                    "No description available".to_string()
                } else {
                    description
                },
                source: channel.clone().unwrap_or_else(|| "Unknown Channel".to_string()),
                metadata: ResourceMetadata {
                    duration: length.map(format_duration),
                    thumbnail,
                    views: views.map(format_views),
                    channel,
                    ..ResourceMetadata::default()
                },
            }
        })
        .collect()
}

/// Parses an ISO 8601 video duration such as `PT1H2M30S`.
pub fn parse_iso_duration(text: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").ok())
        .as_ref()?;

    let caps = re.captures(text)?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let seconds = part(1)?
        .checked_mul(3600)?
        .checked_add(part(2)?.checked_mul(60)?)?
        .checked_add(part(3)?)?;
    Some(Duration::from_secs(seconds))
}

/// Formats as `h:mm:ss`, or `m:ss` under an hour.
pub fn format_duration(length: Duration) -> String {
    let total = length.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Formats a view count as `1.2M`, `345.0K` or the plain number.
pub fn format_views(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        views.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    description: String,
    channel_title: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    content_details: Option<ContentDetails>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT1H2M30S"), Some(Duration::from_secs(3750)));
        assert_eq!(parse_iso_duration("PT15M"), Some(Duration::from_secs(900)));
        assert_eq!(parse_iso_duration("PT45S"), Some(Duration::from_secs(45)));
        assert_eq!(parse_iso_duration("garbage"), None);
        assert_eq!(parse_iso_duration("PT9999999999999999H"), None);
        assert_eq!(parse_iso_duration("PT99999999999999999999S"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3750)), "1:02:30");
        assert_eq!(format_duration(Duration::from_secs(905)), "15:05");
    }

    #[test]
    fn test_format_views() {
        assert_eq!(format_views(1_234_567), "1.2M");
        assert_eq!(format_views(345_000), "345.0K");
        assert_eq!(format_views(999), "999");
    }

    #[test]
    fn test_shape_videos_filters_by_length() {
        let search: SearchResponse = serde_json::from_str(
            r#"{"items":[
                {"id":{"videoId":"short"},"snippet":{"title":"Short","channelTitle":"A"}},
                {"id":{"videoId":"good"},"snippet":{"title":"Good","description":"Learn it","channelTitle":"B",
                  "thumbnails":{"high":{"url":"https://img/good.jpg"}}}},
                {"id":{"kind":"youtube#channel"},"snippet":{"title":"Channel"}},
                {"id":{"videoId":"unknown"},"snippet":{"title":""}}
            ]}"#,
        )
        .unwrap();
        let details: VideosResponse = serde_json::from_str(
            r#"{"items":[
                {"id":"short","contentDetails":{"duration":"PT2M"},"statistics":{"viewCount":"10"}},
                {"id":"good","contentDetails":{"duration":"PT20M5S"},"statistics":{"viewCount":"1500"}}
            ]}"#,
        )
        .unwrap();

        let videos = shape_videos(search.items, &details.items);
        assert_eq!(videos.len(), 2);

        assert_eq!(videos[0].id, "resource_yt_1");
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=good");
        assert_eq!(videos[0].source, "B");
        assert_eq!(videos[0].metadata.duration.as_deref(), Some("20:05"));
        assert_eq!(videos[0].metadata.views.as_deref(), Some("1.5K"));
        assert_eq!(videos[0].metadata.thumbnail.as_deref(), Some("https://img/good.jpg"));

        assert_eq!(videos[1].title, "Untitled Video");
        assert_eq!(videos[1].source, "Unknown Channel");
        assert_eq!(videos[1].description, "No description available");
        assert!(videos[1].metadata.duration.is_none());
    }
}
