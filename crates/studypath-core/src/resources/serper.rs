use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{detect_resource_type, extract_domain, truncate_chars, FetchError, ResourceFetcher, ResourceQuery};
use crate::config::{
    ResourcesConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SERPER_NUM_RESULTS, DEFAULT_SERPER_URL,
    DEFAULT_WEB_RESULTS, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS,
};
use crate::roadmap::{Resource, ResourceMetadata, ResourceType};

const SOURCE: &str = "Serper";

/// Hosts whose results are never kept: videos come from YouTube, and
/// social feeds make poor study material.
const SKIPPED_DOMAINS: &[&str] = &[
    "youtube.com",
    "vimeo.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "reddit.com",
];

/// Fewest results returned when enough candidates exist, reusing domains if needed.
const MIN_WEB_RESULTS: usize = 2;

/// Serper.dev web search client.
pub struct SerperClient {
    api_key: String,
    api_url: String,
    num_results: u32,
    keep: usize,
    timeout: Duration,
    client: Client,
}

impl SerperClient {
    /// Creates a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_SERPER_URL.to_string(),
            num_results: DEFAULT_SERPER_NUM_RESULTS,
            keep: DEFAULT_WEB_RESULTS,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            client: Client::new(),
        }
    }

    /// Creates a client from configuration, failing when no key is set.
    pub fn from_config(config: &ResourcesConfig) -> Result<Self, FetchError> {
        config
            .serper_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .map(Self::new)
            .ok_or(FetchError::MissingApiKey("SERPER_API_KEY"))
    }

    /// Sets the API URL (for proxies and tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ResourceFetcher for SerperClient {
    async fn fetch_resources(&self, query: &ResourceQuery) -> Result<Vec<Resource>, FetchError> {
        let request = SearchRequest {
            q: format!("{} tutorial guide documentation", query.search_text()),
            num: self.num_results,
            gl: "us",
            hl: "en",
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .header("X-API-KEY", &self.api_key)
            .header("content-type", "application/json")
            .json(&request)
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

        let resources = select_results(body.organic, self.keep);
        debug!(query = %request.q, count = resources.len(), "fetched web results");
        Ok(resources)
    }
}

/// Filters, classifies and picks up to `keep` results.
///
/// Documentation comes first. Each domain is used once unless that would
/// leave fewer than two results.
fn select_results(organic: Vec<OrganicResult>, keep: usize) -> Vec<Resource> {
    let mut candidates: Vec<(OrganicResult, String, ResourceType)> = organic
        .into_iter()
        .filter(|r| !r.link.is_empty() && !r.title.is_empty() && !r.snippet.is_empty())
        .filter_map(|r| {
            let domain = extract_domain(&r.link);
            if domain.is_empty() || SKIPPED_DOMAINS.iter().any(|d| is_same_site(&domain, d)) {
                return None;
            }
            let kind = detect_resource_type(&domain, &r.title);
            Some((r, domain, kind))
        })
        .collect();

    // Stable: documentation first, otherwise search order.
    candidates.sort_by_key(|(_, _, kind)| *kind != ResourceType::Documentation);

    let mut picked: Vec<usize> = Vec::new();
    let mut used_domains = HashSet::new();
    for (index, (_, domain, _)) in candidates.iter().enumerate() {
        if picked.len() >= keep {
            break;
        }
        if used_domains.insert(domain.clone()) {
            picked.push(index);
        }
    }
    let floor = MIN_WEB_RESULTS.min(keep);
    for index in 0..candidates.len() {
        if picked.len() >= floor {
            break;
        }
        if !picked.contains(&index) {
            picked.push(index);
        }
    }
    picked.sort_unstable();

    candidates
        .into_iter()
        .enumerate()
        .filter(|(index, _)| picked.contains(index))
        .enumerate()
        .map(|(n, (_, (result, domain, kind)))| Resource {
            id: format!("resource_web_{}", n + 1),
            kind,
            title: truncate_title(&result.title),
            url: result.link,
            description: truncate_chars(&result.snippet, MAX_DESCRIPTION_CHARS),
            source: domain,
            metadata: ResourceMetadata::default(),
        })
        .collect()
}

fn is_same_site(domain: &str, site: &str) -> bool {
    domain == site || domain.ends_with(&format!(".{site}"))
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        title.to_string()
    } else {
        format!("{}...", truncate_chars(title, MAX_TITLE_CHARS))
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest {
    q: String,
    num: u32,
    gl: &'static str,
    hl: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OrganicResult {
    title: String,
    link: String,
    snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, link: &str) -> OrganicResult {
        OrganicResult {
            title: title.to_string(),
            link: link.to_string(),
            snippet: format!("About {title}"),
        }
    }

    #[test]
    fn test_skips_video_and_social_hosts() {
        let picked = select_results(
            vec![
                result("Video", "https://www.youtube.com/watch?v=1"),
                result("Thread", "https://old.reddit.com/r/rust"),
                result("Post", "https://x.com/someone"),
                result("Ownership", "https://example.com/ownership"),
            ],
            3,
        );
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].source, "example.com");
        assert_eq!(picked[0].id, "resource_web_1");
    }

    #[test]
    fn test_documentation_first_and_domains_unique() {
        let picked = select_results(
            vec![
                result("Blog A", "https://blog.example.com/a"),
                result("Blog B", "https://blog.example.com/b"),
                result("Reference", "https://docs.rs/serde"),
                result("Course", "https://learn.example.org/course"),
            ],
            3,
        );
        let urls: Vec<&str> = picked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://docs.rs/serde",
                "https://blog.example.com/a",
                "https://learn.example.org/course"
            ]
        );
        assert_eq!(picked[0].kind, ResourceType::Documentation);
    }

    #[test]
    fn test_same_domain_reused_to_reach_two() {
        let picked = select_results(
            vec![
                result("Part 1", "https://site.com/1"),
                result("Part 2", "https://site.com/2"),
            ],
            3,
        );
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_long_titles_truncated() {
        let long = "x".repeat(100);
        assert_eq!(truncate_title(&long).chars().count(), MAX_TITLE_CHARS + 3);
        assert_eq!(truncate_title("short"), "short");
    }
}
