use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{FetchError, ResourceFetcher, ResourceQuery, SerperClient, YouTubeClient};
use crate::config::{
    ResourcesConfig, DEFAULT_GENERATION_BASE_DELAY_MS, DEFAULT_GENERATION_RETRIES,
    DEFAULT_RESOURCES_PER_NODE, DEFAULT_VIDEOS_PER_NODE,
};
use crate::generator::backoff_delay;
use crate::roadmap::{Resource, ResourceType};

/// Combines a video source and a web source into one resource list.
///
/// Both sources are queried concurrently. The list holds the first
/// documentation result, then up to `videos_per_node` videos, then the
/// remaining web results, capped at `per_node`. Ids are reassigned as
/// `resource_1..n`.
///
/// Each source is retried with exponential backoff on transient errors. A
/// source that still fails is logged and skipped; only when every
/// configured source fails is an error returned, classified as rate
/// limiting, timeout or generic failure.
pub struct MixedResourceFetcher {
    videos: Option<Box<dyn ResourceFetcher>>,
    web: Option<Box<dyn ResourceFetcher>>,
    per_node: usize,
    videos_per_node: usize,
    max_retries: u32,
    base_delay: Duration,
}

impl Default for MixedResourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MixedResourceFetcher {
    /// Creates a fetcher with no sources.
    pub fn new() -> Self {
        Self {
            videos: None,
            web: None,
            per_node: DEFAULT_RESOURCES_PER_NODE,
            videos_per_node: DEFAULT_VIDEOS_PER_NODE,
            max_retries: DEFAULT_GENERATION_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_GENERATION_BASE_DELAY_MS),
        }
    }

    /// Builds YouTube and Serper sources for whichever API keys are configured.
    pub fn from_config(config: &ResourcesConfig) -> Self {
        let mut fetcher = Self::new().with_limits(config.per_node, config.videos_per_node);

        match YouTubeClient::from_config(config) {
            Ok(client) => fetcher = fetcher.with_videos(client),
            Err(e) => debug!(error = %e, "video search disabled"),
        }
        match SerperClient::from_config(config) {
            Ok(client) => fetcher = fetcher.with_web(client),
            Err(e) => debug!(error = %e, "web search disabled"),
        }

        fetcher
    }

    pub fn with_videos(mut self, source: impl ResourceFetcher + 'static) -> Self {
        self.videos = Some(Box::new(source));
        self
    }

    pub fn with_web(mut self, source: impl ResourceFetcher + 'static) -> Self {
        self.web = Some(Box::new(source));
        self
    }

    /// Sets the list size and how many of its entries may be videos.
    pub fn with_limits(mut self, per_node: usize, videos_per_node: usize) -> Self {
        self.per_node = per_node;
        self.videos_per_node = videos_per_node;
        self
    }

    /// Overrides the per-source retry policy.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Whether at least one source is configured.
    pub fn is_configured(&self) -> bool {
        self.videos.is_some() || self.web.is_some()
    }

    /// Queries one source, retrying transient errors. `None` when the
    /// source is not configured.
    async fn query_source(
        &self,
        name: &'static str,
        source: Option<&dyn ResourceFetcher>,
        query: &ResourceQuery,
    ) -> Option<Result<Vec<Resource>, FetchError>> {
        let source = source?;
        let mut attempt = 0;
        loop {
            match source.fetch_resources(query).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.base_delay, attempt);
                    warn!(
                        source = name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "resource search failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return Some(outcome),
            }
        }
    }
}

#[async_trait]
impl ResourceFetcher for MixedResourceFetcher {
    async fn fetch_resources(&self, query: &ResourceQuery) -> Result<Vec<Resource>, FetchError> {
        if !self.is_configured() {
            return Err(FetchError::NotConfigured);
        }

        let (videos, web) = tokio::join!(
            self.query_source("videos", self.videos.as_deref(), query),
            self.query_source("web", self.web.as_deref(), query),
        );

        let mut failures = Vec::new();
        let mut answered = false;
        let mut take = |name: &str, outcome: Option<Result<Vec<Resource>, FetchError>>| match outcome {
            Some(Ok(list)) => {
                answered = true;
                list
            }
            Some(Err(e)) => {
                warn!(source = name, error = %e, "resource source failed");
                failures.push(e);
                Vec::new()
            }
            None => Vec::new(),
        };
        let videos = take("videos", videos);
        let web = take("web", web);

        if !answered {
            return Err(classify_failures(failures));
        }

        Ok(mix(videos, web, self.per_node, self.videos_per_node))
    }
}

/// Picks the error reported when every source failed: rate limiting
/// first, then timeouts, then a single error as is, else a summary.
fn classify_failures(mut failures: Vec<FetchError>) -> FetchError {
    if let Some(index) = failures
        .iter()
        .position(|e| matches!(e, FetchError::RateLimited(_)))
    {
        return failures.swap_remove(index);
    }
    if let Some(index) = failures
        .iter()
        .position(|e| matches!(e, FetchError::Timeout(_)))
    {
        return failures.swap_remove(index);
    }
    if failures.len() == 1 {
        if let Some(only) = failures.pop() {
            return only;
        }
    }
    let summary = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    FetchError::AllSourcesFailed(summary)
}

/// Orders and numbers the combined list.
pub(crate) fn mix(
    videos: Vec<Resource>,
    mut web: Vec<Resource>,
    per_node: usize,
    videos_per_node: usize,
) -> Vec<Resource> {
    let mut all = Vec::with_capacity(per_node);

    if let Some(index) = web.iter().position(|r| r.kind == ResourceType::Documentation) {
        all.push(web.remove(index));
    }
    all.extend(videos.into_iter().take(videos_per_node));
    let remaining = per_node.saturating_sub(all.len());
    all.extend(web.into_iter().take(remaining));
    all.truncate(per_node);

    for (index, resource) in all.iter_mut().enumerate() {
        resource.id = format!("resource_{}", index + 1);
    }
    all
}
