//! Learning-resource search for roadmap nodes.

mod mixed;
mod serper;
mod youtube;

pub use mixed::MixedResourceFetcher;
pub use serper::SerperClient;
pub use youtube::YouTubeClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::roadmap::{ResourceType, TopicNode};

/// Errors that can occur while searching for resources.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("No resource sources are configured")]
    NotConfigured,

    #[error("Rate limited by {0}")]
    RateLimited(&'static str),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{source_name} returned error: {status} - {message}")]
    Api {
        source_name: &'static str,
        status: u16,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unable to fetch resources: {0}")]
    AllSourcesFailed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl FetchError {
    /// Whether another attempt could succeed. Configuration and parse
    /// errors are permanent; so are 4xx answers other than 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::RateLimited(_) | FetchError::Timeout(_) | FetchError::Network(_) => true,
            FetchError::Api { status, .. } => *status >= 500,
            FetchError::MissingApiKey(_)
            | FetchError::NotConfigured
            | FetchError::Parse(_)
            | FetchError::AllSourcesFailed(_) => false,
        }
    }

    pub(crate) fn from_status(
        source_name: &'static str,
        status: reqwest::StatusCode,
        message: String,
    ) -> Self {
        if status.as_u16() == 429 {
            FetchError::RateLimited(source_name)
        } else {
            FetchError::Api {
                source_name,
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    /// The node's label.
    pub title: String,
    /// The roadmap's topic, used to disambiguate short labels.
    pub topic: Option<String>,
    pub description: Option<String>,
}

impl ResourceQuery {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            topic: None,
            description: None,
        }
    }

    /// Builds the query for a node of a roadmap about `topic`.
    pub fn for_node(node: &TopicNode, topic: &str) -> Self {
        Self {
            title: node.data.label.clone(),
            topic: Some(topic.to_string()).filter(|t| !t.is_empty()),
            description: Some(node.data.description.clone()).filter(|d| !d.is_empty()),
        }
    }

    /// Free-text search string: the title, followed by the topic when known.
    pub fn search_text(&self) -> String {
        match &self.topic {
            Some(topic) => format!("{} {}", self.title, topic),
            None => self.title.clone(),
        }
    }
}

/// Finds learning resources for one node.
///
/// An empty list is a valid answer meaning nothing was found.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch_resources(
        &self,
        query: &ResourceQuery,
    ) -> Result<Vec<crate::roadmap::Resource>, FetchError>;
}

#[async_trait]
impl ResourceFetcher for Box<dyn ResourceFetcher> {
    async fn fetch_resources(
        &self,
        query: &ResourceQuery,
    ) -> Result<Vec<crate::roadmap::Resource>, FetchError> {
        (**self).fetch_resources(query).await
    }
}

/// Classifies a web result by its domain and title.
pub fn detect_resource_type(domain: &str, title: &str) -> ResourceType {
    let domain = domain.to_lowercase();
    let title = title.to_lowercase();

    if ["docs", "documentation", "api"].iter().any(|k| domain.contains(k)) {
        return ResourceType::Documentation;
    }
    if ["dev.to", "medium.com", "blog"].iter().any(|k| domain.contains(k)) {
        return ResourceType::Article;
    }
    if ["tutorial", "guide", "course"].iter().any(|k| title.contains(k)) {
        return ResourceType::Tutorial;
    }
    ResourceType::Article
}

/// Host of a URL without a leading `www.`, or an empty string.
pub fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

/// Truncates to `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_resource_type() {
        assert_eq!(
            detect_resource_type("docs.rust-lang.org", "The Book"),
            ResourceType::Documentation
        );
        assert_eq!(
            detect_resource_type("api.example.com", "Swift"),
            ResourceType::Documentation
        );
        assert_eq!(detect_resource_type("developer.apple.com", "Swift"), ResourceType::Article);
        assert_eq!(detect_resource_type("medium.com", "Tutorial"), ResourceType::Article);
        assert_eq!(
            detect_resource_type("example.com", "A Complete Guide"),
            ResourceType::Tutorial
        );
        assert_eq!(detect_resource_type("example.com", "Thoughts"), ResourceType::Article);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.example.com/a?b=c"), "example.com");
        assert_eq!(extract_domain("https://docs.rs/serde"), "docs.rs");
        assert_eq!(extract_domain("not a url"), "");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::RateLimited("videos").is_retryable());
        assert!(FetchError::Timeout("slow".to_string()).is_retryable());
        assert!(FetchError::Network("reset".to_string()).is_retryable());
        assert!(FetchError::Api {
            source_name: "web",
            status: 503,
            message: String::new(),
        }
        .is_retryable());
        assert!(!FetchError::Api {
            source_name: "web",
            status: 403,
            message: String::new(),
        }
        .is_retryable());
        assert!(!FetchError::MissingApiKey("YOUTUBE_API_KEY").is_retryable());
        assert!(!FetchError::NotConfigured.is_retryable());
    }

    #[test]
    fn test_search_text() {
        let mut query = ResourceQuery::new("Ownership");
        assert_eq!(query.search_text(), "Ownership");
        query.topic = Some("Rust".to_string());
        assert_eq!(query.search_text(), "Ownership Rust");
    }
}
