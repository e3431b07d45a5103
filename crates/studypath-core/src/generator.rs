//! Roadmap generation through an LLM.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{
    GenerationConfig, DEFAULT_GENERATION_BASE_DELAY_MS, DEFAULT_GENERATION_RETRIES,
    DEFAULT_ROADMAP_SYSTEM_PROMPT,
};
use crate::llm::{LLMError, LLM};
use crate::roadmap::{sanitize_topic, validate_structure, validate_topic, RoadmapStructure, TopicError};

/// Errors surfaced once generation has given up.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    InvalidTopic(#[from] TopicError),

    #[error("Rate limit exceeded. Please try again in a few moments.")]
    RateLimited,

    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("Failed to generate roadmap: {0}")]
    Failed(#[source] LLMError),

    #[error("Generator returned an unusable roadmap: {0}")]
    InvalidOutput(String),
}

impl From<LLMError> for GenerationError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::RateLimited => GenerationError::RateLimited,
            LLMError::Timeout(_) => GenerationError::Timeout,
            other => GenerationError::Failed(other),
        }
    }
}

/// Produces the node/edge structure of a roadmap for a topic.
///
/// A successful structure has passed `validate_structure`, so it holds at
/// least one node.
#[async_trait]
pub trait RoadmapGenerator: Send + Sync {
    async fn generate(&self, topic: &str) -> Result<RoadmapStructure, GenerationError>;
}

#[async_trait]
impl RoadmapGenerator for Box<dyn RoadmapGenerator> {
    async fn generate(&self, topic: &str) -> Result<RoadmapStructure, GenerationError> {
        (**self).generate(topic).await
    }
}

/// Generates roadmaps by prompting an LLM for JSON.
///
/// Each attempt covers the call, JSON extraction and structural
/// validation. Failed attempts are retried with exponential backoff.
pub struct LlmRoadmapGenerator<L: LLM> {
    llm: L,
    system_prompt: String,
    max_retries: u32,
    base_delay: Duration,
}

impl<L: LLM> LlmRoadmapGenerator<L> {
    /// Creates a generator with the default prompt and retry policy.
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_ROADMAP_SYSTEM_PROMPT.to_string(),
            max_retries: DEFAULT_GENERATION_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_GENERATION_BASE_DELAY_MS),
        }
    }

    /// Creates a generator from configuration.
    pub fn with_config(llm: L, config: &GenerationConfig) -> Self {
        Self {
            llm,
            system_prompt: config.system_prompt_or_default().to_string(),
            max_retries: config.max_retries,
            base_delay: config.base_delay(),
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    async fn attempt(&self, prompt: &str) -> Result<RoadmapStructure, GenerationError> {
        let response = self
            .llm
            .complete_with_system(&self.system_prompt, prompt)
            .await?;

        let value: serde_json::Value = serde_json::from_str(extract_json(&response))
            .map_err(|e| GenerationError::InvalidOutput(format!("not JSON: {e}")))?;

        validate_structure(&value).map_err(|e| GenerationError::InvalidOutput(e.to_string()))
    }
}

#[async_trait]
impl<L: LLM> RoadmapGenerator for LlmRoadmapGenerator<L> {
    async fn generate(&self, topic: &str) -> Result<RoadmapStructure, GenerationError> {
        let topic = sanitize_topic(&validate_topic(topic)?);
        if topic.is_empty() {
            return Err(TopicError::NothingLeft.into());
        }
        let prompt = build_roadmap_prompt(&topic);

        let mut attempt = 0;
        loop {
            match self.attempt(&prompt).await {
                Ok(structure) => {
                    info!(
                        topic = %topic,
                        nodes = structure.nodes.len(),
                        edges = structure.edges.len(),
                        attempts = attempt + 1,
                        "generated roadmap"
                    );
                    return Ok(structure);
                }
                Err(GenerationError::Failed(e)) if !e.is_retryable() => {
                    return Err(GenerationError::Failed(e));
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = backoff_delay(self.base_delay, attempt);
                    warn!(
                        topic = %topic,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "roadmap generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(topic = %topic, attempts = attempt + 1, error = %e, "roadmap generation gave up");
                    return Err(e);
                }
            }
        }
    }
}

/// Delay before retry number `attempt + 1`: `base * 2^attempt`.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Builds the user prompt for a topic.
pub fn build_roadmap_prompt(topic: &str) -> String {
    format!(
        r#"Create a comprehensive learning roadmap for: "{topic}"

Cover the path from first principles to advanced practice. Order topics so
that every node only depends on material introduced by its ancestors."#
    )
}

/// Extracts JSON from a response that may be wrapped in markdown code
/// fences or surrounded by prose.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // Check for ```json ... ``` or ``` ... ```
    if trimmed.starts_with("```") {
        if let Some(start) = trimmed.find('\n') {
            let rest = &trimmed[start + 1..];
            if let Some(end) = rest.rfind("```") {
                return rest[..end].trim();
            }
        }
    }

    // Fall back to the outermost object.
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_fenced() {
        let response = "```json\n{\"nodes\": []}\n```";
        assert_eq!(extract_json(response), "{\"nodes\": []}");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let response = "Here is your roadmap:\n{\"nodes\": []}\nEnjoy!";
        assert_eq!(extract_json(response), "{\"nodes\": []}");
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(4000));
    }

    #[test]
    fn test_llm_errors_classified() {
        assert!(matches!(
            GenerationError::from(LLMError::RateLimited),
            GenerationError::RateLimited
        ));
        assert!(matches!(
            GenerationError::from(LLMError::Timeout("slow".into())),
            GenerationError::Timeout
        ));
        assert!(matches!(
            GenerationError::from(LLMError::Network("down".into())),
            GenerationError::Failed(_)
        ));
    }
}
