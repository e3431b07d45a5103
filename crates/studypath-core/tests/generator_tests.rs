use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use studypath_core::llm::{LLMError, LLM};
use studypath_core::roadmap::TopicError;
use studypath_core::{GenerationError, LlmRoadmapGenerator, RoadmapGenerator};

const VALID: &str = r#"{
  "nodes": [
    {"id": "1", "data": {"label": "Basics", "description": "Syntax", "level": 1, "order": 1, "category": "core"}},
    {"id": "2", "data": {"label": "Ownership", "description": "Borrowing", "level": 2, "order": 1, "category": "core"}}
  ],
  "edges": [
    {"id": "edge_1_2", "source": "1", "target": "2"},
    {"source": "2", "target": "ghost"}
  ]
}"#;

type Prompts = Arc<Mutex<Vec<String>>>;

/// Replays canned responses and records prompts.
struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LLMError>>>,
    prompts: Prompts,
}

impl ScriptedLlm {
    /// Returns the LLM and a handle on the prompts it receives.
    fn new(replies: Vec<Result<String, LLMError>>) -> (Self, Prompts) {
        let prompts = Prompts::default();
        let llm = Self {
            replies: Mutex::new(replies.into()),
            prompts: Arc::clone(&prompts),
        };
        (llm, prompts)
    }
}

fn calls(prompts: &Prompts) -> usize {
    prompts.lock().unwrap().len()
}

#[async_trait]
impl LLM for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        self.complete_with_system("", prompt).await
    }

    async fn complete_with_system(&self, _system: &str, prompt: &str) -> Result<String, LLMError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::RequestFailed("script exhausted".to_string())))
    }
}

fn generator(replies: Vec<Result<String, LLMError>>) -> (LlmRoadmapGenerator<ScriptedLlm>, Prompts) {
    let (llm, prompts) = ScriptedLlm::new(replies);
    (LlmRoadmapGenerator::new(llm).with_retry(2, Duration::ZERO), prompts)
}

#[tokio::test]
async fn test_valid_response_parsed() {
    let (generator, prompts) = generator(vec![Ok(format!("```json\n{VALID}\n```"))]);

    let structure = generator.generate("Rust").await.unwrap();
    assert_eq!(structure.nodes.len(), 2);
    assert_eq!(structure.edges.len(), 1, "dangling edge dropped");
    assert_eq!(structure.nodes[1].data.label, "Ownership");
    assert!(!structure.nodes[0].is_fetched());
    assert_eq!(calls(&prompts), 1);
}

#[tokio::test]
async fn test_retries_then_succeeds() {
    let (generator, prompts) = generator(vec![
        Err(LLMError::RateLimited),
        Ok("I cannot produce JSON today".to_string()),
        Ok(VALID.to_string()),
    ]);

    assert!(generator.generate("Rust").await.is_ok());
    assert_eq!(calls(&prompts), 3);
}

#[tokio::test]
async fn test_gives_up_after_three_attempts() {
    let (generator, prompts) = generator(vec![
        Err(LLMError::RateLimited),
        Err(LLMError::RateLimited),
        Err(LLMError::RateLimited),
        Ok(VALID.to_string()),
    ]);

    assert!(matches!(
        generator.generate("Rust").await,
        Err(GenerationError::RateLimited)
    ));
    assert_eq!(calls(&prompts), 3);
}

#[tokio::test]
async fn test_final_error_classified() {
    let (timeout, _) = generator(vec![
        Err(LLMError::Network("reset".to_string())),
        Err(LLMError::Network("reset".to_string())),
        Err(LLMError::Timeout("slow".to_string())),
    ]);
    assert!(matches!(timeout.generate("Rust").await, Err(GenerationError::Timeout)));

    let (invalid, _) = generator(vec![
        Ok(r#"{"nodes": [], "edges": []}"#.to_string()),
        Ok(r#"{"nodes": [], "edges": []}"#.to_string()),
        Ok(r#"{"nodes": [], "edges": []}"#.to_string()),
    ]);
    assert!(matches!(
        invalid.generate("Rust").await,
        Err(GenerationError::InvalidOutput(_))
    ));
}

#[tokio::test]
async fn test_configuration_errors_not_retried() {
    let (generator, prompts) = generator(vec![Err(LLMError::MissingApiKey), Ok(VALID.to_string())]);

    assert!(matches!(
        generator.generate("Rust").await,
        Err(GenerationError::Failed(LLMError::MissingApiKey))
    ));
    assert_eq!(calls(&prompts), 1);
}

#[tokio::test]
async fn test_topic_checked_before_calling() {
    let (generator, prompts) = generator(vec![Ok(VALID.to_string())]);

    assert!(matches!(
        generator.generate(" a ").await,
        Err(GenerationError::InvalidTopic(TopicError::TooShort))
    ));
    assert!(matches!(
        generator.generate(&"x".repeat(101)).await,
        Err(GenerationError::InvalidTopic(TopicError::TooLong))
    ));
    assert!(matches!(
        generator.generate("???").await,
        Err(GenerationError::InvalidTopic(TopicError::NothingLeft))
    ));
    assert_eq!(calls(&prompts), 0);
}

#[tokio::test]
async fn test_prompt_uses_sanitized_topic() {
    let (generator, prompts) = generator(vec![Ok(VALID.to_string())]);
    generator.generate("  C++ & <Rust>  ").await.unwrap();

    let sent = prompts.lock().unwrap()[0].clone();
    assert!(sent.contains("\"C & Rust\""));
    assert!(!sent.contains('<'));
}
