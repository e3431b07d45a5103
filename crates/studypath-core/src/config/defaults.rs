//! Default values for StudyPath configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default data directory for the file-backed store.
pub const DEFAULT_DATA_DIR: &str = ".studypath";

/// Key prefix separating StudyPath entries from unrelated data in the same store.
pub const DEFAULT_NAMESPACE: &str = "studypath";

/// Maximum number of roadmaps kept before the oldest is evicted.
pub const DEFAULT_MAX_ROADMAPS: usize = 10;

/// Sentinel roadmap id meaning "generate a new roadmap from a topic".
pub const NEW_ROADMAP_ID: &str = "new";

// ============================================================================
// Progress Defaults
// ============================================================================

/// Resources assumed for a node whose resources have not been fetched yet.
///
/// Mirrors the fetch collaborator's batch size ([`DEFAULT_RESOURCES_PER_NODE`]);
/// the two must be kept in sync by hand.
pub const ESTIMATED_RESOURCES_PER_NODE: usize = 5;

// ============================================================================
// Generation Defaults
// ============================================================================

/// Retries after the first failed generation attempt.
pub const DEFAULT_GENERATION_RETRIES: u32 = 2;

/// Base delay for exponential backoff between generation attempts (ms).
pub const DEFAULT_GENERATION_BASE_DELAY_MS: u64 = 1000;

/// Minimum topic length after trimming.
pub const MIN_TOPIC_CHARS: usize = 2;

/// Maximum topic length after trimming.
pub const MAX_TOPIC_CHARS: usize = 100;

// ============================================================================
// LLM Defaults
// ============================================================================

/// Default LLM provider.
pub const DEFAULT_LLM_PROVIDER: &str = "openai";

/// Default max tokens for LLM responses. Roadmaps of 15-25 nodes need room.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Per-request timeout for LLM calls, in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

// OpenAI defaults
/// Default OpenAI API URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

// Anthropic defaults
/// Default Anthropic API URL.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
/// Default Anthropic API version.
pub const DEFAULT_ANTHROPIC_API_VERSION: &str = "2023-06-01";

// Ollama defaults
/// Default Ollama API URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";
/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

// Gemini defaults (OpenAI-compatible endpoint)
/// Default Gemini OpenAI-compatible API URL.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// OpenRouter defaults
/// Default OpenRouter API URL.
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// Resource Defaults
// ============================================================================

/// Number of resources attached to a node per fetch.
pub const DEFAULT_RESOURCES_PER_NODE: usize = 5;

/// Number of videos placed in a node's resource list.
pub const DEFAULT_VIDEOS_PER_NODE: usize = 2;

/// YouTube Data API base URL.
pub const DEFAULT_YOUTUBE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Number of candidates requested from YouTube.
pub const DEFAULT_YOUTUBE_MAX_RESULTS: u32 = 10;

/// Serper.dev web search endpoint.
pub const DEFAULT_SERPER_URL: &str = "https://google.serper.dev/search";

/// Number of candidates requested from Serper.
pub const DEFAULT_SERPER_NUM_RESULTS: u32 = 20;

/// Per-request timeout for resource searches, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Web results kept per search.
pub const DEFAULT_WEB_RESULTS: usize = 3;

/// Maximum characters kept from a resource description.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Maximum characters kept from a web result title.
pub const MAX_TITLE_CHARS: usize = 80;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default log level for the `studypath` targets.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// System Prompts
// ============================================================================

/// System prompt for roadmap generation.
pub const DEFAULT_ROADMAP_SYSTEM_PROMPT: &str = r#"You are an expert learning path designer. You produce structured learning roadmaps as strict JSON.

Requirements:
1. Return ONLY valid JSON, no markdown formatting, no code blocks
2. Create 15-25 nodes (topics and subtopics) with STRICT hierarchical structure
3. Structure should be a tree (each node has exactly ONE parent, except root)
4. Each node needs: unique id, title, description (2-4 sentences), level (1-5), category, order (sequential number within same level)
5. Include edges showing parent-child relationships ONLY

JSON structure:
{
  "nodes": [
    {
      "id": "node_1",
      "type": "custom",
      "position": {"x": 500, "y": 0},
      "data": {
        "label": "Topic Title",
        "description": "Detailed explanation of this topic",
        "level": 1,
        "order": 1,
        "category": "fundamentals",
        "resources": null,
        "resourcesFetched": false
      }
    }
  ],
  "edges": [
    {
      "id": "edge_1_2",
      "source": "node_1",
      "target": "node_2"
    }
  ]
}

Layout rules:
- Start with 1 root node at level 1 (x=500, y=0)
- Each level is 200px below the previous one (level 2 at y=200, level 3 at y=400, ...)
- Distribute nodes horizontally within each level evenly (x spacing: 250-350px)
- Each node should have EXACTLY ONE incoming edge (except root)
- Children of the same parent should be grouped horizontally
- The "order" field (1, 2, 3...) maintains the learning sequence

Categories to use: fundamentals, intermediate, advanced, tools, practice, projects

Only output the JSON object, nothing else."#;
