//! Configuration management for StudyPath.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `studypath.toml` file
//! 3. User config `~/.config/studypath/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration.
    pub llm: LLMConfig,

    /// Resource search configuration.
    pub resources: ResourcesConfig,

    /// Storage configuration.
    pub storage: StorageConfig,

    /// Roadmap generation configuration.
    pub generation: GenerationConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./studypath.toml` (project local)
    /// 2. `~/.config/studypath/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("studypath.toml").exists() {
            return Self::from_file("studypath.toml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("studypath").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Checks values that would make the rest of the system misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_roadmaps == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_roadmaps must be at least 1".to_string(),
            ));
        }
        if self.storage.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.namespace cannot be empty".to_string(),
            ));
        }
        if self.resources.per_node == 0 {
            return Err(ConfigError::Invalid(
                "resources.per_node must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // LLM overrides
        if let Ok(provider) = std::env::var("STUDYPATH_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("STUDYPATH_LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Ok(url) = std::env::var("STUDYPATH_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("STUDYPATH_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(tokens) = std::env::var("STUDYPATH_LLM_MAX_TOKENS") {
            if let Ok(n) = tokens.parse() {
                self.llm.max_tokens = n;
            }
        }

        // Resource search keys
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            self.resources.youtube_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("SERPER_API_KEY") {
            self.resources.serper_api_key = Some(key);
        }

        // Storage overrides
        if let Ok(dir) = std::env::var("STUDYPATH_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        if let Ok(max) = std::env::var("STUDYPATH_MAX_ROADMAPS") {
            if let Ok(n) = max.parse() {
                self.storage.max_roadmaps = n;
            }
        }

        if let Ok(level) = std::env::var("STUDYPATH_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Provider name: "openai", "anthropic", "ollama", "gemini" or "openrouter".
    pub provider: String,

    /// Model name (provider-specific).
    pub model: Option<String>,

    /// Base URL for API (for openai-compatible providers).
    pub base_url: Option<String>,

    /// API key (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens for response.
    pub max_tokens: u32,

    /// API version (for Anthropic).
    pub api_version: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_LLM_PROVIDER.to_string(),
            model: None,
            base_url: None,
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_version: Some(DEFAULT_ANTHROPIC_API_VERSION.to_string()),
        }
    }
}

impl LLMConfig {
    /// Get the model name, falling back to provider defaults.
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider.as_str() {
            "anthropic" | "claude" => DEFAULT_ANTHROPIC_MODEL.to_string(),
            "ollama" => DEFAULT_OLLAMA_MODEL.to_string(),
            "gemini" => DEFAULT_GEMINI_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    /// Get the base URL, falling back to provider defaults.
    pub fn base_url_or_default(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| match self.provider.as_str() {
            "anthropic" | "claude" => DEFAULT_ANTHROPIC_URL.to_string(),
            "ollama" => DEFAULT_OLLAMA_URL.to_string(),
            "gemini" => DEFAULT_GEMINI_URL.to_string(),
            "openrouter" => DEFAULT_OPENROUTER_URL.to_string(),
            _ => DEFAULT_OPENAI_URL.to_string(),
        })
    }

    /// Get API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("STUDYPATH_LLM_API_KEY").ok())
            .or_else(|| match self.provider.as_str() {
                "anthropic" | "claude" => std::env::var("ANTHROPIC_API_KEY").ok(),
                "gemini" => std::env::var("GOOGLE_AI_API_KEY").ok(),
                "openrouter" => std::env::var("OPENROUTER_API_KEY").ok(),
                _ => std::env::var("OPENAI_API_KEY").ok(),
            })
    }
}

/// Resource search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// YouTube Data API key.
    #[serde(skip_serializing)]
    pub youtube_api_key: Option<String>,

    /// Serper.dev API key.
    #[serde(skip_serializing)]
    pub serper_api_key: Option<String>,

    /// Resources attached to a node per fetch.
    pub per_node: usize,

    /// Videos placed in a node's resource list.
    pub videos_per_node: usize,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            serper_api_key: None,
            per_node: DEFAULT_RESOURCES_PER_NODE,
            videos_per_node: DEFAULT_VIDEOS_PER_NODE,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the file-backed key/value store.
    pub data_dir: String,

    /// Key prefix for every entry this application writes.
    pub namespace: String,

    /// Maximum number of stored roadmaps before eviction.
    pub max_roadmaps: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_roadmaps: DEFAULT_MAX_ROADMAPS,
        }
    }
}

impl StorageConfig {
    /// Get the full path to the data directory.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Key holding the ordered metadata list.
    pub fn list_key(&self) -> String {
        format!("{}_roadmaps", self.namespace)
    }

    /// Key holding one full roadmap aggregate.
    pub fn roadmap_key(&self, id: &str) -> String {
        format!("{}_roadmap_{}", self.namespace, id)
    }
}

/// Roadmap generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// System prompt for generation. If not set, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Retries after the first failed attempt.
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubles on each retry.
    pub base_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_retries: DEFAULT_GENERATION_RETRIES,
            base_delay_ms: DEFAULT_GENERATION_BASE_DELAY_MS,
        }
    }
}

impl GenerationConfig {
    /// Base backoff delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// The system prompt to send, falling back to the built-in one.
    pub fn system_prompt_or_default(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ROADMAP_SYSTEM_PROMPT)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the `studypath` targets when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, DEFAULT_LLM_PROVIDER);
        assert_eq!(config.storage.max_roadmaps, DEFAULT_MAX_ROADMAPS);
        assert_eq!(config.generation.max_retries, DEFAULT_GENERATION_RETRIES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = Config::default_config_string();
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[generation]"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[llm]
provider = "ollama"
model = "llama3"

[storage]
data_dir = ".custom-studypath"
max_roadmaps = 3

[generation]
base_delay_ms = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, Some("llama3".to_string()));
        assert_eq!(config.storage.data_dir, ".custom-studypath");
        assert_eq!(config.storage.max_roadmaps, 3);
        assert_eq!(config.storage.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.generation.base_delay(), Duration::ZERO);
    }

    #[test]
    fn test_storage_keys() {
        let config = StorageConfig::default();
        assert_eq!(config.list_key(), "studypath_roadmaps");
        assert_eq!(config.roadmap_key("abc"), "studypath_roadmap_abc");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.storage.max_roadmaps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_model_or_default() {
        let mut config = LLMConfig::default();

        config.provider = "anthropic".to_string();
        assert_eq!(config.model_or_default(), DEFAULT_ANTHROPIC_MODEL);

        config.provider = "gemini".to_string();
        assert_eq!(config.model_or_default(), DEFAULT_GEMINI_MODEL);

        config.provider = "openai".to_string();
        assert_eq!(config.model_or_default(), DEFAULT_OPENAI_MODEL);

        config.model = Some("custom-model".to_string());
        assert_eq!(config.model_or_default(), "custom-model");
    }
}
