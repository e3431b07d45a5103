use crate::config::{
    LLMConfig, DEFAULT_ANTHROPIC_MODEL, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_URL,
    DEFAULT_MAX_TOKENS, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_OPENAI_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_OPENROUTER_URL,
};
use super::{ClaudeClient, LLMError, OpenAIClient, LLM};

/// LLM Provider configuration.
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI-compatible endpoint (default, most universal)
    OpenAI {
        base_url: Option<String>,
        api_key: Option<String>,
        model: Option<String>,
    },
    /// Anthropic Claude
    Anthropic {
        api_key: Option<String>,
        model: Option<String>,
    },
    /// Local Ollama instance
    Ollama {
        base_url: Option<String>,
        model: String,
    },
    /// Google Gemini through its OpenAI-compatible endpoint
    Gemini {
        api_key: Option<String>,
        model: Option<String>,
    },
    /// OpenRouter
    OpenRouter {
        api_key: Option<String>,
        model: Option<String>,
    },
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAI {
            base_url: None,
            api_key: None,
            model: None,
        }
    }
}

impl Provider {
    /// Creates a provider from LLMConfig.
    pub fn from_config(config: &LLMConfig) -> Self {
        match config.provider.as_str() {
            "anthropic" | "claude" => Provider::Anthropic {
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            },
            "ollama" => Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model.clone().unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            },
            "gemini" | "google" => Provider::Gemini {
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            },
            "openrouter" => Provider::OpenRouter {
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            },
            _ => Provider::OpenAI {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
            },
        }
    }

    /// Builds a client from LLMConfig, honouring its token limit.
    pub fn build_from_config(config: &LLMConfig) -> Result<Box<dyn LLM>, LLMError> {
        Self::from_config(config).build_with_max_tokens(config.max_tokens)
    }

    /// Creates an LLM client from the provider configuration.
    pub fn build(self) -> Result<Box<dyn LLM>, LLMError> {
        self.build_with_max_tokens(DEFAULT_MAX_TOKENS)
    }

    /// Creates an LLM client with an explicit response token limit.
    pub fn build_with_max_tokens(self, max_tokens: u32) -> Result<Box<dyn LLM>, LLMError> {
        match self {
            Provider::OpenAI { base_url, api_key, model } => {
                let base = base_url
                    .or_else(|| std::env::var("STUDYPATH_LLM_BASE_URL").ok())
                    .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

                let key = api_key
                    .or_else(|| std::env::var("STUDYPATH_LLM_API_KEY").ok())
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .unwrap_or_default();

                let mdl = model
                    .or_else(|| std::env::var("STUDYPATH_LLM_MODEL").ok())
                    .or_else(|| std::env::var("OPENAI_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

                Ok(Box::new(
                    OpenAIClient::new(base, key, mdl).with_max_tokens(max_tokens),
                ))
            }

            Provider::Anthropic { api_key, model } => {
                let key = api_key
                    .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                    .ok_or(LLMError::MissingApiKey)?;

                let mdl = model
                    .or_else(|| std::env::var("ANTHROPIC_MODEL").ok())
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

                Ok(Box::new(
                    ClaudeClient::new(key)
                        .with_model(mdl)
                        .with_max_tokens(max_tokens),
                ))
            }

            Provider::Ollama { base_url, model } => {
                let base = base_url
                    .or_else(|| {
                        std::env::var("OLLAMA_HOST")
                            .ok()
                            .map(|h| format!("{}/v1", h.trim_end_matches('/')))
                    })
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

                Ok(Box::new(
                    OpenAIClient::new(base, "", model).with_max_tokens(max_tokens),
                ))
            }

            Provider::Gemini { api_key, model } => {
                let key = api_key
                    .or_else(|| std::env::var("GOOGLE_AI_API_KEY").ok())
                    .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                    .ok_or(LLMError::MissingApiKey)?;

                let mdl = model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

                Ok(Box::new(
                    OpenAIClient::new(DEFAULT_GEMINI_URL, key, mdl)
                        .with_max_tokens(max_tokens)
                        .with_json_mode(true),
                ))
            }

            Provider::OpenRouter { api_key, model } => {
                let key = api_key
                    .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                    .ok_or(LLMError::MissingApiKey)?;

                let mdl = model
                    .or_else(|| std::env::var("STUDYPATH_LLM_MODEL").ok())
                    .ok_or_else(|| LLMError::MissingConfig("OpenRouter requires a model".to_string()))?;

                Ok(Box::new(
                    OpenAIClient::new(DEFAULT_OPENROUTER_URL, key, mdl).with_max_tokens(max_tokens),
                ))
            }
        }
    }

    /// Auto-detect provider from environment variables.
    ///
    /// Detection order:
    /// 1. STUDYPATH_LLM_PROVIDER explicitly set
    /// 2. STUDYPATH_LLM_BASE_URL set → OpenAI-compatible
    /// 3. ANTHROPIC_API_KEY set → Anthropic
    /// 4. GOOGLE_AI_API_KEY set → Gemini
    /// 5. OPENAI_API_KEY set → OpenAI
    /// 6. OLLAMA_HOST set → Ollama
    /// 7. Default to OpenAI-compatible (works with local servers too)
    pub fn from_env() -> Result<Box<dyn LLM>, LLMError> {
        if let Ok(provider) = std::env::var("STUDYPATH_LLM_PROVIDER") {
            return match provider.to_lowercase().as_str() {
                "openai" => Provider::default().build(),
                "anthropic" | "claude" => Provider::Anthropic {
                    api_key: None,
                    model: None,
                }.build(),
                "gemini" | "google" => Provider::Gemini {
                    api_key: None,
                    model: None,
                }.build(),
                "openrouter" => Provider::OpenRouter {
                    api_key: None,
                    model: None,
                }.build(),
                "ollama" => Provider::Ollama {
                    base_url: None,
                    model: ollama_model_from_env(),
                }.build(),
                other => Err(LLMError::UnknownProvider(other.to_string())),
            };
        }

        if std::env::var("STUDYPATH_LLM_BASE_URL").is_ok() {
            return Provider::default().build();
        }

        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return Provider::Anthropic {
                api_key: None,
                model: None,
            }.build();
        }

        if std::env::var("GOOGLE_AI_API_KEY").is_ok() {
            return Provider::Gemini {
                api_key: None,
                model: None,
            }.build();
        }

        if std::env::var("OPENAI_API_KEY").is_ok() {
            return Provider::default().build();
        }

        if std::env::var("OLLAMA_HOST").is_ok() {
            return Provider::Ollama {
                base_url: None,
                model: ollama_model_from_env(),
            }.build();
        }

        Provider::default().build()
    }
}

fn ollama_model_from_env() -> String {
    std::env::var("STUDYPATH_LLM_MODEL")
        .or_else(|_| std::env::var("OLLAMA_MODEL"))
        .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string())
}
