use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LLMError {
    #[error("Missing API key. Set the appropriate environment variable for your provider.")]
    MissingApiKey,

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited. Try again later.")]
    RateLimited,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl LLMError {
    /// Whether a later attempt could succeed. Configuration problems never do.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LLMError::MissingApiKey | LLMError::MissingConfig(_) | LLMError::UnknownProvider(_)
        )
    }

    /// Maps a non-success HTTP status to an error.
    pub(crate) fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            429 => LLMError::RateLimited,
            408 | 504 => LLMError::Timeout(format!("status {status}")),
            code => LLMError::ApiError {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout(err.to_string())
        } else {
            LLMError::Network(err.to_string())
        }
    }
}
