//! Failure taxonomy for provider calls.

use thiserror::Error;

/// Errors raised while talking to a text-generation provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Required endpoint, credential or model setting is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint answered with a non-success status
    #[error("Provider API error! status: {status}, body: {body}")]
    Provider { status: u16, body: String },

    /// The response arrived but lacks the expected structure
    #[error("Failed to parse provider response: {0}")]
    MalformedResponse(String),

    /// Network-level failure before a status was received
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Transport(_))
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
