//! Error types for the LLM crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for provider operations.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Authentication failed or credentials are missing.
    ///
    /// Never retried: a missing or rejected key will not fix itself.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Configuration error (bad base URL, unusable client, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        /// Provider-supplied wait hint, parsed from a Retry-After header.
        retry_after: Option<Duration>,
    },

    /// Provider-side error (non-2xx other than auth/rate-limit).
    #[error("Backend error: {0}")]
    Backend(String),

    /// Malformed response payload.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LlmError {
    /// Create a rate limit error without a wait hint.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true if this error is worth retrying.
    ///
    /// Transport and provider faults are retryable up to the caller's policy
    /// bound; missing or rejected credentials and client configuration
    /// problems fail immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth(_) | Self::Config(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

/// Parse a Retry-After header value (seconds form only).
pub(crate) fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
        .or_else(|| {
            value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|s| *s >= 0.0)
                .map(Duration::from_secs_f64)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Network("timeout".to_string()).is_retryable());
        assert!(LlmError::rate_limit("slow down").is_retryable());
        assert!(LlmError::Backend("server error".to_string()).is_retryable());
        assert!(LlmError::Serialization("bad json".to_string()).is_retryable());
        assert!(!LlmError::Auth("key rejected".to_string()).is_retryable());
        assert!(!LlmError::Config("no base url".to_string()).is_retryable());
    }

    #[test]
    fn test_retry_after_accessor() {
        let err = LlmError::RateLimit {
            message: "limited".to_string(),
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(LlmError::rate_limit("limited").retry_after(), None);
        assert_eq!(
            LlmError::Network("timeout".to_string()).retry_after(),
            None
        );
    }

    #[test]
    fn test_parse_retry_after_header() {
        assert_eq!(parse_retry_after_header("5"), Some(Duration::from_secs(5)));
        assert_eq!(
            parse_retry_after_header(" 10 "),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            parse_retry_after_header("2.5"),
            Some(Duration::from_secs_f64(2.5))
        );
        assert_eq!(parse_retry_after_header("soon"), None);
    }
}
