//! Error types for the generation core.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the generation error type.
pub type Result<T> = std::result::Result<T, GenError>;

/// Error type for generation operations.
///
/// Everything below the orchestrator either self-heals through an in-band
/// tool message or is promoted to exactly one of these variants; callers see
/// a typed value or a single fault naming the failing phase.
#[derive(Debug, Error)]
pub enum GenError {
    /// Provider fault that survived the retry policy.
    #[error("Provider error: {0}")]
    Provider(#[from] gwion_llm::LlmError),

    /// Result envelope or value failed to decode.
    #[error("Result decode error: {0}")]
    Decode(#[from] gwion_schema::CodecError),

    /// The model emitted a thought field that was never registered.
    ///
    /// A schema violation by the model, not a recoverable protocol fault.
    #[error("Unrecognized thought field: {0}")]
    UnknownThought(String),

    /// A thought processing callback failed.
    #[error("Thought processing failed for '{field}': {message}")]
    Thought { field: String, message: String },

    /// A tool body raised an undeclared fault.
    #[error("Tool '{name}' failed fatally: {message}")]
    ToolFatal { name: String, message: String },

    /// The model never called the result tool within the iteration budget.
    #[error("Maximum generation iterations exceeded: {0}")]
    MaxIterations(u32),

    /// The whole generation call ran past its configured timeout.
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the generation.
    #[error("Generation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GenError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
