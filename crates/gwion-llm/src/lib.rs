//! Provider abstraction for gwion.
//!
//! Defines the provider-neutral message/call model, the [`LlmBackend`]
//! trait, concrete Anthropic and OpenAI adapters, and a scripted mock
//! backend for tests (behind the `testing` feature).

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use backend::{LlmBackend, SharedBackend, with_retry};
pub use error::{LlmError, Result};
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use types::{
    Call, CompletionRequest, CompletionResponse, ImageSource, Message, ToolSpec, Usage,
};

#[cfg(any(test, feature = "testing"))]
pub use backend::{MockBackend, MockOutcome, call_response};
