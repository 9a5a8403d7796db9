//! Provider trait, shared retry logic, and the mock backend.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for LLM provider backends.
///
/// Implementations connect to a vendor completion endpoint. They must
/// preserve message ordering and round-trip call id/name/arguments triples
/// faithfully.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the assistant's reply.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only errors whose [`LlmError::is_retryable`] is true; auth and
/// configuration faults are returned immediately. Rate-limit waits honor the
/// provider's retry-after hint when it exceeds the current backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }

                let wait = e.retry_after().unwrap_or(backoff).max(backoff);
                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        backend = backend_name,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = wait.as_millis() as u64,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted outcome for the mock backend.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this response.
    Reply(CompletionResponse),
    /// Fail with this error.
    Fail(LlmError),
}

/// A mock backend for testing.
///
/// Returns pre-configured outcomes in order and records every request,
/// useful for deterministic testing of the generation loop.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct MockBackend {
    outcomes: std::sync::Mutex<Vec<MockOutcome>>,
    request_log: std::sync::Mutex<Vec<CompletionRequest>>,
    /// Outcome repeated once the script is exhausted, if set.
    fallback: Option<MockOutcome>,
}

#[cfg(any(test, feature = "testing"))]
impl MockBackend {
    /// Create a mock backend with the given scripted outcomes.
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(outcomes),
            request_log: std::sync::Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// Create a mock backend from responses only.
    pub fn with_responses(responses: Vec<CompletionResponse>) -> Self {
        Self::new(responses.into_iter().map(MockOutcome::Reply).collect())
    }

    /// Create a mock backend that returns a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_responses(vec![CompletionResponse::text(text)])
    }

    /// Create a mock backend that returns the same response forever.
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(Vec::new()),
            request_log: std::sync::Mutex::new(Vec::new()),
            fallback: Some(MockOutcome::Reply(response)),
        }
    }

    /// Get all requests made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().unwrap().push(request);

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                self.fallback.clone()
            } else {
                Some(outcomes.remove(0))
            }
        };

        match outcome {
            Some(MockOutcome::Reply(response)) => Ok(response),
            Some(MockOutcome::Fail(error)) => Err(error),
            None => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build a response whose assistant message makes a single call.
#[cfg(any(test, feature = "testing"))]
pub fn call_response(function: impl Into<String>, arguments: serde_json::Value) -> CompletionResponse {
    use crate::types::{Call, Usage};

    CompletionResponse {
        content: String::new(),
        calls: vec![Call::new(
            format!("call_{}", uuid::Uuid::new_v4().simple()),
            function,
            arguments.to_string(),
        )],
        usage: Usage::new(10, 10),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
