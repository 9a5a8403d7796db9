//! Generation configuration.
//!
//! [`GenConfig`] is an immutable value: every setter consumes and returns a
//! new config. One instance is active per generation scope; scoped overrides
//! swap the whole value rather than mutating in place.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{GenError, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default context window size, in tokens.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 200_000;

/// Default cap on generation loop iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Default timeout for one whole `generate` call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Retry Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Retry policy applied around provider invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Initial backoff; doubles per retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limiter
// ─────────────────────────────────────────────────────────────────────────────

/// Bounds concurrent in-flight provider calls.
///
/// Acquisition suspends the calling task; permits release on drop, so an
/// aborted generation cannot leak its slot.
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    /// Allow at most `max_in_flight` concurrent provider calls.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// A limiter that never blocks.
    pub fn unlimited() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }

    /// Acquire a slot, suspending until one frees up.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GenError::internal("rate limiter closed"))
    }

    /// Permits currently available.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GenConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable configuration for generation calls.
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Provider identity, used for logging and env-based backend selection.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Context window size for the model, in tokens.
    pub context_window: u32,
    /// Sampling temperature, always within [0, 2].
    pub temperature: f32,
    /// Optional output token cap.
    pub max_tokens: Option<u32>,
    /// Optional sampling seed.
    pub seed: Option<u64>,
    /// Timeout for one whole `generate` call.
    pub timeout: Duration,
    /// Maximum generation loop iterations; the bound is inclusive.
    pub max_iterations: u32,
    /// Retry policy for provider invocations.
    pub retry: RetryPolicy,
    /// Shared limiter for in-flight provider calls.
    pub limiter: Arc<RateLimiter>,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: DEFAULT_MODEL.to_string(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            temperature: 1.0,
            max_tokens: None,
            seed: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retry: RetryPolicy::default(),
            limiter: Arc::new(RateLimiter::unlimited()),
        }
    }
}

impl GenConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider identity.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the model and its context window size.
    pub fn with_model(mut self, model: impl Into<String>, context_window: u32) -> Self {
        self.model = model.into();
        self.context_window = context_window;
        self
    }

    /// Set the sampling temperature, clamped to [0, 2].
    ///
    /// Clamping happens here and only here; the orchestrator trusts the
    /// stored value.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set the output token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the rate limiter.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_clamped_high() {
        let config = GenConfig::new().with_temperature(5.0);
        assert_eq!(config.temperature, 2.0);
    }

    #[test]
    fn test_temperature_clamped_low() {
        let config = GenConfig::new().with_temperature(-1.0);
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn test_temperature_in_range_untouched() {
        let config = GenConfig::new().with_temperature(0.7);
        assert_eq!(config.temperature, 0.7);
    }

    #[test]
    fn test_setters_return_new_value() {
        let base = GenConfig::new();
        let derived = base.clone().with_max_iterations(3).with_seed(9);
        assert_eq!(base.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(derived.max_iterations, 3);
        assert_eq!(derived.seed, Some(9));
        assert_eq!(base.seed, None);
    }

    #[tokio::test]
    async fn test_rate_limiter_bounds_concurrency() {
        let limiter = RateLimiter::new(1);
        let permit = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        drop(permit);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_rate_limiter_unlimited() {
        let limiter = RateLimiter::unlimited();
        let _a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
    }
}
