//! The generation orchestrator.
//!
//! One `generate` call drives the full cycle: build the envelope schema from
//! the active thoughts, wrap it as the synthetic result tool, render the
//! enriched system context, invoke the provider under the rate limiter and
//! retry policy, dispatch every call the model makes, and loop — bounded by
//! the iteration budget — until the result tool fires and the typed value
//! decodes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gwion_llm::{
    AnthropicBackend, CompletionRequest, LlmBackend, Message, OpenAiBackend, SharedBackend,
    with_retry,
};
use gwion_schema::Schematic;

use crate::config::GenConfig;
use crate::conversation::Conversation;
use crate::error::{GenError, Result};
use crate::prompt::Prompt;
use crate::scope::Scope;
use crate::thought::{self, Envelope, Thought};
use crate::tool::{ResultTool, SharedTool, Tool, dispatch, specs};

/// Resolve a backend for a provider identity using the per-provider
/// environment key convention (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, ...).
///
/// A missing key still resolves; the backend fails fast with an auth fault
/// on its first invocation.
pub fn backend_from_env(provider: &str) -> Result<SharedBackend> {
    match provider {
        "anthropic" => Ok(Arc::new(AnthropicBackend::from_env()?)),
        "openai" => Ok(Arc::new(OpenAiBackend::from_env()?)),
        other => Err(GenError::config(format!("unknown provider '{}'", other))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generator
// ─────────────────────────────────────────────────────────────────────────────

/// Drives typed generations against a provider backend within a [`Scope`].
#[derive(Clone)]
pub struct Generator {
    backend: SharedBackend,
    scope: Scope,
}

impl Generator {
    /// Create a generator builder.
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::new()
    }

    /// The active scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Derive a generator with an extended scope.
    ///
    /// The extension lives as long as the derived value; the original
    /// generator's scope is untouched, so nested and concurrent generations
    /// never observe each other's enables.
    pub fn scoped(&self, extend: impl FnOnce(Scope) -> Scope) -> Generator {
        Generator {
            backend: self.backend.clone(),
            scope: extend(self.scope.clone()),
        }
    }

    /// Start a generation session with an empty conversation.
    pub fn session(&self) -> Session<'_> {
        Session {
            generator: self,
            conversation: Conversation::new(),
        }
    }

    /// Run one typed generation against the given conversation.
    ///
    /// Returns the decoded result value, or exactly one fault naming the
    /// failing phase. Context accumulates monotonically in `conversation`
    /// across loop iterations; there is no rollback between rounds.
    pub async fn generate<A: Schematic>(&self, conversation: &mut Conversation) -> Result<A> {
        let timeout = self.scope.config().timeout;
        let cancelled = self.scope.cancellation().clone();

        tokio::select! {
            biased;
            _ = cancelled.cancelled() => Err(GenError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.generate_inner::<A>(conversation)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(GenError::Timeout(timeout)),
                }
            }
        }
    }

    async fn generate_inner<A: Schematic>(&self, conversation: &mut Conversation) -> Result<A> {
        let config = self.scope.config().clone();

        // Active thoughts; every generation carries at least the built-in
        // minimal pair.
        let thoughts: Vec<Thought> = if self.scope.thoughts().is_empty() {
            thought::default_thoughts()
        } else {
            self.scope.thoughts().to_vec()
        };

        let envelope_schema = thought::envelope_schema(&thoughts, A::schema());
        let (result_tool, slot) = ResultTool::new(envelope_schema);

        let mut tools: Vec<SharedTool> = self.scope.tools().to_vec();
        tools.push(result_tool);
        let tool_specs = specs(&tools);

        let mut iterations: u32 = 0;
        loop {
            // Layer the system instructions on top of prior context. The
            // scratch conversation shares its prefix with the live one after
            // the first round, so merge never duplicates it.
            let mut scratch = Conversation::new();
            if let Some(primary) = self.scope.enriched_primary(conversation) {
                scratch.push(Message::system(primary));
            }
            *conversation = scratch.merge(conversation);

            // The reminder rides along at send time only, right before the
            // newest message, so it never sinks into history.
            let mut outgoing = conversation.messages().to_vec();
            if let Some(reminder) = self.scope.enriched_reminder(conversation) {
                let at = outgoing.len().saturating_sub(1);
                outgoing.insert(at, Message::system(reminder));
            }

            let mut request = CompletionRequest::new(&config.model, outgoing)
                .with_temperature(config.temperature)
                .with_tools(tool_specs.clone());
            if let Some(max_tokens) = config.max_tokens {
                request = request.with_max_tokens(max_tokens);
            }
            if let Some(seed) = config.seed {
                request = request.with_seed(seed);
            }

            tracing::debug!(
                backend = self.backend.name(),
                model = %config.model,
                iteration = iterations + 1,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "Invoking provider"
            );

            let response = {
                let _permit = config.limiter.acquire().await?;
                with_retry(
                    config.retry.max_retries,
                    config.retry.initial_backoff,
                    self.backend.name(),
                    || self.backend.complete(request.clone()),
                )
                .await?
            };

            tracing::debug!(
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                calls = response.calls.len(),
                "Provider response received"
            );

            let message = response.into_message();
            let calls = message.calls().to_vec();
            conversation.push(message);

            dispatch(&tools, &calls, conversation).await?;

            if let Some(raw) = slot.take() {
                let envelope: Envelope = gwion_schema::decode_value(raw)?;
                thought::handle(&thoughts, &envelope).await?;
                let value: A = gwion_schema::decode_value(envelope.result)?;

                tracing::debug!(iterations = iterations + 1, "Generation complete");
                return Ok(value);
            }

            iterations += 1;
            if iterations >= config.max_iterations {
                tracing::warn!(
                    max_iterations = config.max_iterations,
                    "Model never called the result tool"
                );
                return Err(GenError::MaxIterations(config.max_iterations));
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// A generation session: a conversation created empty at the start of a run
/// and threaded through successive generations.
pub struct Session<'g> {
    generator: &'g Generator,
    conversation: Conversation,
}

impl Session<'_> {
    /// The session's conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Append a user message.
    pub fn user(&mut self, content: impl Into<String>) {
        self.conversation.push(Message::user(content));
    }

    /// Append any message.
    pub fn add(&mut self, message: Message) {
        self.conversation.push(message);
    }

    /// Run a typed generation, accumulating context into the session.
    pub async fn generate<A: Schematic>(&mut self) -> Result<A> {
        self.generator.generate(&mut self.conversation).await
    }

    /// Run an isolated generation against a copy of the session's
    /// conversation, discarding the copy's context mutations.
    ///
    /// Only the in-memory log is isolated; external side effects of tools
    /// invoked inside the branch are not rolled back.
    pub async fn forget<A: Schematic>(&self) -> Result<A> {
        let mut scratch = self.conversation.clone();
        self.generator.generate(&mut scratch).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for constructing a [`Generator`].
pub struct GeneratorBuilder {
    backend: Option<SharedBackend>,
    scope: Scope,
}

impl GeneratorBuilder {
    /// Create a new builder with a default scope.
    pub fn new() -> Self {
        Self {
            backend: None,
            scope: Scope::default(),
        }
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Set the backend from a shared reference.
    pub fn with_shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the config.
    pub fn with_config(mut self, config: GenConfig) -> Self {
        self.scope = self.scope.with_config(config);
        self
    }

    /// Enable a prompt.
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.scope = self.scope.with_prompt(prompt);
        self
    }

    /// Enable a tool.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.scope = self.scope.with_tool(tool);
        self
    }

    /// Enable a thought.
    pub fn with_thought(mut self, thought: Thought) -> Self {
        self.scope = self.scope.with_thought(thought);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.scope = self.scope.with_cancellation(token);
        self
    }

    /// Build, resolving the backend from the environment by the config's
    /// provider identity if none was set explicitly.
    pub fn build(self) -> Result<Generator> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => backend_from_env(&self.scope.config().provider)?,
        };
        Ok(Generator {
            backend,
            scope: self.scope,
        })
    }
}

impl Default for GeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
