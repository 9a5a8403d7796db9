//! Mailbox-backed agent runtime.
//!
//! An [`Agent`] wraps a pipeline `In -> Out` behind a single-consumer
//! mailbox: messages process strictly one at a time, each carrying a reply
//! channel, and state threads across successive messages — persistent memory
//! for a generation pipeline. Concurrent `ask` calls are safe; ordering
//! among callers is unspecified, but processing of any two asks never
//! overlaps.
//!
//! Back-pressure policy: the mailbox is a bounded channel
//! ([`DEFAULT_MAILBOX_CAPACITY`] unless overridden); producers suspend while
//! it is full. [`Agent::try_tell`] is the non-suspending variant and reports
//! a full mailbox instead of waiting.

use std::future::Future;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Mailbox capacity used by [`Agent::spawn`] and [`Agent::spawn_stateful`].
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The agent's consumer task is gone.
    #[error("Agent mailbox closed")]
    MailboxClosed,

    /// The agent stopped before replying.
    #[error("Agent dropped the reply")]
    ReplyDropped,

    /// The mailbox is full (non-suspending sends only).
    #[error("Agent mailbox full")]
    MailboxFull,
}

struct MailboxMessage<In, Out> {
    input: In,
    reply: Option<oneshot::Sender<Out>>,
}

/// A mailbox-backed, stateful wrapper around one pipeline.
///
/// Cloning yields another producer handle to the same mailbox. The consumer
/// task ends when every handle has been dropped.
pub struct Agent<In, Out> {
    tx: mpsc::Sender<MailboxMessage<In, Out>>,
}

impl<In, Out> Clone for Agent<In, Out> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<In, Out> Agent<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Spawn a stateless agent around a pipeline.
    pub fn spawn<F, Fut>(mut pipeline: F) -> Self
    where
        F: FnMut(In) -> Fut + Send + 'static,
        Fut: Future<Output = Out> + Send + 'static,
    {
        Self::spawn_stateful((), move |(), input| {
            let fut = pipeline(input);
            async move { ((), fut.await) }
        })
    }

    /// Spawn an agent whose state threads across successive messages.
    ///
    /// The handler receives the current state and one input, and returns the
    /// next state alongside the output.
    pub fn spawn_stateful<S, F, Fut>(state: S, handler: F) -> Self
    where
        S: Send + 'static,
        F: FnMut(S, In) -> Fut + Send + 'static,
        Fut: Future<Output = (S, Out)> + Send + 'static,
    {
        Self::spawn_with_capacity(DEFAULT_MAILBOX_CAPACITY, state, handler)
    }

    /// [`Agent::spawn_stateful`] with an explicit mailbox capacity.
    pub fn spawn_with_capacity<S, F, Fut>(capacity: usize, state: S, mut handler: F) -> Self
    where
        S: Send + 'static,
        F: FnMut(S, In) -> Fut + Send + 'static,
        Fut: Future<Output = (S, Out)> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<MailboxMessage<In, Out>>(capacity);

        tokio::spawn(async move {
            let mut state = state;
            while let Some(message) = rx.recv().await {
                let (next_state, output) = handler(state, message.input).await;
                state = next_state;

                if let Some(reply) = message.reply {
                    // The asker may have given up (timeout, cancellation);
                    // a dead reply channel is not the agent's problem.
                    let _ = reply.send(output);
                }
            }
            tracing::debug!("Agent mailbox drained, consumer exiting");
        });

        Self { tx }
    }

    /// Enqueue an input and await the matched reply.
    ///
    /// Suspends while the mailbox is full.
    pub async fn ask(&self, input: In) -> Result<Out> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(MailboxMessage {
                input,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| AgentError::MailboxClosed)?;

        reply_rx.await.map_err(|_| AgentError::ReplyDropped)
    }

    /// Enqueue an input without waiting for a reply.
    ///
    /// Suspends while the mailbox is full.
    pub async fn tell(&self, input: In) -> Result<()> {
        self.tx
            .send(MailboxMessage { input, reply: None })
            .await
            .map_err(|_| AgentError::MailboxClosed)
    }

    /// Enqueue an input without suspending; fails when the mailbox is full.
    pub fn try_tell(&self, input: In) -> Result<()> {
        self.tx
            .try_send(MailboxMessage { input, reply: None })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => AgentError::MailboxFull,
                mpsc::error::TrySendError::Closed(_) => AgentError::MailboxClosed,
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_ask_threads_state() {
        let agent = Agent::spawn_stateful(0u64, |count, _input: ()| async move {
            (count + 1, count + 1)
        });

        assert_eq!(agent.ask(()).await.unwrap(), 1);
        assert_eq!(agent.ask(()).await.unwrap(), 2);
        assert_eq!(agent.ask(()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_stateless_pipeline() {
        let agent = Agent::spawn(|input: String| async move { input.to_uppercase() });
        assert_eq!(agent.ask("hello".to_string()).await.unwrap(), "HELLO");
    }

    #[tokio::test]
    async fn test_concurrent_asks_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let flight = in_flight.clone();
        let high = peak.clone();
        let agent = Agent::spawn(move |input: usize| {
            let flight = flight.clone();
            let high = high.clone();
            async move {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                high.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                input * 2
            }
        });

        let asks = (0..10).map(|i| {
            let agent = agent.clone();
            async move { agent.ask(i).await.unwrap() }
        });
        let results = futures::future::join_all(asks).await;

        let mut sorted = results.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        // At most one message in processing at any moment.
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tell_is_fire_and_forget() {
        let agent = Agent::spawn_stateful(0u64, |count, input: u64| async move {
            (count + input, count + input)
        });

        agent.tell(5).await.unwrap();
        agent.tell(7).await.unwrap();
        // The mailbox is FIFO; a following ask observes both tells.
        assert_eq!(agent.ask(0).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_try_tell_reports_full_mailbox() {
        // Capacity 1 and a consumer that never finishes its first message.
        let agent = Agent::spawn_with_capacity(1, (), |_state, _input: ()| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ((), ())
        });

        // First message occupies the consumer, second fills the mailbox.
        agent.tell(()).await.unwrap();
        let mut saw_full = false;
        for _ in 0..50 {
            match agent.try_tell(()) {
                Err(AgentError::MailboxFull) => {
                    saw_full = true;
                    break;
                }
                Ok(()) => tokio::time::sleep(Duration::from_millis(1)).await,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(saw_full);
    }

    #[tokio::test]
    async fn test_agent_with_generation_pipeline() {
        use gwion_core::{Conversation, GenConfig, Generator, RetryPolicy};
        use gwion_llm::{MockBackend, call_response};
        use gwion_schema::{Schema, Schematic};
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Serialize, Deserialize)]
        struct Answer {
            text: String,
        }

        impl Schematic for Answer {
            fn schema() -> Schema {
                Schema::object().field("text", Schema::string())
            }
        }

        let backend = MockBackend::repeating(call_response(
            gwion_core::RESULT_TOOL_NAME,
            serde_json::json!({
                "OpeningThoughts": {},
                "result": {"text": "pong"},
                "ClosingThoughts": {},
            }),
        ));

        let generator = Generator::builder()
            .with_backend(backend)
            .with_config(GenConfig::new().with_retry(RetryPolicy::none()))
            .build()
            .unwrap();

        // The conversation is the threaded state: the agent remembers
        // everything said across asks.
        let agent = Agent::spawn_stateful(
            Conversation::new(),
            move |mut conversation: Conversation, input: String| {
                let generator = generator.clone();
                async move {
                    conversation.push(gwion_llm::Message::user(input));
                    let answer: Answer = generator
                        .generate(&mut conversation)
                        .await
                        .expect("generation");
                    let depth = conversation.len();
                    (conversation, (answer.text, depth))
                }
            },
        );

        let (text, depth_one) = agent.ask("ping".to_string()).await.unwrap();
        assert_eq!(text, "pong");

        let (_, depth_two) = agent.ask("ping again".to_string()).await.unwrap();
        assert!(depth_two > depth_one);
    }
}
