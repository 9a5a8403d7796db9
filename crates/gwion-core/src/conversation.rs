//! Conversation state: an append-only message log with prefix merging.

use serde::{Deserialize, Serialize};

use gwion_llm::Message;

/// An ordered, append-only sequence of messages.
///
/// Pure value semantics: every operation returns or mutates this value only;
/// no side effects. One conversation has a single writer (the generation
/// call it is scoped to), so there is no interior locking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages, in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no messages have been added.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message in place.
    ///
    /// Blank messages (no text, no image, no calls) are dropped.
    pub fn push(&mut self, message: Message) {
        if message.is_blank() {
            return;
        }
        self.messages.push(message);
    }

    /// Append a message, returning the new conversation.
    pub fn add(mut self, message: Message) -> Self {
        self.push(message);
        self
    }

    /// Append a system message; no-op when blank.
    pub fn system(self, content: impl Into<String>) -> Self {
        self.add(Message::system(content))
    }

    /// Append a user message; no-op when blank.
    pub fn user(self, content: impl Into<String>) -> Self {
        self.add(Message::user(content))
    }

    /// Append an assistant message; no-op when blank.
    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.add(Message::assistant(content))
    }

    /// Append a tool result message.
    pub fn tool(self, call_id: impl Into<String>, content: impl Into<String>) -> Self {
        self.add(Message::tool(call_id, content))
    }

    /// Merge another conversation into this one.
    ///
    /// Computes the longest common prefix (by message equality) and appends
    /// `other`'s suffix, so a forked branch reconciles into the main line
    /// without duplicating shared history. `merge(a, a)` is `a`.
    pub fn merge(&self, other: &Conversation) -> Conversation {
        let prefix = self
            .messages
            .iter()
            .zip(&other.messages)
            .take_while(|(a, b)| a == b)
            .count();

        let mut messages = self.messages.clone();
        messages.extend(other.messages[prefix..].iter().cloned());
        Conversation { messages }
    }

    /// Run an isolated sub-computation against a copy of this conversation.
    ///
    /// The copy's mutations are discarded when `f` returns; only its result
    /// survives. External side effects performed inside `f` (tool bodies
    /// touching the world) are NOT rolled back — only the in-memory log is
    /// isolated.
    pub async fn forget<T, F, Fut>(&self, f: F) -> T
    where
        F: FnOnce(Conversation) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        f(self.clone()).await
    }

    /// Replace the message at `index` in place.
    ///
    /// Only dispatch uses this, to swap its processing placeholder for the
    /// final tool result.
    pub(crate) fn replace(&mut self, index: usize, message: Message) {
        self.messages[index] = message;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
