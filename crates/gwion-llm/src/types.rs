//! Core types for provider requests and responses.
//!
//! The message model is a role-tagged union with explicit call correlation:
//! an assistant message carries the calls it made, and a tool message carries
//! the id of the call it answers. Vendor adapters reshape this model into
//! their own wire envelopes.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// System instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user message, optionally carrying an image.
    User {
        /// The message text.
        content: String,
        /// Optional image attachment.
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<ImageSource>,
    },
    /// An assistant message, carrying any calls the model made.
    Assistant {
        /// The message text.
        content: String,
        /// Tool calls made in this message.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        calls: Vec<Call>,
    },
    /// A tool result, correlated to a prior assistant call.
    Tool {
        /// The encoded tool output (or error description).
        content: String,
        /// Id of the [`Call`] this message answers.
        call_id: String,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            image: None,
        }
    }

    /// Create a user message with an image attachment.
    pub fn user_with_image(content: impl Into<String>, image: ImageSource) -> Self {
        Message::User {
            content: content.into(),
            image: Some(image),
        }
    }

    /// Create an assistant message with text only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            calls: Vec::new(),
        }
    }

    /// Create an assistant message with calls.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<Call>) -> Self {
        Message::Assistant {
            content: content.into(),
            calls,
        }
    }

    /// Create a tool result message.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool {
            content: content.into(),
            call_id: call_id.into(),
        }
    }

    /// The textual content of the message.
    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content, .. }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// The calls carried by this message (empty unless assistant).
    pub fn calls(&self) -> &[Call] {
        match self {
            Message::Assistant { calls, .. } => calls,
            _ => &[],
        }
    }

    /// Role name for logging.
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// True if the message carries no text and no side attachments.
    pub fn is_blank(&self) -> bool {
        match self {
            Message::System { content } => content.trim().is_empty(),
            Message::User { content, image } => content.trim().is_empty() && image.is_none(),
            Message::Assistant { content, calls } => content.trim().is_empty() && calls.is_empty(),
            // A tool message always correlates to a call; blank content is
            // still meaningful (an empty result).
            Message::Tool { .. } => false,
        }
    }
}

/// An image attachment on a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Image referenced by URL.
    Url { url: String },
    /// Inline base64 image data.
    Base64 { media_type: String, data: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Calls
// ─────────────────────────────────────────────────────────────────────────────

/// A tool call parsed from a model response.
///
/// Produced only by provider response parsing; application code never
/// constructs these by hand. `arguments` is kept as the raw serialized JSON
/// string exactly as the provider returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Opaque call id, echoed back in the matching tool message.
    pub id: String,
    /// Name of the function the model wants to invoke.
    pub function: String,
    /// Raw serialized-JSON argument string.
    pub arguments: String,
}

impl Call {
    /// Construct a call. Intended for providers and test fixtures.
    pub fn new(
        id: impl Into<String>,
        function: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: function.into(),
            arguments: arguments.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Wire-level definition of a tool available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Name of the tool.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    /// Create a new tool spec.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Request
// ─────────────────────────────────────────────────────────────────────────────

/// A completion request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use.
    pub model: String,

    /// The messages in the conversation, in order.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling seed, where the provider supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Tools available to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    /// Create a new request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 1.0,
            max_tokens: None,
            seed: None,
            tools: Vec::new(),
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
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

    /// Add tools to the request.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Response
// ─────────────────────────────────────────────────────────────────────────────

/// A completion response: the assistant message plus usage accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The assistant's text.
    pub content: String,
    /// Calls the model made, with id/name/arguments round-tripped verbatim.
    #[serde(default)]
    pub calls: Vec<Call>,
    /// Token usage statistics.
    #[serde(default)]
    pub usage: Usage,
}

impl CompletionResponse {
    /// Create a text-only response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            calls: Vec::new(),
            usage: Usage::default(),
        }
    }

    /// True if the model made any calls.
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Convert into the assistant [`Message`] to append to the conversation.
    pub fn into_message(self) -> Message {
        Message::Assistant {
            content: self.content,
            calls: self.calls,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the input.
    pub input_tokens: u32,
    /// Tokens in the output.
    pub output_tokens: u32,
}

impl Usage {
    /// Create new usage statistics.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role(), "user");
        assert_eq!(msg.content(), "Hello");
        assert!(msg.calls().is_empty());

        let msg = Message::tool("call_1", "42");
        assert_eq!(msg.role(), "tool");
        assert_eq!(msg.content(), "42");
    }

    #[test]
    fn test_message_is_blank() {
        assert!(Message::system("  ").is_blank());
        assert!(Message::user("").is_blank());
        assert!(!Message::user("hi").is_blank());
        assert!(!Message::user_with_image(
            "",
            ImageSource::Url {
                url: "https://example.com/cat.png".to_string()
            }
        )
        .is_blank());
        assert!(!Message::assistant_with_calls("", vec![Call::new("c1", "f", "{}")]).is_blank());
        assert!(!Message::tool("c1", "").is_blank());
    }

    #[test]
    fn test_message_serde_round_trip() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("hi"),
            Message::assistant_with_calls("checking", vec![Call::new("c1", "lookup", "{\"q\":1}")]),
            Message::tool("c1", "found"),
        ];
        let json = serde_json::to_string(&messages).unwrap();
        let parsed: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, messages);
    }

    #[test]
    fn test_message_role_tag() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("sonnet", vec![Message::user("Hello")])
            .with_temperature(0.7)
            .with_max_tokens(1024)
            .with_seed(7);

        assert_eq!(request.model, "sonnet");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(request.seed, Some(7));
    }

    #[test]
    fn test_response_into_message() {
        let response = CompletionResponse {
            content: "done".to_string(),
            calls: vec![Call::new("c9", "calc", "{\"input\":\"1+2\"}")],
            usage: Usage::new(10, 5),
        };
        assert!(response.has_calls());
        let message = response.into_message();
        assert_eq!(message.calls().len(), 1);
        assert_eq!(message.calls()[0].function, "calc");
        assert_eq!(message.calls()[0].arguments, "{\"input\":\"1+2\"}");
    }

    #[test]
    fn test_usage_total() {
        assert_eq!(Usage::new(100, 50).total(), 150);
    }
}
