//! Anthropic Messages API backend.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::{Value, json};
use std::time::Duration;

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result, parse_retry_after_header};
use crate::types::{
    Call, CompletionRequest, CompletionResponse, ImageSource, Message, Usage,
};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version header.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Output cap sent when the caller did not set one; the Messages API
/// requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key. `None` yields an unauthenticated backend that fails fast on
    /// the first call.
    pub api_key: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve the API key from `ANTHROPIC_API_KEY`.
    ///
    /// A missing variable does not fail here; it produces an unauthenticated
    /// config whose first completion fails with a non-retryable auth fault.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env())
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            LlmError::Auth("ANTHROPIC_API_KEY environment variable not set".to_string())
        })
    }

    /// Shape a provider-neutral request into the Messages API body.
    fn build_body(request: &CompletionRequest) -> Value {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();

        for message in &request.messages {
            match message {
                Message::System { content } => system_parts.push(content),
                Message::User { content, image } => {
                    messages.push(render_user(content, image.as_ref()));
                }
                Message::Assistant { content, calls } => {
                    messages.push(render_assistant(content, calls));
                }
                Message::Tool { content, call_id } => {
                    let block = json!({
                        "type": "tool_result",
                        "tool_use_id": call_id,
                        "content": content,
                    });
                    // Tool results belong in the user turn that follows the
                    // assistant's calls; consecutive results share one turn.
                    match messages.last_mut() {
                        Some(last)
                            if last["role"] == "user"
                                && last["content"][0]["type"] == "tool_result" =>
                        {
                            last["content"].as_array_mut().unwrap().push(block);
                        }
                        _ => {
                            messages.push(json!({"role": "user", "content": [block]}));
                        }
                    }
                }
            }
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        if !system_parts.is_empty() {
            body["system"] = json!(system_parts.join("\n\n"));
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        body
    }

    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed.into())
    }

    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after_header);
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => LlmError::Auth(message),
            429 => LlmError::RateLimit {
                message,
                retry_after,
            },
            _ => LlmError::Backend(message),
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key()?;
        let body = Self::build_body(&request);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Anthropic completion request"
        );

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    async fn health_check(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }
}

fn render_user(content: &str, image: Option<&ImageSource>) -> Value {
    match image {
        None => json!({"role": "user", "content": content}),
        Some(image) => {
            let source = match image {
                ImageSource::Url { url } => json!({"type": "url", "url": url}),
                ImageSource::Base64 { media_type, data } => {
                    json!({"type": "base64", "media_type": media_type, "data": data})
                }
            };
            json!({
                "role": "user",
                "content": [
                    {"type": "image", "source": source},
                    {"type": "text", "text": content},
                ],
            })
        }
    }
}

fn render_assistant(content: &str, calls: &[Call]) -> Value {
    if calls.is_empty() {
        return json!({"role": "assistant", "content": content});
    }

    let mut blocks: Vec<Value> = Vec::new();
    if !content.trim().is_empty() {
        blocks.push(json!({"type": "text", "text": content}));
    }
    for call in calls {
        let input: Value = serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.function,
            "input": input,
        }));
    }
    json!({"role": "assistant", "content": blocks})
}

// ─────────────────────────────────────────────────────────────────────────────
// API Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    usage: ApiUsage,
}

impl From<ApiResponse> for CompletionResponse {
    fn from(api: ApiResponse) -> Self {
        let mut content = String::new();
        let mut calls = Vec::new();

        for block in api.content {
            match block {
                ApiContentBlock::Text { text } => content.push_str(&text),
                ApiContentBlock::ToolUse { id, name, input } => {
                    calls.push(Call::new(id, name, input.to_string()));
                }
            }
        }

        CompletionResponse {
            content,
            calls,
            usage: Usage::new(api.usage.input_tokens, api.usage.output_tokens),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

#[derive(Debug, serde::Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolSpec;

    #[test]
    fn test_messages_url() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("key")).unwrap();
        assert_eq!(
            backend.messages_url(),
            "https://api.anthropic.com/v1/messages"
        );

        let backend = AnthropicBackend::new(
            AnthropicConfig::new("key").with_base_url("http://localhost:8080"),
        )
        .unwrap();
        assert_eq!(backend.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let config = AnthropicConfig {
            api_key: None,
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(1),
        };
        let backend = AnthropicBackend::new(config).unwrap();

        let result = backend
            .complete(CompletionRequest::new("model", vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert!(backend.health_check().await.is_err());
    }

    #[test]
    fn test_build_body_system_and_tools() {
        let request = CompletionRequest::new(
            "claude-sonnet",
            vec![Message::system("be brief"), Message::user("hi")],
        )
        .with_temperature(0.5)
        .with_tools(vec![ToolSpec::new(
            "lookup",
            "Look things up",
            json!({"type": "object", "properties": {}}),
        )]);

        let body = AnthropicBackend::build_body(&request);
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["tools"][0]["name"], "lookup");
    }

    #[test]
    fn test_build_body_tool_round_trip() {
        let request = CompletionRequest::new(
            "claude-sonnet",
            vec![
                Message::user("calculate"),
                Message::assistant_with_calls(
                    "",
                    vec![Call::new("toolu_1", "calc", "{\"input\":\"1+2\"}")],
                ),
                Message::tool("toolu_1", "3"),
                Message::tool("toolu_1b", "extra"),
            ],
        );

        let body = AnthropicBackend::build_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);

        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["type"], "tool_use");
        assert_eq!(messages[1]["content"][0]["id"], "toolu_1");
        assert_eq!(messages[1]["content"][0]["input"]["input"], "1+2");

        // Both tool results land in a single following user turn.
        assert_eq!(messages[2]["role"], "user");
        let blocks = messages[2]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["tool_use_id"], "toolu_1");
        assert_eq!(blocks[1]["tool_use_id"], "toolu_1b");
    }

    #[test]
    fn test_build_body_user_image() {
        let request = CompletionRequest::new(
            "claude-sonnet",
            vec![Message::user_with_image(
                "what is this",
                ImageSource::Base64 {
                    media_type: "image/png".to_string(),
                    data: "aGk=".to_string(),
                },
            )],
        );

        let body = AnthropicBackend::build_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["text"], "what is this");
    }

    #[test]
    fn test_api_response_conversion() {
        let api = ApiResponse {
            content: vec![
                ApiContentBlock::Text {
                    text: "Let me check.".to_string(),
                },
                ApiContentBlock::ToolUse {
                    id: "toolu_9".to_string(),
                    name: "calc".to_string(),
                    input: json!({"input": "1+2"}),
                },
            ],
            usage: ApiUsage {
                input_tokens: 50,
                output_tokens: 30,
            },
        };

        let response: CompletionResponse = api.into();
        assert_eq!(response.content, "Let me check.");
        assert_eq!(response.calls.len(), 1);
        assert_eq!(response.calls[0].id, "toolu_9");
        assert_eq!(response.calls[0].function, "calc");
        let parsed: Value = serde_json::from_str(&response.calls[0].arguments).unwrap();
        assert_eq!(parsed["input"], "1+2");
        assert_eq!(response.usage.total(), 80);
    }
}
