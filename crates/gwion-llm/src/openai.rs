//! OpenAI Chat Completions API backend.
//!
//! The wire shape here is the closest match to the provider-neutral model:
//! tool-call arguments stay raw strings end to end.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde_json::{Value, json};
use std::time::Duration;

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result, parse_retry_after_header};
use crate::types::{Call, CompletionRequest, CompletionResponse, ImageSource, Message, Usage};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key. `None` yields an unauthenticated backend that fails fast on
    /// the first call.
    pub api_key: Option<String>,

    /// Optional organization id sent as `OpenAI-Organization`.
    pub organization: Option<String>,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            organization: None,
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve credentials from `OPENAI_API_KEY` / `OPENAI_API_KEY_ORG`.
    ///
    /// A missing key does not fail here; it produces an unauthenticated
    /// config whose first completion fails with a non-retryable auth fault.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            organization: std::env::var("OPENAI_API_KEY_ORG").ok(),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the organization id.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
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
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI API backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            LlmError::Auth("OPENAI_API_KEY environment variable not set".to_string())
        })
    }

    /// Shape a provider-neutral request into the Chat Completions body.
    fn build_body(request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(render_message).collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        },
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

        parsed.try_into()
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
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_key = self.api_key()?;
        let body = Self::build_body(&request);

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI completion request"
        );

        let mut builder = self
            .client
            .post(self.completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(ref org) = self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder.json(&body).send().await?;
        Self::handle_response(response).await
    }

    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }
}

fn render_message(message: &Message) -> Value {
    match message {
        Message::System { content } => json!({"role": "system", "content": content}),
        Message::User { content, image } => match image {
            None => json!({"role": "user", "content": content}),
            Some(image) => {
                let url = match image {
                    ImageSource::Url { url } => url.clone(),
                    ImageSource::Base64 { media_type, data } => {
                        format!("data:{};base64,{}", media_type, data)
                    }
                };
                json!({
                    "role": "user",
                    "content": [
                        {"type": "image_url", "image_url": {"url": url}},
                        {"type": "text", "text": content},
                    ],
                })
            }
        },
        Message::Assistant { content, calls } => {
            let mut rendered = json!({"role": "assistant", "content": content});
            if !calls.is_empty() {
                let tool_calls: Vec<Value> = calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.function, "arguments": c.arguments},
                        })
                    })
                    .collect();
                rendered["tool_calls"] = json!(tool_calls);
            }
            rendered
        }
        Message::Tool { content, call_id } => {
            json!({"role": "tool", "tool_call_id": call_id, "content": content})
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, serde::Deserialize)]
struct ApiToolCall {
    id: String,
    function: ApiFunction,
}

#[derive(Debug, serde::Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, serde::Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl TryFrom<ApiResponse> for CompletionResponse {
    type Error = LlmError;

    fn try_from(api: ApiResponse) -> Result<Self> {
        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Serialization("response contained no choices".to_string()))?;

        let calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|c| Call::new(c.id, c.function.name, c.function.arguments))
            .collect();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            calls,
            usage: api
                .usage
                .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
                .unwrap_or_default(),
        })
    }
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
    fn test_completions_url() {
        let backend = OpenAiBackend::new(OpenAiConfig::new("key")).unwrap();
        assert_eq!(
            backend.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let config = OpenAiConfig {
            api_key: None,
            organization: None,
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(1),
        };
        let backend = OpenAiBackend::new(config).unwrap();

        let result = backend
            .complete(CompletionRequest::new("model", vec![Message::user("hi")]))
            .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[test]
    fn test_build_body_full_round_trip() {
        let request = CompletionRequest::new(
            "gpt-4o",
            vec![
                Message::system("be brief"),
                Message::user("calculate"),
                Message::assistant_with_calls(
                    "",
                    vec![Call::new("call_1", "calc", "{\"input\":\"1+2\"}")],
                ),
                Message::tool("call_1", "3"),
            ],
        )
        .with_max_tokens(256)
        .with_seed(42)
        .with_tools(vec![ToolSpec::new(
            "calc",
            "Evaluate arithmetic",
            json!({"type": "object", "properties": {"input": {"type": "string"}}}),
        )]);

        let body = OpenAiBackend::build_body(&request);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["seed"], 42);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        // Arguments pass through as the raw string, unreparsed.
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            "{\"input\":\"1+2\"}"
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");

        assert_eq!(body["tools"][0]["function"]["name"], "calc");
    }

    #[test]
    fn test_build_body_user_image() {
        let request = CompletionRequest::new(
            "gpt-4o",
            vec![Message::user_with_image(
                "what is this",
                ImageSource::Url {
                    url: "https://example.com/cat.png".to_string(),
                },
            )],
        );

        let body = OpenAiBackend::build_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "https://example.com/cat.png");
    }

    #[test]
    fn test_api_response_conversion() {
        let raw = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_7",
                        "type": "function",
                        "function": {"name": "calc", "arguments": "{\"input\":\"1+2\"}"},
                    }],
                },
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30},
        });

        let api: ApiResponse = serde_json::from_value(raw).unwrap();
        let response: CompletionResponse = api.try_into().unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.calls[0].id, "call_7");
        assert_eq!(response.calls[0].arguments, "{\"input\":\"1+2\"}");
        assert_eq!(response.usage.total(), 30);
    }

    #[test]
    fn test_api_response_no_choices() {
        let api: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        let result: Result<CompletionResponse> = api.try_into();
        assert!(matches!(result, Err(LlmError::Serialization(_))));
    }
}
