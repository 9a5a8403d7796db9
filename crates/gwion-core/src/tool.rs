//! Tools: typed, named callables the model may invoke.
//!
//! Dispatch keeps the conversation honest about in-flight work: each call
//! first appends a processing placeholder, then swaps it for the final
//! result in place, so an observer reading state mid-flight sees pending
//! calls.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use gwion_llm::{Call, Message, ToolSpec};
use gwion_schema::{Schema, Schematic};

use crate::conversation::Conversation;
use crate::error::{GenError, Result};
use crate::prompt::Prompt;

/// Name of the synthetic result tool.
pub const RESULT_TOOL_NAME: &str = "result_tool";

// ─────────────────────────────────────────────────────────────────────────────
// Tool Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error raised by a tool body.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    /// A declared failure. Caught by dispatch and surfaced to the model as a
    /// "Tool call failure" message so it can self-correct.
    #[error("{0}")]
    Failure(String),

    /// An undeclared fault. Not caught: aborts the whole generation round.
    #[error("{0}")]
    Fatal(String),
}

impl ToolError {
    /// Create a declared, model-visible failure.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }

    /// Create an undeclared, fatal fault.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Result type for tool bodies.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A named, schema-described function the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name among concurrently enabled tools.
    fn name(&self) -> &str;

    /// What the tool does, shown to the model.
    fn description(&self) -> &str;

    /// Tool-specific prompt, rendered into its own section of the system
    /// context while the tool is enabled.
    fn prompt(&self) -> Prompt {
        Prompt::empty()
    }

    /// Schema for the tool's input.
    fn input_schema(&self) -> Schema;

    /// Schema for the tool's output.
    fn output_schema(&self) -> Schema;

    /// Execute the tool.
    async fn call(&self, arguments: Value) -> ToolResult<Value>;
}

/// A tool that can be shared across scopes.
pub type SharedTool = Arc<dyn Tool>;

/// Wire-level specs for the active tool set, exportable verbatim to a
/// provider or an external tool-invocation protocol.
pub fn specs(tools: &[SharedTool]) -> Vec<ToolSpec> {
    tools
        .iter()
        .map(|t| ToolSpec::new(t.name(), t.description(), t.input_schema().to_value()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed Function Tools
// ─────────────────────────────────────────────────────────────────────────────

type ErasedHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult<Value>> + Send + Sync>;

/// A [`Tool`] built from an async closure over [`Schematic`] input and
/// output types. Input decoding failures become declared failures carrying
/// the parser message.
pub struct FnTool {
    name: String,
    description: String,
    prompt: Prompt,
    input_schema: Schema,
    output_schema: Schema,
    handler: ErasedHandler,
}

impl FnTool {
    /// Attach a tool-specific prompt.
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = prompt;
        self
    }
}

/// Build a typed tool from an async closure.
pub fn tool<I, O, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: F,
) -> FnTool
where
    I: Schematic + 'static,
    O: Schematic + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ToolResult<O>> + Send + 'static,
{
    let erased: ErasedHandler = Arc::new(move |value: Value| -> BoxFuture<'static, ToolResult<Value>> {
        let input = gwion_schema::decode_value::<I>(value);
        match input {
            Err(e) => Box::pin(async move { Err(ToolError::Failure(e.to_string())) }),
            Ok(input) => {
                let fut = handler(input);
                Box::pin(async move {
                    let output = fut.await?;
                    serde_json::to_value(output).map_err(|e| ToolError::Fatal(e.to_string()))
                })
            }
        }
    });

    FnTool {
        name: name.into(),
        description: description.into(),
        prompt: Prompt::empty(),
        input_schema: I::schema(),
        output_schema: O::schema(),
        handler: erased,
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn prompt(&self) -> Prompt {
        self.prompt.clone()
    }

    fn input_schema(&self) -> Schema {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Schema {
        self.output_schema.clone()
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        (self.handler)(arguments).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Tool
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot cell holding the raw envelope from a result-tool call.
#[derive(Debug, Clone, Default)]
pub struct ResultSlot(Arc<Mutex<Option<Value>>>);

impl ResultSlot {
    /// True if a result has been recorded.
    pub fn is_set(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }

    /// Take the recorded envelope, leaving the slot empty.
    pub fn take(&self) -> Option<Value> {
        self.0.lock().unwrap().take()
    }

    fn store(&self, value: Value) -> bool {
        let mut slot = self.0.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }
}

/// The synthetic tool through which the model returns its structured
/// answer. A call to this name is the generation loop's termination signal.
pub struct ResultTool {
    input_schema: Schema,
    slot: ResultSlot,
}

impl ResultTool {
    /// Synthesize a result tool for the given envelope schema, returning the
    /// tool and the slot the orchestrator polls after dispatch.
    pub fn new(envelope_schema: Schema) -> (Arc<Self>, ResultSlot) {
        let slot = ResultSlot::default();
        let tool = Arc::new(Self {
            input_schema: envelope_schema,
            slot: slot.clone(),
        });
        (tool, slot)
    }
}

#[async_trait]
impl Tool for ResultTool {
    fn name(&self) -> &str {
        RESULT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Deliver your final structured answer. Call this tool exactly once, \
         with every required thought field and the result populated."
    }

    fn input_schema(&self) -> Schema {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Schema {
        Schema::object().field("status", Schema::string())
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        if self.slot.store(arguments) {
            Ok(serde_json::json!({"status": "recorded"}))
        } else {
            Err(ToolError::failure(
                "result already recorded for this generation",
            ))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch
// ─────────────────────────────────────────────────────────────────────────────

/// Dispatch the calls from one assistant message against the active tools.
///
/// Lookup is exact-match by name; with duplicate names the FIRST registered
/// tool wins. Unknown names and declared failures degrade into tool messages
/// the model can read; undeclared faults propagate.
pub async fn dispatch(
    tools: &[SharedTool],
    calls: &[Call],
    conversation: &mut Conversation,
) -> Result<()> {
    for call in calls {
        let tool = tools.iter().find(|t| t.name() == call.function);

        let Some(tool) = tool else {
            tracing::warn!(tool = %call.function, call_id = %call.id, "Tool not found");
            conversation.push(Message::tool(
                &call.id,
                format!("Tool not found: {}", call.function),
            ));
            continue;
        };

        conversation.push(Message::tool(&call.id, "Processing..."));
        let placeholder = conversation.len() - 1;

        let arguments: Value = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(tool = %call.function, error = %e, "Malformed call arguments");
                conversation.replace(
                    placeholder,
                    Message::tool(&call.id, format!("Tool call failure: {}", e)),
                );
                continue;
            }
        };

        tracing::debug!(
            tool = %call.function,
            call_id = %call.id,
            "Tool: executing"
        );

        match tool.call(arguments).await {
            Ok(output) => {
                let encoded = gwion_schema::encode(&output)
                    .unwrap_or_else(|_| output.to_string());
                conversation.replace(placeholder, Message::tool(&call.id, encoded));
            }
            Err(ToolError::Failure(message)) => {
                tracing::warn!(tool = %call.function, %message, "Tool call failed");
                conversation.replace(
                    placeholder,
                    Message::tool(&call.id, format!("Tool call failure: {}", message)),
                );
            }
            Err(ToolError::Fatal(message)) => {
                return Err(GenError::ToolFatal {
                    name: call.function.clone(),
                    message,
                });
            }
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoInput {
        text: String,
    }

    impl Schematic for EchoInput {
        fn schema() -> Schema {
            Schema::object().field("text", Schema::string())
        }
    }

    fn echo_tool() -> SharedTool {
        Arc::new(tool(
            "echo",
            "Echo the input back",
            |input: EchoInput| async move { Ok::<String, ToolError>(input.text) },
        ))
    }

    fn failing_tool(fatal: bool) -> SharedTool {
        Arc::new(tool("boom", "Always fails", move |_input: EchoInput| {
            let err = if fatal {
                ToolError::fatal("wires crossed")
            } else {
                ToolError::failure("out of service")
            };
            async move { Err::<String, ToolError>(err) }
        }))
    }

    fn call(function: &str, arguments: &str) -> Call {
        Call::new(format!("call_{function}"), function, arguments)
    }

    #[test]
    fn test_specs_export() {
        let tools = vec![echo_tool()];
        let specs = specs(&tools);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].input_schema["type"], "object");
        assert_eq!(
            specs[0].input_schema["properties"]["text"]["type"],
            "string"
        );
    }

    #[tokio::test]
    async fn test_dispatch_success_replaces_placeholder() {
        let tools = vec![echo_tool()];
        let mut convo = Conversation::new();

        dispatch(&tools, &[call("echo", "{\"text\":\"hi\"}")], &mut convo)
            .await
            .unwrap();

        assert_eq!(convo.len(), 1);
        let message = &convo.messages()[0];
        assert_eq!(message.role(), "tool");
        assert_eq!(message.content(), "\"hi\"");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let tools = vec![echo_tool()];
        let mut convo = Conversation::new();

        dispatch(&tools, &[call("nope", "{}")], &mut convo)
            .await
            .unwrap();

        assert_eq!(convo.len(), 1);
        assert!(convo.messages()[0]
            .content()
            .starts_with("Tool not found: "));
    }

    #[tokio::test]
    async fn test_dispatch_malformed_arguments_swallowed() {
        let tools = vec![echo_tool()];
        let mut convo = Conversation::new();

        dispatch(&tools, &[call("echo", "{not json")], &mut convo)
            .await
            .unwrap();

        assert_eq!(convo.len(), 1);
        assert!(convo.messages()[0]
            .content()
            .starts_with("Tool call failure: "));
    }

    #[tokio::test]
    async fn test_dispatch_wrong_shape_arguments_swallowed() {
        let tools = vec![echo_tool()];
        let mut convo = Conversation::new();

        // Valid JSON, wrong shape: the typed decode inside the tool reports
        // a declared failure.
        dispatch(&tools, &[call("echo", "{\"other\":1}")], &mut convo)
            .await
            .unwrap();

        assert!(convo.messages()[0]
            .content()
            .starts_with("Tool call failure: "));
    }

    #[tokio::test]
    async fn test_dispatch_declared_failure_visible_to_model() {
        let tools = vec![failing_tool(false)];
        let mut convo = Conversation::new();

        dispatch(&tools, &[call("boom", "{\"text\":\"x\"}")], &mut convo)
            .await
            .unwrap();

        assert_eq!(
            convo.messages()[0].content(),
            "Tool call failure: out of service"
        );
    }

    #[tokio::test]
    async fn test_dispatch_fatal_propagates() {
        let tools = vec![failing_tool(true)];
        let mut convo = Conversation::new();

        let result = dispatch(&tools, &[call("boom", "{\"text\":\"x\"}")], &mut convo).await;
        assert!(matches!(result, Err(GenError::ToolFatal { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_name_first_wins() {
        let first = Arc::new(tool("dup", "first", |_input: EchoInput| async {
            Ok::<String, ToolError>("from first".to_string())
        })) as SharedTool;
        let second = Arc::new(tool("dup", "second", |_input: EchoInput| async {
            Ok::<String, ToolError>("from second".to_string())
        })) as SharedTool;

        let tools = vec![first, second];
        let mut convo = Conversation::new();
        dispatch(&tools, &[call("dup", "{\"text\":\"x\"}")], &mut convo)
            .await
            .unwrap();

        assert_eq!(convo.messages()[0].content(), "\"from first\"");
    }

    #[tokio::test]
    async fn test_result_tool_one_shot() {
        let (tool, slot) = ResultTool::new(Schema::object().field("result", Schema::number()));
        assert_eq!(tool.name(), RESULT_TOOL_NAME);
        assert!(!slot.is_set());

        let first = tool.call(serde_json::json!({"result": 1.0})).await;
        assert!(first.is_ok());
        assert!(slot.is_set());

        let second = tool.call(serde_json::json!({"result": 2.0})).await;
        assert!(matches!(second, Err(ToolError::Failure(_))));

        let stored = slot.take().unwrap();
        assert_eq!(stored["result"], 1.0);
        assert!(!slot.is_set());
    }
}
