//! Generation orchestration core for gwion.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Generator                                                 │
//! │  - builds the thought/result envelope schema               │
//! │  - invokes the provider (rate limit + retry + timeout)     │
//! │  - dispatches tool calls into the conversation             │
//! │  - loops until the result tool fires or the budget ends    │
//! └────────────────────────────────────────────────────────────┘
//!                 │              │              │
//!                 ▼              ▼              ▼
//!          ┌───────────┐  ┌───────────┐  ┌───────────┐
//!          │   Scope   │  │ gwion-llm │  │Conversation│
//!          │ (prompts, │  │ (backend) │  │ (message  │
//!          │  tools,   │  │           │  │   log)    │
//!          │ thoughts) │  │           │  │           │
//!          └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! # Core Components
//!
//! - [`Conversation`]: append-only message log with prefix merging
//! - [`GenConfig`]: immutable generation configuration
//! - [`Prompt`]: composable (primary, reminder) instruction pairs
//! - [`Tool`] / [`dispatch`]: typed callables and their dispatch contract
//! - [`Thought`]: schema-injected reasoning fields with callbacks
//! - [`Generator`]: the orchestration loop

pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod scope;
pub mod thought;
pub mod tool;

pub use config::{GenConfig, RateLimiter, RetryPolicy};
pub use conversation::Conversation;
pub use error::{GenError, Result};
pub use orchestrator::{Generator, GeneratorBuilder, Session, backend_from_env};
pub use prompt::{Prompt, Segment};
pub use scope::Scope;
pub use thought::{
    Envelope, Position, Thought, aggregate, default_thoughts, envelope_schema, handle,
};
pub use tool::{
    FnTool, RESULT_TOOL_NAME, ResultSlot, ResultTool, SharedTool, Tool, ToolError, dispatch,
    specs, tool,
};
