//! Scoped activation of config, prompts, tools, and thoughts.
//!
//! A [`Scope`] is an immutable snapshot. Extending one (`with_tool`,
//! `with_prompt`, ...) yields a derived value whose additions end with its
//! lexical lifetime — the Rust rendering of enable/disable stack discipline.
//! Concurrent generations each hold their own snapshot and never observe
//! each other's extensions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gwion_llm::ToolSpec;

use crate::config::GenConfig;
use crate::conversation::Conversation;
use crate::prompt::{Prompt, join_sections};
use crate::thought::Thought;
use crate::tool::{SharedTool, Tool, specs};

/// The ambient context of a generation: active config, prompts, tools,
/// thoughts, and the cancellation token.
#[derive(Clone, Default)]
pub struct Scope {
    config: GenConfig,
    prompts: Vec<Prompt>,
    tools: Vec<SharedTool>,
    thoughts: Vec<Thought>,
    cancellation: CancellationToken,
}

impl Scope {
    /// A scope with the given config and nothing enabled.
    pub fn new(config: GenConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The active config.
    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// Replace the config for a derived scope.
    pub fn with_config(mut self, config: GenConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable a prompt.
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Enable a tool.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    /// Enable an already-shared tool.
    pub fn with_shared_tool(mut self, tool: SharedTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Enable several shared tools.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = SharedTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Enable a thought.
    pub fn with_thought(mut self, thought: Thought) -> Self {
        self.thoughts.push(thought);
        self
    }

    /// Enable several thoughts.
    pub fn with_thoughts(mut self, thoughts: impl IntoIterator<Item = Thought>) -> Self {
        self.thoughts.extend(thoughts);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The active tools, in enable order.
    pub fn tools(&self) -> &[SharedTool] {
        &self.tools
    }

    /// The active thoughts, in enable order.
    pub fn thoughts(&self) -> &[Thought] {
        &self.thoughts
    }

    /// The active prompts, in enable order.
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// The cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Wire-level specs for the active tools.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        specs(&self.tools)
    }

    /// Render the enriched primary system context: every enabled prompt's
    /// primary text, then a delimited section per active tool that carries
    /// its own prompt. Returns `None` when nothing renders.
    pub fn enriched_primary(&self, conversation: &Conversation) -> Option<String> {
        self.render_sections(conversation, |prompt, convo| prompt.render_primary(convo))
    }

    /// Render the reminder context the same way; injected as a second
    /// system message immediately before generation.
    pub fn enriched_reminder(&self, conversation: &Conversation) -> Option<String> {
        self.render_sections(conversation, |prompt, convo| prompt.render_reminders(convo))
    }

    fn render_sections<F>(&self, conversation: &Conversation, render: F) -> Option<String>
    where
        F: Fn(&Prompt, &Conversation) -> Vec<String>,
    {
        let mut sections: Vec<String> = Vec::new();

        for prompt in &self.prompts {
            sections.extend(render(prompt, conversation));
        }

        for tool in &self.tools {
            let body = render(&tool.prompt(), conversation);
            if body.is_empty() {
                continue;
            }
            sections.push(format!("TOOL: {}\n{}", tool.name(), body.join("\n\n")));
        }

        sections.dedup();
        join_sections(sections)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("model", &self.config.model)
            .field("prompts", &self.prompts.len())
            .field(
                "tools",
                &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            )
            .field(
                "thoughts",
                &self
                    .thoughts
                    .iter()
                    .map(|t| t.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
