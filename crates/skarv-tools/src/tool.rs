// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use skarv_model::{CancellationToken, Part};

use crate::confirm::ConfirmationRequest;
use crate::diff::FileDiff;
use crate::modify::Modifiable;

/// What a tool produced for the model.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmContent {
    /// Plain text output.
    Text(String),
    /// Structured parts (binary data, pre-shaped function responses).
    Parts(Vec<Part>),
}

/// What a tool produced for the user-facing transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOutput {
    Markdown(String),
    Diff(FileDiff),
}

/// The result of executing a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub llm_content: LlmContent,
    pub display: Option<DisplayOutput>,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            llm_content: LlmContent::Text(content.into()),
            display: None,
        }
    }

    pub fn parts(parts: Vec<Part>) -> Self {
        Self {
            llm_content: LlmContent::Parts(parts),
            display: None,
        }
    }

    pub fn with_display(mut self, display: DisplayOutput) -> Self {
        self.display = Some(display);
        self
    }
}

/// Per-execution context handed to [`Tool::execute`].
#[derive(Clone)]
pub struct ExecutionContext {
    /// The turn's cancellation token.  Tools must return promptly once it
    /// fires; cleanup is their own responsibility.
    pub cancel: CancellationToken,
    /// Present when the scheduler wants live output chunks (only offered to
    /// tools that declare `can_stream_output`).  Only the latest chunk is
    /// retained by the scheduler.
    pub live_output: Option<mpsc::UnboundedSender<String>>,
}

impl ExecutionContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            live_output: None,
        }
    }

    /// Send a live output chunk, if anyone is listening.
    pub fn emit_live(&self, chunk: impl Into<String>) {
        if let Some(tx) = &self.live_output {
            let _ = tx.send(chunk.into());
        }
    }
}

/// Contract every tool implements.
///
/// Tool instances are registered for the process lifetime and shared by
/// reference; the scheduler never invokes two methods on the same instance
/// concurrently except `execute` on distinct calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the model calls the tool by.
    fn name(&self) -> &str;

    /// Human-facing name for prompts and transcripts.
    fn display_name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the argument object.
    fn parameter_schema(&self) -> Value;

    /// Whether `display` output should be rendered as markdown.
    fn is_output_markdown(&self) -> bool {
        true
    }

    /// Whether the tool emits incremental output during execution.
    fn can_stream_output(&self) -> bool {
        false
    }

    /// The MCP server this tool was discovered from, if any.
    fn server_name(&self) -> Option<&str> {
        None
    }

    /// Cheap, pure schema check run synchronously at schedule time.
    /// Returns an error message, or `None` when the arguments are valid.
    fn validate_params(&self, args: &Value) -> Option<String>;

    /// One-line description of what this invocation will do, shown in the
    /// approval prompt.
    fn describe(&self, args: &Value) -> String;

    /// Decide whether this invocation needs user confirmation.  May read the
    /// filesystem (e.g. to build a diff); must honor `cancel`.
    async fn should_confirm(
        &self,
        _args: &Value,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Option<ConfirmationRequest>> {
        Ok(None)
    }

    /// Run the tool.  Errors become function responses carrying
    /// `{"error": …}` so the model can repair its approach.
    async fn execute(&self, args: &Value, ctx: &ExecutionContext) -> anyhow::Result<ToolResult>;

    /// Present when the tool supports "modify in editor" during approval.
    fn modify_context(&self) -> Option<&dyn Modifiable> {
        None
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
