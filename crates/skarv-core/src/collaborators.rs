// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! External collaborator seams.
//!
//! The scheduler orchestrates; everything user- or environment-facing lives
//! behind these traits: command handling, shell passthrough, @-path
//! expansion, confirmation prompts, the external editor, filesystem
//! snapshots, and the memory refresh signal.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use skarv_model::Part;
use skarv_tools::{ConfirmationDetails, ConfirmationOutcome};

use crate::calls::ToolCallSnapshot;

/// Result of delegating a `/command` (or `?command`) input.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// The command consumed the input; nothing reaches the model.
    Handled,
    /// The command requests a single client-initiated tool call.
    ScheduleTool { name: String, args: Value },
    /// Not a recognized command; treat the input as ordinary model input.
    NotACommand,
}

#[async_trait]
pub trait CommandProcessor: Send + Sync {
    async fn process(&self, input: &str) -> anyhow::Result<CommandOutcome>;
}

/// Handles `!…` input while shell mode is active.
#[async_trait]
pub trait ShellProcessor: Send + Sync {
    async fn run(&self, input: &str) -> anyhow::Result<()>;
}

/// Expands `@path` references into a composite query.
#[async_trait]
pub trait AtExpander: Send + Sync {
    async fn expand(&self, input: &str) -> anyhow::Result<Vec<Part>>;
}

/// Presents a confirmation prompt and returns the user's decision.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn confirm(
        &self,
        call: &ToolCallSnapshot,
        details: &ConfirmationDetails,
    ) -> ConfirmationOutcome;
}

/// Launches the user's editor on a proposed change and returns the edited
/// content after the editor exits.
#[async_trait]
pub trait EditorLauncher: Send + Sync {
    async fn edit(&self, file_name: &str, current: &str, proposed: &str)
        -> anyhow::Result<String>;
}

/// Creates a filesystem snapshot of a path about to be modified; returns a
/// commit hash usable for later restore.
#[async_trait]
pub trait SnapshotService: Send + Sync {
    async fn snapshot(&self, path: &Path) -> anyhow::Result<String>;
}

/// Receives the signal that saved memory changed and should be re-read.
#[async_trait]
pub trait MemoryMonitor: Send + Sync {
    async fn refresh(&self);
}

/// Approves everything.  The default for headless runs and tests.
pub struct AlwaysProceed;

#[async_trait]
impl ApprovalHandler for AlwaysProceed {
    async fn confirm(
        &self,
        _call: &ToolCallSnapshot,
        _details: &ConfirmationDetails,
    ) -> ConfirmationOutcome {
        ConfirmationOutcome::ProceedOnce
    }
}

/// Declines everything.
pub struct AlwaysCancel;

#[async_trait]
impl ApprovalHandler for AlwaysCancel {
    async fn confirm(
        &self,
        _call: &ToolCallSnapshot,
        _details: &ConfirmationDetails,
    ) -> ConfirmationOutcome {
        ConfirmationOutcome::Cancel
    }
}

/// The scheduler's collaborator set.  Only the approval handler is required;
/// every other seam degrades gracefully when absent.
#[derive(Clone)]
pub struct Collaborators {
    pub commands: Option<Arc<dyn CommandProcessor>>,
    pub shell: Option<Arc<dyn ShellProcessor>>,
    pub at_expander: Option<Arc<dyn AtExpander>>,
    pub approvals: Arc<dyn ApprovalHandler>,
    pub editor: Option<Arc<dyn EditorLauncher>>,
    pub snapshots: Option<Arc<dyn SnapshotService>>,
    pub memory: Option<Arc<dyn MemoryMonitor>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            commands: None,
            shell: None,
            at_expander: None,
            approvals: Arc::new(AlwaysProceed),
            editor: None,
            snapshots: None,
            memory: None,
        }
    }
}

impl Collaborators {
    pub fn with_approvals(mut self, approvals: Arc<dyn ApprovalHandler>) -> Self {
        self.approvals = approvals;
        self
    }
}
