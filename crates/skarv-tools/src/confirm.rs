// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diff::FileDiff;

/// The user's decision on a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// Run this call only.
    ProceedOnce,
    /// Run this call and auto-approve every future call this session.
    ProceedAlways,
    /// Run this call and auto-approve future calls from the same MCP server.
    ProceedAlwaysServer,
    /// Run this call and auto-approve future calls of the same tool.
    ProceedAlwaysTool,
    /// Open the proposed arguments in an external editor first.
    ModifyWithEditor,
    /// Do not run the call.
    Cancel,
}

impl ConfirmationOutcome {
    /// Outcomes that let the call proceed to execution.
    pub fn approves(&self) -> bool {
        matches!(
            self,
            Self::ProceedOnce | Self::ProceedAlways | Self::ProceedAlwaysServer | Self::ProceedAlwaysTool
        )
    }
}

/// What the user is asked to approve, by tool kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmationDetails {
    /// A file modification, shown as a diff.
    Edit {
        file_name: String,
        file_diff: FileDiff,
    },
    /// A shell command.  `root_command` is the leading binary, used for
    /// per-command allow-listing in the UI.
    Exec {
        command: String,
        root_command: String,
    },
    /// A tool served by an external MCP server.
    Mcp {
        server_name: String,
        tool_name: String,
        display_name: String,
    },
    /// A free-form prompt (e.g. network fetches), with the URLs involved.
    Info {
        prompt: String,
        #[serde(default)]
        urls: Vec<String>,
    },
}

impl ConfirmationDetails {
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edit { .. })
    }

    /// The MCP server this confirmation belongs to, when any.
    pub fn server_name(&self) -> Option<&str> {
        match self {
            Self::Mcp { server_name, .. } => Some(server_name),
            _ => None,
        }
    }
}

/// Hook a tool attaches to its confirmation; the scheduler invokes it with
/// the user's outcome so the tool can update its own state.
pub type ConfirmHook = Arc<dyn Fn(&ConfirmationOutcome) + Send + Sync>;

/// A confirmation returned by [`Tool::should_confirm`](crate::Tool::should_confirm).
#[derive(Clone)]
pub struct ConfirmationRequest {
    pub details: ConfirmationDetails,
    pub on_confirm: Option<ConfirmHook>,
}

impl ConfirmationRequest {
    pub fn new(details: ConfirmationDetails) -> Self {
        Self {
            details,
            on_confirm: None,
        }
    }

    pub fn with_hook(mut self, hook: ConfirmHook) -> Self {
        self.on_confirm = Some(hook);
        self
    }

    /// Invoke the tool's hook, if any.
    pub fn notify(&self, outcome: &ConfirmationOutcome) {
        if let Some(hook) = &self.on_confirm {
            hook(outcome);
        }
    }
}

impl fmt::Debug for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmationRequest")
            .field("details", &self.details)
            .field("on_confirm", &self.on_confirm.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
