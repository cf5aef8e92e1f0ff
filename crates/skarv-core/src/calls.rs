// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use skarv_model::Part;
use skarv_tools::{ConfirmationDetails, ConfirmationOutcome, ConfirmationRequest, DisplayOutput, Tool};

/// What the scheduler was asked to run: one function call from the model, or
/// a client-initiated call synthesized by a slash command.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Unique within the session.
    pub call_id: String,
    pub name: String,
    pub args: Value,
    /// Client-initiated calls never send their response back to the model.
    pub is_client_initiated: bool,
}

/// Lifecycle state of one tool call.  Terminal states carry the converted
/// function-response parts, so a terminal record cannot change shape — the
/// only later mutation is the one-shot `response_submitted` flag on
/// [`ToolCall`].
#[derive(Debug)]
pub enum CallState {
    Validating,
    AwaitingApproval {
        request: ConfirmationRequest,
    },
    Scheduled,
    Executing {
        live_output: Option<String>,
    },
    Success {
        response: Vec<Part>,
        display: Option<DisplayOutput>,
    },
    Errored {
        message: String,
        response: Vec<Part>,
    },
    Cancelled {
        reason: String,
        response: Vec<Part>,
    },
}

/// Flat status view of [`CallState`], for snapshots and listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Validating,
    AwaitingApproval,
    Scheduled,
    Executing,
    Success,
    Error,
    Cancelled,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// One tracked tool call in the current batch.
pub struct ToolCall {
    pub request: ToolCallRequest,
    /// Resolved from the registry; `None` when the name was unknown.
    pub tool: Option<Arc<dyn Tool>>,
    pub state: CallState,
    pub started_at: Option<Instant>,
    pub duration_ms: Option<u64>,
    /// The user's confirmation decision, when one was made.
    pub outcome: Option<ConfirmationOutcome>,
    /// One-shot flag: set once the response has been handed back to the
    /// model (or acknowledged, for client-initiated calls).
    pub response_submitted: bool,
}

impl ToolCall {
    pub fn new(request: ToolCallRequest, tool: Option<Arc<dyn Tool>>) -> Self {
        Self {
            request,
            tool,
            state: CallState::Validating,
            started_at: None,
            duration_ms: None,
            outcome: None,
            response_submitted: false,
        }
    }

    pub fn status(&self) -> CallStatus {
        match &self.state {
            CallState::Validating => CallStatus::Validating,
            CallState::AwaitingApproval { .. } => CallStatus::AwaitingApproval,
            CallState::Scheduled => CallStatus::Scheduled,
            CallState::Executing { .. } => CallStatus::Executing,
            CallState::Success { .. } => CallStatus::Success,
            CallState::Errored { .. } => CallStatus::Error,
            CallState::Cancelled { .. } => CallStatus::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Function-response parts for a terminal call.
    pub fn response_parts(&self) -> Option<&[Part]> {
        match &self.state {
            CallState::Success { response, .. }
            | CallState::Errored { response, .. }
            | CallState::Cancelled { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Approval prompt text: the tool's own description of this invocation.
    fn describe(&self) -> String {
        match &self.tool {
            Some(tool) => tool.describe(&self.request.args),
            None => self.request.name.clone(),
        }
    }

    pub fn snapshot(&self) -> ToolCallSnapshot {
        let (live_output, confirmation, error) = match &self.state {
            CallState::Executing { live_output } => (live_output.clone(), None, None),
            CallState::AwaitingApproval { request } => (None, Some(request.details.clone()), None),
            CallState::Errored { message, .. } => (None, None, Some(message.clone())),
            _ => (None, None, None),
        };
        ToolCallSnapshot {
            call_id: self.request.call_id.clone(),
            name: self.request.name.clone(),
            description: self.describe(),
            status: self.status(),
            is_client_initiated: self.request.is_client_initiated,
            live_output,
            confirmation,
            error,
            outcome: self.outcome,
            duration_ms: self.duration_ms,
        }
    }
}

/// Cloneable, serializable view of a call for listeners.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallSnapshot {
    pub call_id: String,
    pub name: String,
    pub description: String,
    pub status: CallStatus,
    pub is_client_initiated: bool,
    pub live_output: Option<String>,
    pub confirmation: Option<ConfirmationDetails>,
    pub error: Option<String>,
    pub outcome: Option<ConfirmationOutcome>,
    pub duration_ms: Option<u64>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
