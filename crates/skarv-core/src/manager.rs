// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool-call lifecycle: validation, the approval gate, and bounded-parallel
//! execution of one batch.
//!
//! A batch is the set of calls one model turn emitted.  Calls are classified
//! one by one (missing tool / bad params fail fast; confirmations park the
//! call at the approval gate), and only when no call is awaiting approval or
//! still validating does the whole batch transition to executing —
//! simultaneously, with completion order left to the runtime.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use skarv_config::ApprovalMode;
use skarv_model::CancellationToken;
use skarv_tools::{
    cancelled_response, convert_to_function_response, error_response, ConfirmationOutcome,
    ExecutionContext, Tool, ToolRegistry,
};

use crate::calls::{CallState, ToolCall, ToolCallRequest, ToolCallSnapshot};
use crate::collaborators::{ApprovalHandler, EditorLauncher};
use crate::error::SchedulerError;
use crate::events::SchedulerEvent;

const CANCEL_REASON_TOKEN: &str = "user cancelled the request";
const CANCEL_REASON_DECLINED: &str = "user did not allow the tool call";

pub struct ToolCallManager {
    registry: Arc<ToolRegistry>,
    approval_mode: ApprovalMode,
    calls: Vec<ToolCall>,
    /// Every call id ever scheduled in this session; duplicates are a
    /// programmer bug and abort the batch.
    seen_ids: HashSet<String>,
    always_session: bool,
    always_tools: HashSet<String>,
    always_servers: HashSet<String>,
}

impl ToolCallManager {
    pub fn new(registry: Arc<ToolRegistry>, approval_mode: ApprovalMode) -> Self {
        Self {
            registry,
            approval_mode,
            calls: Vec::new(),
            seen_ids: HashSet::new(),
            always_session: false,
            always_tools: HashSet::new(),
            always_servers: HashSet::new(),
        }
    }

    pub fn approval_mode(&self) -> ApprovalMode {
        self.approval_mode
    }

    pub fn set_approval_mode(&mut self, mode: ApprovalMode) {
        self.approval_mode = mode;
    }

    pub fn snapshots(&self) -> Vec<ToolCallSnapshot> {
        self.calls.iter().map(ToolCall::snapshot).collect()
    }

    /// Requests of calls currently parked at the approval gate.
    pub fn awaiting_requests(&self) -> Vec<ToolCallRequest> {
        self.calls
            .iter()
            .filter(|c| matches!(c.state, CallState::AwaitingApproval { .. }))
            .map(|c| c.request.clone())
            .collect()
    }

    pub fn all_terminal(&self) -> bool {
        self.calls.iter().all(ToolCall::is_terminal)
    }

    fn has_blocking_calls(&self) -> bool {
        self.calls.iter().any(|c| {
            matches!(
                c.state,
                CallState::AwaitingApproval { .. } | CallState::Executing { .. }
            )
        })
    }

    async fn emit_update(&self, tx: &mpsc::Sender<SchedulerEvent>) {
        let _ = tx
            .send(SchedulerEvent::ToolCallsUpdated(self.snapshots()))
            .await;
    }

    // ── Scheduling ────────────────────────────────────────────────────────────

    /// Take on a new batch.  Fails while any prior call is still executing
    /// or parked at the approval gate.
    pub async fn schedule(
        &mut self,
        requests: Vec<ToolCallRequest>,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<SchedulerEvent>,
    ) -> Result<(), SchedulerError> {
        if self.has_blocking_calls() {
            return Err(SchedulerError::BatchInFlight);
        }
        // Drop the previous batch once its responses were handed over.
        self.calls
            .retain(|c| !(c.is_terminal() && c.response_submitted));
        if !self.calls.is_empty() {
            // Terminal calls whose responses were never handed over: the
            // driver lost track of a batch.
            return Err(SchedulerError::Internal(format!(
                "previous batch still holds {} unsubmitted responses",
                self.calls.len()
            )));
        }

        for request in &requests {
            if !self.seen_ids.insert(request.call_id.clone()) {
                return Err(SchedulerError::DuplicateCallId(request.call_id.clone()));
            }
        }

        for request in requests {
            let call = self.classify(request, cancel).await;
            self.calls.push(call);
        }
        self.emit_update(tx).await;
        Ok(())
    }

    /// Run one request through validation to its initial state.
    async fn classify(&self, request: ToolCallRequest, cancel: &CancellationToken) -> ToolCall {
        let tool = self.registry.get(&request.name);
        let mut call = ToolCall::new(request, tool.clone());
        let (name, id) = (call.request.name.clone(), call.request.call_id.clone());

        if cancel.is_cancelled() {
            call.state = CallState::Cancelled {
                reason: CANCEL_REASON_TOKEN.into(),
                response: cancelled_response(&name, &id, CANCEL_REASON_TOKEN),
            };
            return call;
        }

        let Some(tool) = tool else {
            let message = format!("tool \"{name}\" is not registered");
            call.state = CallState::Errored {
                response: error_response(&name, &id, &message),
                message,
            };
            return call;
        };

        if let Some(message) = tool.validate_params(&call.request.args) {
            call.state = CallState::Errored {
                response: error_response(&name, &id, &message),
                message,
            };
            return call;
        }

        if self.approval_mode == ApprovalMode::Yolo {
            call.state = CallState::Scheduled;
            return call;
        }

        match tool.should_confirm(&call.request.args, cancel).await {
            Err(err) => {
                let message = err.to_string();
                call.state = CallState::Errored {
                    response: error_response(&name, &id, &message),
                    message,
                };
            }
            Ok(None) => call.state = CallState::Scheduled,
            Ok(Some(request)) => {
                if self.is_pre_approved(tool.as_ref(), &request.details) {
                    call.state = CallState::Scheduled;
                } else {
                    call.state = CallState::AwaitingApproval { request };
                }
            }
        }
        call
    }

    fn is_pre_approved(
        &self,
        tool: &dyn Tool,
        details: &skarv_tools::ConfirmationDetails,
    ) -> bool {
        if self.always_session {
            return true;
        }
        if self.always_tools.contains(tool.name()) {
            return true;
        }
        if let Some(server) = details.server_name().or(tool.server_name()) {
            if self.always_servers.contains(server) {
                return true;
            }
        }
        self.approval_mode == ApprovalMode::AutoEdit && details.is_edit()
    }

    // ── The approval gate ─────────────────────────────────────────────────────

    /// Drive every awaiting call to a decision.  Confirmation prompts are
    /// presented one at a time; a fired cancellation token cancels all
    /// remaining awaiting calls.
    pub async fn resolve_approvals(
        &mut self,
        approvals: &dyn ApprovalHandler,
        editor: Option<&dyn EditorLauncher>,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<SchedulerEvent>,
    ) {
        loop {
            self.apply_approval_memory();

            let Some(idx) = self
                .calls
                .iter()
                .position(|c| matches!(c.state, CallState::AwaitingApproval { .. }))
            else {
                break;
            };

            if cancel.is_cancelled() {
                self.cancel_awaiting();
                self.emit_update(tx).await;
                break;
            }

            let snapshot = self.calls[idx].snapshot();
            let details = match &self.calls[idx].state {
                CallState::AwaitingApproval { request } => request.details.clone(),
                _ => continue,
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel_awaiting();
                    self.emit_update(tx).await;
                    break;
                }
                outcome = approvals.confirm(&snapshot, &details) => outcome,
            };

            if let CallState::AwaitingApproval { request } = &self.calls[idx].state {
                request.notify(&outcome);
            }
            self.calls[idx].outcome = Some(outcome);

            match outcome {
                ConfirmationOutcome::Cancel => {
                    let call = &mut self.calls[idx];
                    let (name, id) = (call.request.name.clone(), call.request.call_id.clone());
                    call.state = CallState::Cancelled {
                        reason: CANCEL_REASON_DECLINED.into(),
                        response: cancelled_response(&name, &id, CANCEL_REASON_DECLINED),
                    };
                }
                ConfirmationOutcome::ModifyWithEditor => {
                    self.modify_in_editor(idx, editor, cancel).await;
                }
                ConfirmationOutcome::ProceedAlways => {
                    self.always_session = true;
                    self.calls[idx].state = CallState::Scheduled;
                }
                ConfirmationOutcome::ProceedAlwaysTool => {
                    self.always_tools.insert(self.calls[idx].request.name.clone());
                    self.calls[idx].state = CallState::Scheduled;
                }
                ConfirmationOutcome::ProceedAlwaysServer => {
                    let server = details
                        .server_name()
                        .map(str::to_string)
                        .or_else(|| {
                            self.calls[idx]
                                .tool
                                .as_ref()
                                .and_then(|t| t.server_name().map(str::to_string))
                        });
                    match server {
                        Some(server) => {
                            self.always_servers.insert(server);
                        }
                        None => warn!(
                            call_id = %self.calls[idx].request.call_id,
                            "proceed-always-server on a tool with no server origin"
                        ),
                    }
                    self.calls[idx].state = CallState::Scheduled;
                }
                ConfirmationOutcome::ProceedOnce => {
                    self.calls[idx].state = CallState::Scheduled;
                }
            }
            self.emit_update(tx).await;
        }
    }

    /// Auto-approve awaiting calls covered by a freshly-widened approval
    /// scope (session / tool / server "always proceed").
    fn apply_approval_memory(&mut self) {
        for idx in 0..self.calls.len() {
            let covered = match &self.calls[idx].state {
                CallState::AwaitingApproval { request } => match &self.calls[idx].tool {
                    Some(tool) => self.is_pre_approved(tool.as_ref(), &request.details),
                    None => false,
                },
                _ => false,
            };
            if covered {
                self.calls[idx].state = CallState::Scheduled;
            }
        }
    }

    fn cancel_awaiting(&mut self) {
        for call in &mut self.calls {
            if matches!(call.state, CallState::AwaitingApproval { .. }) {
                let (name, id) = (call.request.name.clone(), call.request.call_id.clone());
                call.state = CallState::Cancelled {
                    reason: CANCEL_REASON_TOKEN.into(),
                    response: cancelled_response(&name, &id, CANCEL_REASON_TOKEN),
                };
            }
        }
    }

    /// The modify-in-editor flow: compute current and proposed content, hand
    /// both to the external editor, rebuild the call's arguments from the
    /// edited text, and refresh the confirmation.  The call stays at the
    /// approval gate.
    async fn modify_in_editor(
        &mut self,
        idx: usize,
        editor: Option<&dyn EditorLauncher>,
        cancel: &CancellationToken,
    ) {
        let Some(editor) = editor else {
            warn!("modify requested but no editor is configured");
            return;
        };
        let Some(tool) = self.calls[idx].tool.clone() else {
            return;
        };
        let Some(modifiable) = tool.modify_context() else {
            warn!(tool = %tool.name(), "modify requested on a non-modifiable tool");
            return;
        };

        let args = self.calls[idx].request.args.clone();
        let file_name = match &self.calls[idx].state {
            CallState::AwaitingApproval { request } => match &request.details {
                skarv_tools::ConfirmationDetails::Edit { file_name, .. } => file_name.clone(),
                _ => tool.display_name().to_string(),
            },
            _ => return,
        };

        let current = match modifiable.current_content(&args).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "could not read current content for modify");
                return;
            }
        };
        let proposed = match modifiable.proposed_content(&args) {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "could not compute proposed content for modify");
                return;
            }
        };
        let edited = match editor.edit(&file_name, &current, &proposed).await {
            Ok(content) => content,
            Err(err) => {
                warn!(error = %err, "editor failed; keeping original proposal");
                return;
            }
        };

        let updated = modifiable.updated_params(&args, &edited);
        self.calls[idx].request.args = updated;
        debug!(call_id = %self.calls[idx].request.call_id, "arguments updated from editor");

        // Rebuild the confirmation (diff included) from the new arguments.
        match tool
            .should_confirm(&self.calls[idx].request.args, cancel)
            .await
        {
            Ok(Some(request)) => {
                self.calls[idx].state = CallState::AwaitingApproval { request };
            }
            Ok(None) => self.calls[idx].state = CallState::Scheduled,
            Err(err) => {
                let (name, id) = (
                    self.calls[idx].request.name.clone(),
                    self.calls[idx].request.call_id.clone(),
                );
                let message = err.to_string();
                self.calls[idx].state = CallState::Errored {
                    response: error_response(&name, &id, &message),
                    message,
                };
            }
        }
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Move every scheduled call to executing at once and run them in
    /// parallel.  Live output chunks update the owning call as they arrive;
    /// only the latest chunk is retained.
    pub async fn execute_all(&mut self, cancel: &CancellationToken, tx: &mpsc::Sender<SchedulerEvent>) {
        let mut launched: Vec<usize> = Vec::new();
        for (idx, call) in self.calls.iter_mut().enumerate() {
            if matches!(call.state, CallState::Scheduled) {
                call.state = CallState::Executing { live_output: None };
                call.started_at = Some(Instant::now());
                launched.push(idx);
            }
        }
        if launched.is_empty() {
            return;
        }
        self.emit_update(tx).await;

        let (live_tx, mut live_rx) = mpsc::unbounded_channel::<(usize, String)>();
        let mut pending = FuturesUnordered::new();
        for &idx in &launched {
            let Some(tool) = self.calls[idx].tool.clone() else {
                let (name, id) = (
                    self.calls[idx].request.name.clone(),
                    self.calls[idx].request.call_id.clone(),
                );
                let message = format!("tool \"{name}\" vanished before execution");
                self.calls[idx].state = CallState::Errored {
                    response: error_response(&name, &id, &message),
                    message,
                };
                continue;
            };
            let args = self.calls[idx].request.args.clone();
            let ctx = if tool.can_stream_output() {
                let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
                let forward = live_tx.clone();
                tokio::spawn(async move {
                    while let Some(chunk) = chunk_rx.recv().await {
                        if forward.send((idx, chunk)).is_err() {
                            break;
                        }
                    }
                });
                ExecutionContext {
                    cancel: cancel.clone(),
                    live_output: Some(chunk_tx),
                }
            } else {
                ExecutionContext::new(cancel.clone())
            };
            let handle = tokio::spawn(async move { tool.execute(&args, &ctx).await });
            pending.push(async move { (idx, handle.await) });
        }
        drop(live_tx);

        let mut remaining = pending.len();
        while remaining > 0 {
            tokio::select! {
                Some((idx, joined)) = pending.next() => {
                    remaining -= 1;
                    self.finish_call(idx, joined, cancel);
                    self.emit_update(tx).await;
                }
                Some((idx, chunk)) = live_rx.recv() => {
                    if let CallState::Executing { live_output } = &mut self.calls[idx].state {
                        *live_output = Some(chunk);
                        self.emit_update(tx).await;
                    }
                }
            }
        }
    }

    fn finish_call(
        &mut self,
        idx: usize,
        joined: Result<anyhow::Result<skarv_tools::ToolResult>, tokio::task::JoinError>,
        cancel: &CancellationToken,
    ) {
        let call = &mut self.calls[idx];
        call.duration_ms = call.started_at.map(|t| t.elapsed().as_millis() as u64);
        let (name, id) = (call.request.name.clone(), call.request.call_id.clone());

        call.state = match joined {
            Err(join_err) => {
                let message = format!("tool execution panicked: {join_err}");
                CallState::Errored {
                    response: error_response(&name, &id, &message),
                    message,
                }
            }
            Ok(_) if cancel.is_cancelled() => CallState::Cancelled {
                reason: CANCEL_REASON_TOKEN.into(),
                response: cancelled_response(&name, &id, CANCEL_REASON_TOKEN),
            },
            Ok(Err(err)) => {
                let message = err.to_string();
                CallState::Errored {
                    response: error_response(&name, &id, &message),
                    message,
                }
            }
            Ok(Ok(result)) => CallState::Success {
                response: convert_to_function_response(&name, &id, &result.llm_content),
                display: result.display,
            },
        };
    }

    // ── Completion accounting ─────────────────────────────────────────────────

    /// Number of model-initiated calls in the current batch.
    pub fn model_call_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| !c.request.is_client_initiated)
            .count()
    }

    pub fn model_calls_all_cancelled(&self) -> bool {
        let model_calls: Vec<_> = self
            .calls
            .iter()
            .filter(|c| !c.request.is_client_initiated)
            .collect();
        !model_calls.is_empty()
            && model_calls
                .iter()
                .all(|c| matches!(c.state, CallState::Cancelled { .. }))
    }

    /// Function-response parts of all model-initiated calls, flattened in the
    /// original emission order regardless of completion order.
    pub fn collect_model_responses(&self) -> Vec<skarv_model::Part> {
        self.calls
            .iter()
            .filter(|c| !c.request.is_client_initiated)
            .filter_map(ToolCall::response_parts)
            .flatten()
            .cloned()
            .collect()
    }

    /// Flip the one-shot submitted flag on every terminal call.
    pub fn mark_all_submitted(&mut self) {
        for call in &mut self.calls {
            if call.is_terminal() {
                call.response_submitted = true;
            }
        }
    }

    /// Drop terminal calls whose responses were handed over.
    pub fn clear_submitted(&mut self) {
        self.calls
            .retain(|c| !(c.is_terminal() && c.response_submitted));
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
