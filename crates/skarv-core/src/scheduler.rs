// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The turn scheduler: drives one user submission to completion.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use skarv_config::SchedulerConfig;
use skarv_model::{CancellationToken, Message, ModelError, Part};

use crate::calls::ToolCallRequest;
use crate::checkpoint::{write_checkpoint, CheckpointSidecar, CheckpointToolCall};
use crate::collaborators::{Collaborators, CommandOutcome};
use crate::demux::{synthesize_call_id, StreamDemux, StreamEvent};
use crate::error::SchedulerError;
use crate::events::SchedulerEvent;
use crate::manager::ToolCallManager;
use crate::next_speaker::{check_next_speaker, NextSpeaker};
use crate::session::ChatSession;
use crate::turn::TurnContext;

/// Successful completion of this tool triggers the memory-refresh signal.
pub const SAVE_MEMORY_TOOL: &str = "save_memory";
/// Restorable tools: their pre-approval state is snapshotted to disk.
pub const REPLACE_TOOL: &str = "replace";
pub const WRITE_FILE_TOOL: &str = "write_file";
/// Leading character routing input to the shell processor while shell mode
/// is active.
pub const SHELL_SENTINEL: char = '!';

const CONTINUE_PROMPT: &str = "Please continue.";
const CANCELLED_INFO: &str = "User cancelled the request.";

pub struct TurnScheduler {
    session: ChatSession,
    registry: Arc<skarv_tools::ToolRegistry>,
    manager: ToolCallManager,
    collab: Collaborators,
    config: SchedulerConfig,
    shell_mode: bool,
    /// Call ids whose save-memory success was already signalled.
    memory_signalled: HashSet<String>,
}

/// What one round of the turn loop produced.
enum RoundOutcome {
    /// Tool calls to schedule.
    Batch(Vec<ToolCallRequest>),
    /// Re-enter the model with this query.
    Continue(Vec<Part>, bool),
    /// The turn is over.
    Done,
}

impl TurnScheduler {
    pub fn new(
        session: ChatSession,
        registry: Arc<skarv_tools::ToolRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        let manager = ToolCallManager::new(Arc::clone(&registry), config.approval_mode);
        Self {
            session,
            registry,
            manager,
            collab: Collaborators::default(),
            config,
            shell_mode: false,
            memory_signalled: HashSet::new(),
        }
    }

    pub fn with_collaborators(mut self, collab: Collaborators) -> Self {
        self.collab = collab;
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    pub fn manager(&self) -> &ToolCallManager {
        &self.manager
    }

    pub fn set_shell_mode(&mut self, active: bool) {
        self.shell_mode = active;
    }

    /// Drive one user turn to completion, emitting progress through `tx`.
    ///
    /// Auth failures bubble to the caller; every other error terminates the
    /// turn with an `Error` event while the session survives.
    pub async fn submit(
        &mut self,
        input: &str,
        tx: mpsc::Sender<SchedulerEvent>,
        cancel: CancellationToken,
    ) -> Result<(), SchedulerError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            let _ = tx.send(SchedulerEvent::UserCancelled).await;
            let _ = tx.send(SchedulerEvent::TurnComplete).await;
            return Ok(());
        }

        // Step 1: dispatch.
        let mut initial_batch: Option<Vec<ToolCallRequest>> = None;
        let mut query: Option<Vec<Part>> = None;

        if trimmed.starts_with('/') || trimmed.starts_with('?') {
            if let Some(commands) = self.collab.commands.clone() {
                match commands.process(trimmed).await {
                    Ok(CommandOutcome::Handled) => {
                        let _ = tx.send(SchedulerEvent::TurnComplete).await;
                        return Ok(());
                    }
                    Ok(CommandOutcome::ScheduleTool { name, args }) => {
                        initial_batch = Some(vec![ToolCallRequest {
                            call_id: synthesize_call_id(&name),
                            name,
                            args,
                            is_client_initiated: true,
                        }]);
                    }
                    Ok(CommandOutcome::NotACommand) => {}
                    Err(err) => {
                        let _ = tx.send(SchedulerEvent::Error(err.to_string())).await;
                        let _ = tx.send(SchedulerEvent::TurnComplete).await;
                        return Ok(());
                    }
                }
            }
        }

        if initial_batch.is_none() {
            if self.shell_mode && trimmed.starts_with(SHELL_SENTINEL) {
                if let Some(shell) = self.collab.shell.clone() {
                    if let Err(err) = shell.run(trimmed).await {
                        let _ = tx.send(SchedulerEvent::Error(err.to_string())).await;
                    }
                }
                let _ = tx.send(SchedulerEvent::TurnComplete).await;
                return Ok(());
            }
            query = Some(self.expand_query(trimmed, &tx).await?);
        }

        // Step 2: compression check (skipped for client-initiated batches —
        // those never reach the model).
        if initial_batch.is_some() {
            debug!("client-initiated tool call; skipping compression check");
        } else {
            match self.session.try_compress(false, &cancel).await {
                Ok(Some(snapshot)) => {
                    let _ = tx.send(SchedulerEvent::ChatCompressed(snapshot)).await;
                }
                Ok(None) => {}
                Err(ModelError::Auth(message)) => return Err(ModelError::Auth(message).into()),
                Err(err) => warn!(error = %err, "compression attempt failed; continuing"),
            }
        }

        // Step 3: open the turn.
        self.session.set_tools(self.registry.function_declarations());
        let mut turn = TurnContext::new(cancel.clone(), self.config.max_turns);
        let mut next_query = query;
        let mut input_was_function_response = false;

        // Steps 4–8: the continuation loop.
        loop {
            let requests = if let Some(batch) = initial_batch.take() {
                batch
            } else {
                let Some(parts) = next_query.take() else { break };
                match self
                    .stream_round(parts, input_was_function_response, &mut turn, &tx)
                    .await?
                {
                    RoundOutcome::Batch(requests) => requests,
                    RoundOutcome::Continue(parts, was_fr) => {
                        next_query = Some(parts);
                        input_was_function_response = was_fr;
                        continue;
                    }
                    RoundOutcome::Done => break,
                }
            };

            // Step 5: schedule the batch.
            if let Err(err) = self.manager.schedule(requests, &cancel, &tx).await {
                match err {
                    SchedulerError::Model(model_err) => return Err(model_err.into()),
                    other => {
                        error!(error = %other, "failed to schedule tool batch");
                        let _ = tx.send(SchedulerEvent::Error(other.to_string())).await;
                        break;
                    }
                }
            }

            // Restorable tools parked at the approval gate get a snapshot.
            self.checkpoint_restorable(&tx).await;

            // Step 6: drive the batch to terminal.
            {
                let approvals = Arc::clone(&self.collab.approvals);
                let editor = self.collab.editor.clone();
                self.manager
                    .resolve_approvals(&*approvals, editor.as_deref(), &cancel, &tx)
                    .await;
            }
            self.manager.execute_all(&cancel, &tx).await;

            self.signal_memory_refresh().await;

            if self.manager.model_call_count() == 0 {
                // Client-initiated only: acknowledge without a model round-trip.
                self.manager.mark_all_submitted();
                self.manager.clear_submitted();
                break;
            }

            if self.manager.model_calls_all_cancelled() {
                // The model must see the cancellations on a later turn, but
                // this turn does not re-enter it.
                let parts = self.manager.collect_model_responses();
                self.session.add_history(Message::user_parts(parts));
                self.manager.mark_all_submitted();
                self.manager.clear_submitted();
                if cancel.is_cancelled() {
                    turn.discard_pending();
                    let _ = tx.send(SchedulerEvent::Info(CANCELLED_INFO.into())).await;
                    let _ = tx.send(SchedulerEvent::UserCancelled).await;
                }
                break;
            }

            let parts = self.manager.collect_model_responses();
            self.manager.mark_all_submitted();
            self.manager.clear_submitted();
            next_query = Some(parts);
            input_was_function_response = true;
        }

        let _ = tx.send(SchedulerEvent::TurnComplete).await;
        Ok(())
    }

    /// One model stream: returns the batch it emitted, a continuation query,
    /// or the end of the turn.
    async fn stream_round(
        &mut self,
        parts: Vec<Part>,
        input_was_function_response: bool,
        turn: &mut TurnContext,
        tx: &mpsc::Sender<SchedulerEvent>,
    ) -> Result<RoundOutcome, SchedulerError> {
        // Step 8: the continuation budget bounds model invocations.
        if !turn.consume_budget() {
            warn!("continuation budget exhausted; terminating turn");
            if let Some(usage) = turn.last_usage.clone() {
                let _ = tx.send(SchedulerEvent::UsageMetadata(usage)).await;
            }
            return Ok(RoundOutcome::Done);
        }

        let stream = match self.session.send_stream(parts, turn.cancel.clone()).await {
            Ok(stream) => stream,
            Err(ModelError::Auth(message)) => return Err(ModelError::Auth(message).into()),
            Err(ModelError::Cancelled) => {
                turn.discard_pending();
                let _ = tx.send(SchedulerEvent::Info(CANCELLED_INFO.into())).await;
                let _ = tx.send(SchedulerEvent::UserCancelled).await;
                return Ok(RoundOutcome::Done);
            }
            Err(err) => {
                let _ = tx.send(SchedulerEvent::Error(err.to_string())).await;
                return Ok(RoundOutcome::Done);
            }
        };

        let mut demux = StreamDemux::new(stream, turn.cancel.clone());
        let mut model_parts: Vec<Part> = Vec::new();
        let mut requests: Vec<ToolCallRequest> = Vec::new();
        let mut cancelled = false;
        let mut stream_failed = false;

        while let Some(event) = demux.next().await {
            match event {
                StreamEvent::Content(text) => {
                    let _ = tx.send(SchedulerEvent::TextDelta(text.clone())).await;
                    if let Some(flushed) = turn.push_text(&text) {
                        let _ = tx.send(SchedulerEvent::TextFlushed(flushed)).await;
                    }
                    model_parts.push(Part::text(text));
                }
                StreamEvent::Thought {
                    subject,
                    description,
                } => {
                    let _ = tx
                        .send(SchedulerEvent::Thought {
                            subject: subject.clone(),
                            description: description.clone(),
                        })
                        .await;
                    model_parts.push(Part::Thought {
                        subject,
                        description,
                    });
                }
                StreamEvent::FunctionCall(call) => {
                    let call_id = call
                        .id
                        .clone()
                        .unwrap_or_else(|| synthesize_call_id(&call.name));
                    model_parts.push(Part::FunctionCall(call.clone()));
                    requests.push(ToolCallRequest {
                        call_id,
                        name: call.name.clone(),
                        args: Value::Object(call.args),
                        is_client_initiated: false,
                    });
                }
                StreamEvent::UsageMetadata(usage) => {
                    turn.last_usage = Some(usage.clone());
                    let _ = tx.send(SchedulerEvent::UsageMetadata(usage)).await;
                }
                StreamEvent::Error { message, .. } => {
                    let _ = tx.send(SchedulerEvent::Error(message)).await;
                    stream_failed = true;
                }
                StreamEvent::UserCancelled => {
                    cancelled = true;
                }
            }
        }

        if cancelled {
            // Record an empty model turn: curation drops it together with
            // the triggering user message, so the curated view is exactly
            // what it was before the cancelled submission.
            self.session
                .record_model_output(vec![Message::model_parts(vec![])], false);
            turn.discard_pending();
            let _ = tx.send(SchedulerEvent::Info(CANCELLED_INFO.into())).await;
            let _ = tx.send(SchedulerEvent::UserCancelled).await;
            return Ok(RoundOutcome::Done);
        }

        self.session.record_model_output(
            vec![Message::model_parts(model_parts)],
            input_was_function_response,
        );

        if let Some(tail) = turn.take_pending() {
            let _ = tx.send(SchedulerEvent::TextFlushed(tail)).await;
        }

        if stream_failed {
            return Ok(RoundOutcome::Done);
        }

        if !requests.is_empty() {
            return Ok(RoundOutcome::Batch(requests));
        }

        // Step 7: no tool calls — ask who speaks next.
        match check_next_speaker(&mut self.session, &turn.cancel).await {
            Some(answer) if answer.next_speaker == NextSpeaker::Model => {
                debug!(reasoning = %answer.reasoning, "model continues speaking");
                Ok(RoundOutcome::Continue(
                    vec![Part::text(CONTINUE_PROMPT)],
                    false,
                ))
            }
            _ => Ok(RoundOutcome::Done),
        }
    }

    /// Expand `@path` references through the collaborator; plain input
    /// becomes a single text part.
    async fn expand_query(
        &self,
        input: &str,
        tx: &mpsc::Sender<SchedulerEvent>,
    ) -> Result<Vec<Part>, SchedulerError> {
        let has_at_reference = input
            .split_whitespace()
            .any(|word| word.starts_with('@') && word.len() > 1);
        if has_at_reference {
            if let Some(expander) = &self.collab.at_expander {
                match expander.expand(input).await {
                    Ok(parts) => return Ok(parts),
                    Err(err) => {
                        warn!(error = %err, "at-path expansion failed; sending raw input");
                        let _ = tx.send(SchedulerEvent::Error(err.to_string())).await;
                    }
                }
            }
        }
        Ok(vec![Part::text(input)])
    }

    /// Snapshot the filesystem for restorable calls at the approval gate and
    /// write the checkpoint sidecar.
    async fn checkpoint_restorable(&self, _tx: &mpsc::Sender<SchedulerEvent>) {
        if !self.config.checkpointing {
            return;
        }
        let (Some(dir), Some(snapshots)) =
            (self.config.checkpoint_dir.as_ref(), self.collab.snapshots.as_ref())
        else {
            return;
        };

        for request in self.manager.awaiting_requests() {
            if request.name != REPLACE_TOOL && request.name != WRITE_FILE_TOOL {
                continue;
            }
            let Some(file_path) = request.args.get("file_path").and_then(Value::as_str) else {
                debug!(call_id = %request.call_id, "restorable call without file_path; skipping checkpoint");
                continue;
            };
            let commit_hash = match snapshots.snapshot(std::path::Path::new(file_path)).await {
                Ok(hash) => hash,
                Err(err) => {
                    warn!(error = %err, file_path, "snapshot failed; skipping checkpoint");
                    continue;
                }
            };
            let sidecar = CheckpointSidecar {
                history: self.session.history(false),
                client_history: self.session.history(true),
                tool_call: CheckpointToolCall {
                    name: request.name.clone(),
                    args: request.args.clone(),
                },
                commit_hash,
                file_path: file_path.to_string(),
            };
            if let Err(err) = write_checkpoint(dir, Utc::now(), &sidecar) {
                warn!(error = %err, "writing checkpoint sidecar failed");
            }
        }
    }

    /// Signal the memory collaborator for every successful save-memory call,
    /// at most once per call id.
    async fn signal_memory_refresh(&mut self) {
        let Some(memory) = self.collab.memory.clone() else {
            return;
        };
        for snapshot in self.manager.snapshots() {
            if snapshot.name == SAVE_MEMORY_TOOL
                && snapshot.status == crate::calls::CallStatus::Success
                && self.memory_signalled.insert(snapshot.call_id.clone())
            {
                memory.refresh().await;
            }
        }
    }
}
