// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use skarv_model::UsageMetadata;

use crate::calls::ToolCallSnapshot;
use crate::session::CompressionSnapshot;

/// Events emitted by the scheduler during a single turn.
/// Consumers subscribe through the channel passed to `submit`; event order
/// matches the order the scheduler observed things.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A text chunk streamed from the model (raw, unsplit).
    TextDelta(String),
    /// A finalized block of model text, split at a markdown-safe boundary.
    /// The UI can render it permanently; subsequent deltas belong to a fresh
    /// pending block.
    TextFlushed(String),
    /// A reasoning summary from the model.
    Thought { subject: String, description: String },
    /// The tool-call batch changed (state transition, live output, result).
    ToolCallsUpdated(Vec<ToolCallSnapshot>),
    /// History was compressed before the first model call of this turn.
    ChatCompressed(CompressionSnapshot),
    /// Usage statistics from the most recent model stream.
    UsageMetadata(UsageMetadata),
    /// An informational line for the transcript.
    Info(String),
    /// A recoverable error; the turn terminates but the session survives.
    Error(String),
    /// The turn's cancellation token fired.
    UserCancelled,
    /// The scheduler yielded the turn back to the user.
    TurnComplete,
}
