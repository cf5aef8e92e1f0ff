// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `skarv-core` — the turn scheduler and everything it owns.
//!
//! One user submission flows through: dispatch (slash / shell / @-path) →
//! history compression check → model stream → demultiplexed events → tool
//! call batch (validate → approve → execute in parallel) → function
//! responses appended in emission order → re-enter the model, until the
//! model stops requesting tools and the next-speaker check yields the turn
//! back to the user.

mod calls;
mod checkpoint;
mod collaborators;
mod demux;
mod error;
mod events;
mod manager;
mod next_speaker;
mod scheduler;
mod session;
mod split;
mod turn;

pub use calls::{CallState, CallStatus, ToolCall, ToolCallRequest, ToolCallSnapshot};
pub use checkpoint::{checkpoint_file_name, write_checkpoint, CheckpointSidecar};
pub use collaborators::{
    AlwaysCancel, AlwaysProceed, ApprovalHandler, AtExpander, Collaborators, CommandOutcome,
    CommandProcessor, EditorLauncher, MemoryMonitor, ShellProcessor, SnapshotService,
};
pub use demux::{parse_thought, synthesize_call_id, StreamDemux, StreamEvent};
pub use error::SchedulerError;
pub use events::SchedulerEvent;
pub use manager::ToolCallManager;
pub use next_speaker::{check_next_speaker, NextSpeaker, NextSpeakerResponse};
pub use scheduler::{TurnScheduler, REPLACE_TOOL, SAVE_MEMORY_TOOL, SHELL_SENTINEL, WRITE_FILE_TOOL};
pub use session::{ChatSession, CompressionSnapshot, FallbackHandler};
pub use split::find_last_safe_split_point;
pub use turn::TurnContext;
