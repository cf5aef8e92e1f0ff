// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `skarv` — an agent turn runtime.
//!
//! Sits between an interactive surface and a model backend: streams one
//! model turn, interprets tool-use requests, gates side effects behind user
//! approval, executes tools in parallel with live output, feeds results back
//! to the model until it yields the turn, and keeps the conversation history
//! bounded by compressing it near the context limit.
//!
//! The crates compose leaves-first:
//!
//! ```text
//! skarv-config   approval modes, scheduler/session settings
//! skarv-model    messages & parts, raw stream events, ModelProvider
//! skarv-tools    Tool contract, registry, confirmations, response shaping
//! skarv-core     chat session, demultiplexer, call manager, turn scheduler
//! ```
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use skarv::{
//!     ChatSession, Collaborators, SchedulerConfig, SessionConfig, ToolRegistry, TurnScheduler,
//! };
//!
//! # fn provider() -> Arc<dyn skarv::ModelProvider> { unimplemented!() }
//! let session = ChatSession::new(provider(), SessionConfig::default());
//! let registry = Arc::new(ToolRegistry::new());
//! let mut scheduler = TurnScheduler::new(session, registry, SchedulerConfig::default())
//!     .with_collaborators(Collaborators::default());
//! ```

pub use skarv_config::{ApprovalMode, AuthKind, Config, SchedulerConfig, SessionConfig};
pub use skarv_core::{
    check_next_speaker, find_last_safe_split_point, AlwaysCancel, AlwaysProceed, ApprovalHandler,
    AtExpander, CallStatus, ChatSession, CheckpointSidecar, Collaborators, CommandOutcome,
    CommandProcessor, CompressionSnapshot, EditorLauncher, MemoryMonitor, NextSpeaker,
    SchedulerError, SchedulerEvent, ShellProcessor, SnapshotService, StreamDemux, StreamEvent,
    ToolCallManager, ToolCallRequest, ToolCallSnapshot, TurnScheduler, REPLACE_TOOL,
    SAVE_MEMORY_TOOL, SHELL_SENTINEL, WRITE_FILE_TOOL,
};
pub use skarv_model::{
    CancellationToken, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest,
    Message, ModelError, ModelProvider, Part, RawChunk, RawPart, RawStream, Role, ScriptedCall,
    ScriptedProvider, UsageMetadata,
};
pub use skarv_tools::{
    cancelled_response, convert_to_function_response, error_response, unified_diff,
    ConfirmationDetails, ConfirmationOutcome, ConfirmationRequest, DisplayOutput,
    ExecutionContext, FileDiff, LlmContent, Modifiable, Tool, ToolRegistry, ToolResult,
};
