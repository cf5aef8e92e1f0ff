// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_fallback_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_turns() -> u32 {
    100
}

fn default_compression_threshold() -> f32 {
    0.95
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

/// Session-wide policy controlling whether tool confirmation prompts are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every tool that requests confirmation prompts the user.
    #[default]
    Default,
    /// Edit confirmations are auto-approved; everything else prompts.
    AutoEdit,
    /// All confirmations are suppressed.
    Yolo,
}

/// How the session authenticates against the model backend.
///
/// Only the distinction matters here: the fallback-model path on persistent
/// rate limiting is offered to OAuth sessions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    ApiKey,
    Oauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model identifier forwarded to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model to switch to when the primary is persistently rate-limited.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default)]
    pub auth: AuthKind,
    /// Fraction of the model token limit at which history compression fires.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: f32,
    /// Maximum send attempts for one model call (first try included).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between retries.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            fallback_model: default_fallback_model(),
            auth: AuthKind::default(),
            compression_threshold: default_compression_threshold(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// Continuation budget: maximum model stream invocations per user turn.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Snapshot restorable tool calls (file edits) before approval.
    #[serde(default)]
    pub checkpointing: bool,
    /// Project temp directory that receives the `checkpoints/` subdirectory.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::default(),
            max_turns: default_max_turns(),
            checkpointing: false,
            checkpoint_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
