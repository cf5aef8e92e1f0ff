// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Checkpoint sidecars for restorable tool calls.
//!
//! When a file-modifying tool reaches the approval gate, the conversation
//! and a filesystem snapshot reference are written to disk so a later
//! restore can rewind both.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use skarv_model::Message;

/// The sidecar written next to a filesystem snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSidecar {
    /// Full transcript view at checkpoint time.
    pub history: Vec<Message>,
    /// Curated view (what the model would see).
    pub client_history: Vec<Message>,
    pub tool_call: CheckpointToolCall,
    /// Snapshot reference returned by the snapshot service.
    pub commit_hash: String,
    /// Path the pending tool call would modify.
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointToolCall {
    pub name: String,
    pub args: Value,
}

/// `<ISO timestamp with ':' and '.' replaced by '-'>-<basename>-<tool>.json`
pub fn checkpoint_file_name(now: DateTime<Utc>, file_path: &str, tool_name: &str) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let basename = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{stamp}-{basename}-{tool_name}.json")
}

/// Write `sidecar` under `<dir>/checkpoints/`, creating the directory as
/// needed.  Returns the sidecar path.
pub fn write_checkpoint(
    dir: &Path,
    now: DateTime<Utc>,
    sidecar: &CheckpointSidecar,
) -> anyhow::Result<PathBuf> {
    let checkpoints = dir.join("checkpoints");
    std::fs::create_dir_all(&checkpoints)
        .with_context(|| format!("creating {}", checkpoints.display()))?;
    let name = checkpoint_file_name(now, &sidecar.file_path, &sidecar.tool_call.name);
    let path = checkpoints.join(name);
    let json = serde_json::to_string_pretty(sidecar)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
