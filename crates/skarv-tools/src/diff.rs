// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// A proposed file change shown in an edit confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file_name: String,
    /// `None` when the file does not exist yet.
    pub old_content: Option<String>,
    pub new_content: String,
    /// Unified diff rendering of old → new.
    pub unified: String,
}

/// Build a [`FileDiff`] with a unified-diff rendering of the change.
pub fn unified_diff(file_name: &str, old_content: Option<&str>, new_content: &str) -> FileDiff {
    let old = old_content.unwrap_or("");
    let unified = TextDiff::from_lines(old, new_content)
        .unified_diff()
        .context_radius(3)
        .header(file_name, file_name)
        .to_string();
    FileDiff {
        file_name: file_name.to_string(),
        old_content: old_content.map(str::to_string),
        new_content: new_content.to_string(),
        unified,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
