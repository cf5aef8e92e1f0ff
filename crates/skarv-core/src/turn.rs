// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use skarv_model::{CancellationToken, UsageMetadata};

use crate::split::{find_last_safe_split_point, has_unclosed_inline_span};

/// Flush accumulated text once the pending buffer grows past this size.
const SPLIT_FLUSH_THRESHOLD: usize = 1024;

/// Per-turn state owned by the scheduler: the cancellation token, the
/// pending display text being assembled, the remaining continuation budget,
/// and the last observed usage metadata.
pub struct TurnContext {
    pub cancel: CancellationToken,
    pending_text: String,
    remaining: u32,
    pub last_usage: Option<UsageMetadata>,
}

impl TurnContext {
    pub fn new(cancel: CancellationToken, budget: u32) -> Self {
        Self {
            cancel,
            pending_text: String::new(),
            remaining: budget,
            last_usage: None,
        }
    }

    /// Remaining model stream invocations.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Consume one unit of continuation budget.  Returns `false` when the
    /// budget is exhausted.
    pub fn consume_budget(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Append streamed text; returns a finalized block when a safe split
    /// point accumulated behind the threshold.
    pub fn push_text(&mut self, delta: &str) -> Option<String> {
        self.pending_text.push_str(delta);
        if self.pending_text.len() < SPLIT_FLUSH_THRESHOLD {
            return None;
        }
        let split = find_last_safe_split_point(&self.pending_text);
        if split == 0 || has_unclosed_inline_span(&self.pending_text[..split]) {
            return None;
        }
        let rest = self.pending_text.split_off(split);
        let flushed = std::mem::replace(&mut self.pending_text, rest);
        Some(flushed)
    }

    /// Take whatever text is still pending (end of model turn).
    pub fn take_pending(&mut self) -> Option<String> {
        if self.pending_text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending_text))
        }
    }

    /// Drop pending text without surfacing it (cancellation).
    pub fn discard_pending(&mut self) {
        self.pending_text.clear();
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
