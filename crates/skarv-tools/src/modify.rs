// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// Implemented by tools whose proposed change can be edited by the user
/// before approval ("modify in editor").
///
/// The scheduler computes the current and proposed content, lets the user
/// edit the proposal externally, then rebuilds the call's arguments from the
/// edited text via [`updated_params`](Modifiable::updated_params).
#[async_trait]
pub trait Modifiable: Send + Sync {
    /// Content as it exists now (reads the filesystem).
    async fn current_content(&self, args: &Value) -> anyhow::Result<String>;

    /// Content as it would exist after the call runs.
    fn proposed_content(&self, args: &Value) -> anyhow::Result<String>;

    /// Rebuild the argument object from the user-edited content.
    fn updated_params(&self, args: &Value, edited: &str) -> Value;
}
