// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::types::{FunctionCall, UsageMetadata};

/// One raw part inside a streamed chunk, before demultiplexing.
///
/// A `thought` part carries plain text in the backend's
/// `**subject** description` convention; the demultiplexer splits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl RawPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn thought(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: true,
            ..Self::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }
}

/// One chunk of a streaming model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChunk {
    #[serde(default)]
    pub parts: Vec<RawPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageMetadata>,
}

impl RawChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![RawPart::text(text)],
            usage: None,
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            parts: vec![RawPart::function_call(call)],
            usage: None,
        }
    }

    pub fn usage(usage: UsageMetadata) -> Self {
        Self {
            parts: vec![],
            usage: Some(usage),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
