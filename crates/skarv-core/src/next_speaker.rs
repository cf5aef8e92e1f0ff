// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The "who talks next" check run after a tool-free model turn.
//!
//! Deterministic shortcuts first; only when those don't apply is an
//! auxiliary structured-generation call made against the session.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use skarv_model::{CancellationToken, GenerateRequest, Message, Role};

use crate::session::ChatSession;

const CHECK_PROMPT: &str = "Analyze *only* the content and structure of your immediately \
     preceding response. Based *strictly* on that response, decide who logically speaks next. \
     Answer 'model' if your response was clearly incomplete: it announced an immediate next \
     action you were about to take, or stopped mid-task without asking the user anything. \
     Answer 'user' if your response finished the request, asked the user a question, or is \
     otherwise waiting on user input.";

/// Schema for the structured check answer.
fn next_speaker_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "reasoning": {
                "type": "string",
                "description": "Brief justification based on the last response."
            },
            "next_speaker": {
                "type": "string",
                "enum": ["user", "model"]
            }
        },
        "required": ["reasoning", "next_speaker"]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextSpeaker {
    User,
    Model,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextSpeakerResponse {
    #[serde(default)]
    pub reasoning: String,
    pub next_speaker: NextSpeaker,
}

/// Decide who speaks next.  Returns `None` when the check cannot decide
/// (no history, or the auxiliary call failed) — callers treat that as the
/// user's turn.
pub async fn check_next_speaker(
    session: &mut ChatSession,
    cancel: &CancellationToken,
) -> Option<NextSpeakerResponse> {
    // Shortcut: a trailing function-response turn always hands control back
    // to the model.
    let last = session.last_comprehensive()?.clone();
    if last.role == Role::User && last.is_function_response_only() {
        return Some(NextSpeakerResponse {
            reasoning: "Function responses are always followed by the model.".into(),
            next_speaker: NextSpeaker::Model,
        });
    }

    // Shortcut: an empty trailing model turn means the model stalled; pad it
    // so the curated view stays valid and let the model continue.
    if last.role == Role::Model && last.is_empty() {
        session.pad_empty_model_tail();
        return Some(NextSpeakerResponse {
            reasoning: "The model produced an empty turn and should continue.".into(),
            next_speaker: NextSpeaker::Model,
        });
    }

    if last.role != Role::Model {
        return None;
    }

    let mut messages = session.history(true);
    messages.push(Message::user(CHECK_PROMPT));
    let req = GenerateRequest {
        model: session.model().to_string(),
        messages,
        system_instruction: None,
        tools: vec![],
    };
    match session
        .provider()
        .generate_json(req, next_speaker_schema(), cancel.clone())
        .await
    {
        Ok(value) => match serde_json::from_value::<NextSpeakerResponse>(value) {
            Ok(answer) => Some(answer),
            Err(err) => {
                debug!(error = %err, "next-speaker answer did not match schema");
                None
            }
        },
        Err(err) => {
            debug!(error = %err, "next-speaker check failed");
            None
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
