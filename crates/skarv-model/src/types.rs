// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Roles and parts ──────────────────────────────────────────────────────────

/// Who authored a message.  Tool results travel inside `User` messages; tool
/// requests inside `Model` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A tool invocation requested by the model.
///
/// `id` is optional on the wire; the stream demultiplexer synthesizes one
/// when the backend omits it, so ids are always present past that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The result of a tool invocation, fed back to the model.
///
/// `response` carries `{"output": …}` on success, `{"error": …}` on failure,
/// or a tool-specific map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub response: Map<String, Value>,
}

/// A single content part in a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    /// Model reasoning.  Stripped from history before the next model call.
    Thought {
        subject: String,
        description: String,
    },
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
    /// Opaque binary payload (base64) with its mime type.
    InlineData {
        mime_type: String,
        data: String,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self::FunctionCall(call)
    }

    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: Map<String, Value>,
    ) -> Self {
        Self::FunctionResponse(FunctionResponse {
            id: id.into(),
            name: name.into(),
            response,
        })
    }

    /// Whether this part carries observable content.  Thoughts never do —
    /// they are internal reasoning, not conversation content.
    pub fn has_content(&self) -> bool {
        match self {
            Self::Text { text } => !text.is_empty(),
            Self::Thought { .. } => false,
            Self::FunctionCall(_) | Self::FunctionResponse(_) => true,
            Self::InlineData { data, .. } => !data.is_empty(),
        }
    }

    pub fn is_thought(&self) -> bool {
        matches!(self, Self::Thought { .. })
    }

    pub fn is_function_response(&self) -> bool {
        matches!(self, Self::FunctionResponse(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// One conversation entry: an ordered sequence of parts under a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// A message is empty when it has no parts or none of its parts carry
    /// observable content (empty text, no data, thought-only).
    pub fn is_empty(&self) -> bool {
        !self.parts.iter().any(Part::has_content)
    }

    /// True when every part is plain text.
    pub fn is_text_only(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|p| matches!(p, Part::Text { .. }))
    }

    /// True when every part is a function response (the shape of a tool-result
    /// turn fed back to the model).
    pub fn is_function_response_only(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(Part::is_function_response)
    }

    /// Concatenated text of all `Text` parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Rough token estimate (4 chars per token) used for budget heuristics
    /// when the backend cannot count.
    pub fn approx_tokens(&self) -> u64 {
        let chars: usize = self
            .parts
            .iter()
            .map(|p| match p {
                Part::Text { text } => text.len(),
                Part::Thought {
                    subject,
                    description,
                } => subject.len() + description.len(),
                Part::FunctionCall(c) => c.name.len() + Value::Object(c.args.clone()).to_string().len(),
                Part::FunctionResponse(r) => {
                    r.name.len() + Value::Object(r.response.clone()).to_string().len()
                }
                Part::InlineData { data, .. } => data.len(),
            })
            .sum();
        ((chars / 4).max(1)) as u64
    }
}

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Schema entry advertising one tool to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

/// One model call: the request context assembled from curated history.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system_instruction: Option<String>,
    pub tools: Vec<FunctionDeclaration>,
}

/// Usage statistics reported at the end of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub total_tokens: u64,
    /// Wall-clock time the backend spent serving the request.
    pub api_time_ms: u64,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
