// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Pre-scripted mock backend for deterministic tests.
//!
//! Each `send_stream` call pops the next script from the front of the queue,
//! so tests specify exact event sequences — tool calls, usage, mid-stream
//! errors — without network access.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::{Map, Value};

use crate::{
    cancel::CancellationToken,
    error::ModelError,
    events::RawChunk,
    provider::{ModelProvider, RawStream},
    types::{FunctionCall, GenerateRequest, Message, UsageMetadata},
};

/// One scripted `send_stream` response.
pub enum ScriptedCall {
    /// A stream that yields these items in order.
    Stream(Vec<Result<RawChunk, ModelError>>),
    /// The call itself fails before any chunk is produced.
    Fail(ModelError),
}

pub struct ScriptedProvider {
    scripts: Arc<Mutex<Vec<ScriptedCall>>>,
    json_answers: Arc<Mutex<Vec<Value>>>,
    token_counts: Arc<Mutex<Vec<Option<u64>>>>,
    /// Every request seen by `send_stream`, in order, for test inspection.
    pub requests: Arc<Mutex<Vec<GenerateRequest>>>,
    /// Every request seen by `generate_json`.
    pub json_requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<ScriptedCall>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            json_answers: Arc::new(Mutex::new(Vec::new())),
            token_counts: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            json_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue answers for successive `generate_json` calls.
    pub fn with_json_answers(self, answers: Vec<Value>) -> Self {
        *self.json_answers.lock().unwrap() = answers;
        self
    }

    /// Queue results for successive `count_tokens` calls.  Once exhausted,
    /// counting falls back to the 4-chars-per-token estimate.
    pub fn with_token_counts(self, counts: Vec<Option<u64>>) -> Self {
        *self.token_counts.lock().unwrap() = counts;
        self
    }

    /// Provider whose every turn is the single text reply `text`.
    pub fn always_text(text: impl Into<String>) -> Self {
        let t = text.into();
        Self::new(vec![ScriptedCall::Stream(vec![
            Ok(RawChunk::text(t)),
            Ok(RawChunk::usage(UsageMetadata {
                prompt_tokens: 5,
                response_tokens: 5,
                total_tokens: 10,
                api_time_ms: 1,
            })),
        ])])
    }

    /// Script: one turn emitting a tool call, then one text turn after the
    /// tool result comes back.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Map<String, Value>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ScriptedCall::Stream(vec![Ok(RawChunk::function_call(FunctionCall {
                id: Some(call_id.into()),
                name: tool_name.into(),
                args,
            }))]),
            ScriptedCall::Stream(vec![Ok(RawChunk::text(final_text))]),
        ])
    }

    /// Number of scripts not yet consumed.
    pub fn remaining_scripts(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    fn approx_count(contents: &[Message]) -> u64 {
        contents.iter().map(Message::approx_tokens).sum()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    async fn send_stream(
        &self,
        req: GenerateRequest,
        _cancel: CancellationToken,
    ) -> Result<RawStream, ModelError> {
        self.requests.lock().unwrap().push(req);
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                ScriptedCall::Stream(vec![Ok(RawChunk::text("[no more scripts]"))])
            } else {
                scripts.remove(0)
            }
        };
        match script {
            ScriptedCall::Fail(err) => Err(err),
            ScriptedCall::Stream(items) => Ok(Box::pin(stream::iter(items))),
        }
    }

    async fn generate_json(
        &self,
        req: GenerateRequest,
        _schema: Value,
        _cancel: CancellationToken,
    ) -> Result<Value, ModelError> {
        self.json_requests.lock().unwrap().push(req);
        let mut answers = self.json_answers.lock().unwrap();
        if answers.is_empty() {
            Err(ModelError::InvalidResponse("no scripted json answer".into()))
        } else {
            Ok(answers.remove(0))
        }
    }

    async fn count_tokens(
        &self,
        _model: &str,
        contents: &[Message],
    ) -> Result<Option<u64>, ModelError> {
        let mut counts = self.token_counts.lock().unwrap();
        if counts.is_empty() {
            Ok(Some(Self::approx_count(contents)))
        } else {
            Ok(counts.remove(0))
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn req() -> GenerateRequest {
        GenerateRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn always_text_streams_text_then_usage() {
        let p = ScriptedProvider::always_text("hello");
        let mut s = p.send_stream(req(), CancellationToken::new()).await.unwrap();
        let first = s.next().await.unwrap().unwrap();
        assert_eq!(first.parts[0].text.as_deref(), Some("hello"));
        let second = s.next().await.unwrap().unwrap();
        assert!(second.usage.is_some());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn scripts_are_consumed_in_order() {
        let p = ScriptedProvider::tool_then_text("c1", "list_dir", Map::new(), "done");
        assert_eq!(p.remaining_scripts(), 2);
        let _ = p.send_stream(req(), CancellationToken::new()).await.unwrap();
        assert_eq!(p.remaining_scripts(), 1);
    }

    #[tokio::test]
    async fn fail_script_errors_the_call() {
        let p = ScriptedProvider::new(vec![ScriptedCall::Fail(ModelError::Status {
            code: 500,
            message: "boom".into(),
        })]);
        let err = p
            .send_stream(req(), CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back_to_placeholder() {
        let p = ScriptedProvider::new(vec![]);
        let mut s = p.send_stream(req(), CancellationToken::new()).await.unwrap();
        let chunk = s.next().await.unwrap().unwrap();
        assert!(chunk.parts[0]
            .text
            .as_deref()
            .unwrap()
            .contains("no more scripts"));
    }

    #[tokio::test]
    async fn requests_are_captured_for_inspection() {
        let p = ScriptedProvider::always_text("x");
        let _ = p.send_stream(req(), CancellationToken::new()).await.unwrap();
        let captured = p.requests.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].model, "m");
    }

    #[tokio::test]
    async fn scripted_token_counts_pop_in_order() {
        let p = ScriptedProvider::new(vec![]).with_token_counts(vec![Some(7), None]);
        assert_eq!(p.count_tokens("m", &[]).await.unwrap(), Some(7));
        assert_eq!(p.count_tokens("m", &[]).await.unwrap(), None);
        // Exhausted: falls back to the estimate.
        let est = p.count_tokens("m", &[Message::user("12345678")]).await.unwrap();
        assert_eq!(est, Some(2));
    }

    #[tokio::test]
    async fn generate_json_pops_answers_then_errors() {
        let p = ScriptedProvider::new(vec![])
            .with_json_answers(vec![serde_json::json!({ "next_speaker": "user" })]);
        let v = p
            .generate_json(req(), serde_json::json!({}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(v["next_speaker"], "user");
        assert!(p
            .generate_json(req(), serde_json::json!({}), CancellationToken::new())
            .await
            .is_err());
    }
}
