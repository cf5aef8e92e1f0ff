// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use crate::{
    cancel::CancellationToken,
    error::ModelError,
    events::RawChunk,
    types::{GenerateRequest, Message},
};

pub type RawStream = Pin<Box<dyn Stream<Item = Result<RawChunk, ModelError>> + Send>>;

/// Contract every model backend implements.  Transport, authentication, and
/// wire format live behind this trait; the runtime only sees typed chunks.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Backend name for status display and logs.
    fn name(&self) -> &str;

    /// Start a streaming completion.  Must stop promptly once `cancel` fires;
    /// the stream may end early without a usage chunk in that case.
    async fn send_stream(
        &self,
        req: GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<RawStream, ModelError>;

    /// One-shot structured generation against `schema` (a JSON Schema).
    /// Used for auxiliary decisions, not conversation turns.
    async fn generate_json(
        &self,
        req: GenerateRequest,
        schema: Value,
        cancel: CancellationToken,
    ) -> Result<Value, ModelError>;

    /// Count the tokens `contents` would occupy for `model`.
    /// `Ok(None)` means the backend cannot count for this model.
    async fn count_tokens(
        &self,
        model: &str,
        contents: &[Message],
    ) -> Result<Option<u64>, ModelError>;

    /// Embed a batch of texts.  Optional capability.
    async fn embed(&self, _model: &str, _texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Err(ModelError::InvalidResponse(
            "backend does not support embeddings".into(),
        ))
    }
}
