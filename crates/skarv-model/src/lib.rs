// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `skarv-model` — conversation data model and model-backend contract.
//!
//! Defines the part-structured [`Message`] type shared by the whole runtime,
//! the raw streaming events a backend emits ([`RawChunk`]), the
//! [`ModelProvider`] trait every backend implements, retry/backoff helpers,
//! and a scripted mock provider for deterministic tests.

pub mod cancel;
pub mod catalog;
mod error;
mod events;
pub mod mock;
mod provider;
pub mod retry;
mod types;

pub use cancel::CancellationToken;
pub use error::ModelError;
pub use events::{RawChunk, RawPart};
pub use mock::{ScriptedCall, ScriptedProvider};
pub use provider::{ModelProvider, RawStream};
pub use types::{
    FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest, Message, Part, Role,
    UsageMetadata,
};
