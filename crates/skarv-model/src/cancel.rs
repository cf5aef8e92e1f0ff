// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cooperative cancellation.
//!
//! One token governs one user turn.  Everything that can suspend — model
//! streaming, confirmation prompts, tool execution, the editor subprocess —
//! takes a clone and observes it at its next await point.  Re-exported here
//! so downstream crates name a single canonical type.

pub use tokio_util::sync::CancellationToken;
