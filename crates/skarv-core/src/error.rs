// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use skarv_model::ModelError;

/// Scheduler-level failures.
///
/// Tool-level problems (unknown tool, invalid params, execution errors,
/// declined confirmations) never surface here — they become terminal call
/// states whose responses the model sees.  Auth errors bubble to the caller;
/// other model errors terminate the turn but preserve the session.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A new batch was scheduled while a prior call was still executing or
    /// awaiting approval.
    #[error("cannot schedule: a tool-call batch is still in flight")]
    BatchInFlight,

    /// Two calls in one session share a call id — a programmer bug.
    #[error("duplicate tool call id: {0}")]
    DuplicateCallId(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Invariant violation; log and terminate the turn.
    #[error("internal scheduler error: {0}")]
    Internal(String),
}
