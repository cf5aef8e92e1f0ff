// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Exponential backoff for transient model failures.
//!
//! Only 429 and 5xx (and transport resets) are retried.  Cancellation is
//! never retried: the sleep between attempts races the token, so a cancel
//! observed mid-backoff aborts immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{cancel::CancellationToken, error::ModelError};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first try included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or exhausts the policy.
/// `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ModelError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(attempt, error = %err, "transient model error; backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ModelError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = delay.saturating_mul(2);
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop returns on the final attempt")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn rate_limited() -> ModelError {
        ModelError::Status {
            code: 429,
            message: "slow down".into(),
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let out = retry_with_backoff(fast_policy(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ModelError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let out = retry_with_backoff(fast_policy(), &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(rate_limited())
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(fast_policy(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(ModelError::Status {
                    code: 400,
                    message: "bad".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let err = retry_with_backoff(fast_policy(), &CancellationToken::new(), |_| async {
            Err::<(), _>(rate_limited())
        })
        .await
        .unwrap_err();
        assert!(err.is_rate_limit());
    }

    #[tokio::test]
    async fn cancellation_is_never_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(fast_policy(), &CancellationToken::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ModelError::Cancelled) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_the_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let err = retry_with_backoff(fast_policy(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ModelError>(1) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ModelError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
