// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Fixed-interval retry logic for kubectl invocations.
//!
//! Every cluster operation is retried identically: run it, and on failure log
//! the operation's retry message, wait a fixed interval, and try again until a
//! deadline passes. There is no backoff growth, no jitter, and no distinction
//! between error classes.

use crate::constants::{DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RETRY_TIMEOUT_SECS};
use crate::label_errors::LabelError;
use crate::metrics::record_command_retry;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Bounded retry policy: total deadline plus a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time to keep retrying before giving up
    pub timeout: Duration,
    /// Pause between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for RetryPolicy {
    /// Retry every second for up to three minutes.
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_RETRY_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        )
    }
}

/// Retry an operation until it succeeds or the policy's deadline passes.
///
/// The operation always runs at least once. After each failure the retry
/// message is logged and the call sleeps for `policy.interval`; if the
/// deadline has passed by then, the retry message is returned as a
/// [`LabelError::NodeLabel`]. A failing operation therefore gives up no
/// earlier than `policy.timeout` and no later than one interval (plus the
/// last attempt's own runtime) after it.
///
/// # Arguments
///
/// * `policy` - Deadline and interval to apply
/// * `operation_name` - Short name for logs and metrics (e.g. "set-label")
/// * `retry_message` - Human-readable message logged on each failure and
///   carried by the final error
/// * `operation` - Async function performing one attempt
///
/// # Errors
///
/// Returns [`LabelError::NodeLabel`] once the deadline has passed.
pub async fn retry_command<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    retry_message: &str,
    mut operation: F,
) -> Result<T, LabelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "kubectl call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    "kubectl call failed"
                );
            }
        }

        info!(operation = operation_name, attempt = attempt, "{retry_message}");
        record_command_retry(operation_name);
        tokio::time::sleep(policy.interval).await;

        if start_time.elapsed() >= policy.timeout {
            error!(
                operation = operation_name,
                attempt = attempt,
                elapsed = ?start_time.elapsed(),
                "Retry deadline exceeded, giving up"
            );
            return Err(LabelError::node_label(retry_message));
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
