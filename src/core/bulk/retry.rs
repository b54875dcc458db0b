//! Response classification and retry backoff
//!
//! Classification rules:
//! - 2xx is success, so is 409 (a previous attempt already landed) and 404 on
//!   a delete (already gone).
//! - 408, 410, 429, 449, 500 and 503 are retried, honouring any retry-after hint.
//! - Errors without a status code are retried.
//! - Everything else fails permanently.

use super::executor::{ExecutorError, ItemResult};
use super::operation::{ItemOperation, OperationKind};
use crate::config::BulkConfig;
use rand::Rng;
use std::time::Duration;

/// Status codes worth another attempt
pub const RETRIABLE_STATUS_CODES: [u16; 6] = [408, 410, 429, 449, 500, 503];

/// What to do with one executor result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Terminal success
    Success,
    /// Try again, optionally no sooner than the hint
    Retry { retry_after: Option<Duration> },
    /// Terminal failure
    Fail,
}

/// Classifies a status code for an operation of the given kind
pub fn classify_status(kind: OperationKind, status_code: u16) -> Disposition {
    match status_code {
        200..=299 => Disposition::Success,
        409 => Disposition::Success,
        404 if kind == OperationKind::Delete => Disposition::Success,
        code if RETRIABLE_STATUS_CODES.contains(&code) => Disposition::Retry { retry_after: None },
        _ => Disposition::Fail,
    }
}

/// Classifies one executor result
pub fn classify(kind: OperationKind, result: &ItemResult) -> Disposition {
    let (status_code, retry_after) = match result {
        Ok(response) => (response.status_code, response.retry_after),
        Err(ExecutorError::Service {
            status_code,
            retry_after,
            ..
        }) => (*status_code, *retry_after),
        Err(ExecutorError::Unexpected(_)) => return Disposition::Retry { retry_after: None },
    };

    match classify_status(kind, status_code) {
        Disposition::Retry { .. } => Disposition::Retry { retry_after },
        other => other,
    }
}

/// Outcome of asking the policy for a retry
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry budget exhausted
    GiveUp,
    /// Resubmit right away
    Immediate(ItemOperation),
    /// Resubmit after the delay
    Delayed(ItemOperation, Duration),
}

/// Retry budget and backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Highest retry count still allowed another attempt
    pub max_retry_count: u32,
    /// Linear step per retry
    pub step: Duration,
    /// Jitter ceiling per retry
    pub jitter: Duration,
    /// Cap applied to server retry-after hints
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: 20,
            step: Duration::from_millis(10),
            jitter: Duration::from_millis(990),
            max_retry_after: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Builds the policy from the `[bulk]` configuration section
    pub fn from_config(config: &BulkConfig) -> Self {
        Self {
            max_retry_count: config.max_retry_count,
            step: Duration::from_millis(config.retry_step_ms),
            jitter: Duration::from_millis(config.retry_jitter_ms),
            max_retry_after: Duration::from_millis(config.max_retry_after_ms),
        }
    }

    /// Decides how to retry a failed operation
    pub fn decide(&self, operation: &ItemOperation, retry_after: Option<Duration>) -> RetryDecision {
        let retry_count = operation.context().retry_count();
        if retry_count > self.max_retry_count {
            return RetryDecision::GiveUp;
        }

        let next = operation.for_retry();
        if retry_count == 0 && retry_after.is_none() {
            return RetryDecision::Immediate(next);
        }

        RetryDecision::Delayed(next, self.backoff(retry_count, retry_after))
    }

    /// Delay before the next attempt
    ///
    /// `max(step * n + rand(0, jitter * max(1, n)), min(retry_after, max_retry_after))`
    pub fn backoff(&self, retry_count: u32, retry_after: Option<Duration>) -> Duration {
        let step_ms = self.step.as_millis() as u64;
        let jitter_ms = self.jitter.as_millis() as u64;
        let n = u64::from(retry_count);

        let jitter_ceiling = jitter_ms.saturating_mul(n.max(1));
        let jittered = step_ms.saturating_mul(n)
            + rand::thread_rng().gen_range(0..=jitter_ceiling);

        let server_hint = retry_after
            .map(|hint| hint.min(self.max_retry_after))
            .unwrap_or(Duration::ZERO);

        Duration::from_millis(jittered).max(server_hint)
    }
}
