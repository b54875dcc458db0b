//! Bulk execution boundary
//!
//! The writer does not talk to the store directly. It hands micro-batches of
//! [`ItemOperation`]s to a [`BulkExecutor`], which owns routing, batching on the
//! wire and its own adaptive sizing state ([`BulkExecutionOptions`]).

use super::operation::ItemOperation;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Per-operation response from the store
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    /// HTTP-style status code
    pub status_code: u16,

    /// Request units charged for the operation
    pub request_charge: f64,

    /// Server-suggested delay before retrying
    pub retry_after: Option<Duration>,
}

impl ItemResponse {
    /// Response with the given status and no charge or retry hint
    pub fn with_status(status_code: u16) -> Self {
        Self {
            status_code,
            request_charge: 0.0,
            retry_after: None,
        }
    }

    /// Sets the request charge
    pub fn charge(mut self, request_charge: f64) -> Self {
        self.request_charge = request_charge;
        self
    }

    /// Sets the retry-after hint
    pub fn retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Per-operation failure raised by an executor
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// A store error carrying a status code
    #[error("Service error {status_code}: {message}")]
    Service {
        status_code: u16,
        request_charge: f64,
        retry_after: Option<Duration>,
        message: String,
    },

    /// Anything else (transport failures, panics in the executor, lost results)
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ExecutorError {
    /// Service error with the given status and message
    pub fn service(status_code: u16, message: impl Into<String>) -> Self {
        ExecutorError::Service {
            status_code,
            request_charge: 0.0,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Status code, if the error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ExecutorError::Service { status_code, .. } => Some(*status_code),
            ExecutorError::Unexpected(_) => None,
        }
    }

    /// Server-suggested retry delay, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ExecutorError::Service { retry_after, .. } => *retry_after,
            ExecutorError::Unexpected(_) => None,
        }
    }

    /// Request charge reported with the error
    pub fn request_charge(&self) -> f64 {
        match self {
            ExecutorError::Service { request_charge, .. } => *request_charge,
            ExecutorError::Unexpected(_) => 0.0,
        }
    }
}

/// Result of one operation
pub type ItemResult = std::result::Result<ItemResponse, ExecutorError>;

/// Adaptive batching state owned by the executor
///
/// The writer only reads the current micro-batch size to decide how many
/// queued operations to hand over per call; the executor adjusts it.
#[derive(Debug)]
pub struct BulkExecutionOptions {
    micro_batch_size: AtomicUsize,
    max_micro_batch_size: usize,
}

impl BulkExecutionOptions {
    /// Creates options starting at `initial` and never exceeding `max`
    pub fn new(initial: usize, max: usize) -> Self {
        let max = max.max(1);
        Self {
            micro_batch_size: AtomicUsize::new(initial.clamp(1, max)),
            max_micro_batch_size: max,
        }
    }

    /// Current micro-batch size
    pub fn micro_batch_size(&self) -> usize {
        self.micro_batch_size.load(Ordering::Relaxed)
    }

    /// Upper bound for the micro-batch size
    pub fn max_micro_batch_size(&self) -> usize {
        self.max_micro_batch_size
    }

    /// Halves the micro-batch size (not below 1)
    pub fn shrink(&self) {
        let _ = self
            .micro_batch_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |size| {
                Some((size / 2).max(1))
            });
    }

    /// Grows the micro-batch size by one (not above the maximum)
    pub fn grow(&self) {
        let max = self.max_micro_batch_size;
        let _ = self
            .micro_batch_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |size| {
                Some((size + 1).min(max))
            });
    }
}

impl Default for BulkExecutionOptions {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// External bulk-execution service
///
/// Implementations must return exactly one result per submitted operation, in
/// submission order. Missing results are treated by the writer as unexpected
/// errors and retried.
#[async_trait]
pub trait BulkExecutor: Send + Sync {
    /// Executes a micro-batch of operations
    async fn execute(
        &self,
        operations: &[ItemOperation],
        options: &BulkExecutionOptions,
    ) -> Vec<ItemResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_clamp_initial_size() {
        let options = BulkExecutionOptions::new(500, 100);
        assert_eq!(options.micro_batch_size(), 100);

        let options = BulkExecutionOptions::new(0, 100);
        assert_eq!(options.micro_batch_size(), 1);
    }

    #[test]
    fn test_options_shrink_and_grow() {
        let options = BulkExecutionOptions::new(8, 9);
        options.shrink();
        assert_eq!(options.micro_batch_size(), 4);
        options.shrink();
        options.shrink();
        options.shrink();
        assert_eq!(options.micro_batch_size(), 1);

        for _ in 0..20 {
            options.grow();
        }
        assert_eq!(options.micro_batch_size(), 9);
    }

    #[test]
    fn test_executor_error_accessors() {
        let err = ExecutorError::Service {
            status_code: 429,
            request_charge: 1.5,
            retry_after: Some(Duration::from_millis(200)),
            message: "Request rate is large".to_string(),
        };
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_millis(200)));
        assert_eq!(err.request_charge(), 1.5);

        let err = ExecutorError::Unexpected("connection reset".to_string());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.retry_after(), None);
    }
}
