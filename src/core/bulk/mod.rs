//! Bulk write orchestration
//!
//! This module turns a stream of item writes into bounded, retried,
//! micro-batched calls against a [`BulkExecutor`]:
//!
//! - [`OperationContext`] - identity and retry counter of one write
//! - [`ItemOperation`] - a create, upsert or delete of one document
//! - [`OperationStatus`] - shared counters, pending set and result lists
//! - [`RetryPolicy`] - response classification and backoff
//! - [`BulkWriter`] - admission control, ingestion pipeline and `flush()`
//!
//! Per-item failures never surface as errors. `flush()` returns the payloads
//! that were written; permanent failures are read back through
//! [`BulkWriter::failures`].

pub mod context;
pub mod executor;
pub mod operation;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod summary;
pub mod writer;

pub use context::OperationContext;
pub use executor::{BulkExecutionOptions, BulkExecutor, ExecutorError, ItemResponse, ItemResult};
pub use operation::{ItemOperation, OperationKind, PartitionKeyValue};
pub use retry::{classify, classify_status, Disposition, RetryDecision, RetryPolicy};
pub use status::{BulkWriteFailure, OperationStatus, WriteOutcome};
pub use summary::BulkWriteSummary;
pub use writer::{BulkWriter, WriterSettings};
