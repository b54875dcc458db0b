//! Bulk writer: admission, ingestion pipeline, retries and flush
//!
//! Data flow:
//!
//! ```text
//! schedule_write ──► input channel ──► ingestion task ──► executor (micro-batches)
//!        ▲                 ▲                                   │
//!        │                 │                                   ▼
//!   admission        retry scheduler ◄──── response task ◄── results
//!   semaphore       (delayed retries)          │
//!                                              ▼
//!                                       OperationStatus ──► flush()
//! ```
//!
//! Every logical write holds one admission permit from `schedule_write` until
//! its terminal outcome. Retries carry the same permit, so a retry never
//! competes with fresh writes for admission.

use super::executor::{BulkExecutionOptions, BulkExecutor, ExecutorError, ItemResult};
use super::operation::ItemOperation;
use super::retry::{classify, Disposition, RetryDecision, RetryPolicy};
use super::scheduler::RetryScheduler;
use super::status::{BulkWriteFailure, OperationStatus, WriteOutcome};
use super::summary::BulkWriteSummary;
use crate::config::BulkConfig;
use crate::domain::{BulkError, Result};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Number of pending ids included in flush progress logs
const PROGRESS_SAMPLE_SIZE: usize = 3;

/// The caller's payload and admission permit, carried across retries
struct Ticket {
    input: Value,
    permit: OwnedSemaphorePermit,
}

struct InFlight {
    operation: ItemOperation,
    ticket: Ticket,
}

struct ResponseBatch {
    operations: Vec<ItemOperation>,
    tickets: Vec<Ticket>,
    results: Vec<ItemResult>,
    failure: Option<String>,
}

/// Tunables for one writer
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Upper bound on admitted but unresolved writes
    pub max_pending_operations: usize,
    /// How long one admission wait lasts before logging and waiting again
    pub permit_wait: Duration,
    /// How often a waiting `flush()` logs progress
    pub progress_interval: Duration,
    /// Executor calls allowed in flight at once
    pub max_concurrent_batches: usize,
    /// Retry budget and backoff
    pub retry: RetryPolicy,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self::from_config(&BulkConfig::default())
    }
}

impl WriterSettings {
    /// Builds settings from the `[bulk]` configuration section
    pub fn from_config(config: &BulkConfig) -> Self {
        Self {
            max_pending_operations: config.max_pending_operations.max(1),
            permit_wait: Duration::from_millis(config.permit_wait_ms.max(1)),
            progress_interval: Duration::from_secs(config.progress_log_interval_seconds.max(1)),
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// State shared between the writer handle and its background tasks
struct Shared {
    status: Arc<OperationStatus>,
    input_tx: mpsc::UnboundedSender<InFlight>,
    closed: AtomicBool,
    policy: RetryPolicy,
}

struct Pipeline {
    ingest: JoinHandle<()>,
    responses: JoinHandle<()>,
    retries: Arc<RetryScheduler<InFlight>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordinates one bulk ingestion run against a [`BulkExecutor`]
///
/// # Example
///
/// ```rust,no_run
/// use bulkwriter::adapters::DryRunExecutor;
/// use bulkwriter::config::BulkConfig;
/// use bulkwriter::core::bulk::{BulkWriter, ItemOperation, OperationContext};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> bulkwriter::domain::Result<()> {
/// let writer = BulkWriter::new(Arc::new(DryRunExecutor::default()), &BulkConfig::default());
///
/// let doc = json!({"id": "doc1", "pk": "tenant-a"});
/// let context = OperationContext::new("doc1", "import-2024-06")?;
/// writer
///     .schedule_write(ItemOperation::create("tenant-a", doc.clone(), context), doc)
///     .await?;
///
/// let written = writer.flush().await;
/// assert_eq!(written.len(), 1);
/// assert!(writer.failures().is_empty());
/// # Ok(())
/// # }
/// ```
pub struct BulkWriter {
    shared: Arc<Shared>,
    executor: Arc<dyn BulkExecutor>,
    options: Arc<BulkExecutionOptions>,
    admission: Arc<Semaphore>,
    settings: WriterSettings,
    started: AtomicBool,
    input_rx: Mutex<Option<mpsc::UnboundedReceiver<InFlight>>>,
    pipeline: Mutex<Option<Pipeline>>,
}

impl BulkWriter {
    /// Creates a writer using the `[bulk]` configuration section
    pub fn new(executor: Arc<dyn BulkExecutor>, config: &BulkConfig) -> Self {
        let options = BulkExecutionOptions::new(
            config.initial_micro_batch_size,
            config.max_micro_batch_size,
        );
        Self::with_settings(executor, WriterSettings::from_config(config), options)
    }

    /// Creates a writer with explicit settings and executor options
    pub fn with_settings(
        executor: Arc<dyn BulkExecutor>,
        settings: WriterSettings,
        options: BulkExecutionOptions,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            status: Arc::new(OperationStatus::new()),
            input_tx,
            closed: AtomicBool::new(false),
            policy: settings.retry.clone(),
        });

        Self {
            shared,
            executor,
            options: Arc::new(options),
            admission: Arc::new(Semaphore::new(settings.max_pending_operations)),
            settings,
            started: AtomicBool::new(false),
            input_rx: Mutex::new(Some(input_rx)),
            pipeline: Mutex::new(None),
        }
    }

    /// Admits one write into the pipeline
    ///
    /// `payload` is the caller's original document; it is handed back by
    /// [`flush`](Self::flush) if the write succeeds. Waits while the admission
    /// limit is reached, logging every `permit_wait`.
    ///
    /// # Errors
    ///
    /// - [`BulkError::IllegalState`] if `flush()` was already called
    /// - [`BulkError::Closed`] if the writer was closed
    pub async fn schedule_write(&self, operation: ItemOperation, payload: Value) -> Result<()> {
        self.ensure_accepting()?;

        let permit = self.acquire_permit(operation.id()).await?;
        self.ensure_accepting()?;
        self.ensure_started();

        let id = operation.id().to_string();
        self.shared.status.try_mark_scheduled(&id)?;

        let item = InFlight {
            operation,
            ticket: Ticket {
                input: payload,
                permit,
            },
        };

        if let Err(rejected) = self.shared.input_tx.send(item) {
            let InFlight { operation, ticket } = rejected.0;
            self.shared.complete(
                &operation,
                ticket,
                WriteOutcome::Failure {
                    document: operation.document(),
                    error: Some("ingestion pipeline is not running".to_string()),
                },
            );
            return Err(BulkError::Closed);
        }

        tracing::trace!(
            run_id = %self.shared.status.run_id(),
            id = %id,
            "Scheduled write"
        );
        Ok(())
    }

    /// Waits until every scheduled write reaches a terminal outcome
    ///
    /// After this call no new writes are accepted. Returns the payloads of the
    /// writes that succeeded; permanent failures are available through
    /// [`failures`](Self::failures).
    pub async fn flush(&self) -> Vec<Value> {
        let status = &self.shared.status;
        status.request_flush();

        if !self.started.load(Ordering::Acquire) || status.outstanding() == 0 {
            return status.good_documents();
        }

        let mut drained = status.subscribe_drained();
        loop {
            let done = tokio::time::timeout(
                self.settings.progress_interval,
                drained.wait_for(|done| *done),
            )
            .await
            .is_ok();
            if done {
                break;
            }

            crate::log_flush_progress!(
                status.run_id(),
                status.outstanding(),
                status.pending_sample(PROGRESS_SAMPLE_SIZE)
            );
        }

        status.summary().log();
        status.good_documents()
    }

    /// Stops the writer
    ///
    /// Best effort: callers waiting for admission fail with
    /// [`BulkError::Closed`], background tasks are aborted, pending bookkeeping
    /// is cleared and `flush()` waiters are released. Writes already handed to
    /// the store are not recalled.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.admission.close();

        if let Some(pipeline) = lock(&self.pipeline).take() {
            pipeline.ingest.abort();
            pipeline.responses.abort();
            pipeline.retries.abort();
        }
        lock(&self.input_rx).take();

        let status = &self.shared.status;
        let abandoned = status.outstanding();
        status.clear_pending();
        status.signal_drained();

        tracing::info!(
            run_id = %status.run_id(),
            abandoned = abandoned,
            "Bulk writer closed"
        );
    }

    /// Whether `close()` was called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// The run's bookkeeping
    pub fn status(&self) -> &Arc<OperationStatus> {
        &self.shared.status
    }

    /// Permanent failures recorded so far
    pub fn failures(&self) -> Vec<BulkWriteFailure> {
        self.shared.status.failures()
    }

    /// Snapshot of the run
    pub fn summary(&self) -> BulkWriteSummary {
        self.shared.status.summary()
    }

    /// Executor-owned batching state
    pub fn options(&self) -> &Arc<BulkExecutionOptions> {
        &self.options
    }

    /// Admission permits currently free
    pub fn available_permits(&self) -> usize {
        self.admission.available_permits()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(BulkError::Closed);
        }
        if self.shared.status.is_flush_requested() {
            return Err(BulkError::IllegalState(
                "cannot schedule writes after flush() was called".to_string(),
            ));
        }
        Ok(())
    }

    async fn acquire_permit(&self, id: &str) -> Result<OwnedSemaphorePermit> {
        let mut waits = 0u32;
        loop {
            match tokio::time::timeout(
                self.settings.permit_wait,
                self.admission.clone().acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => return Ok(permit),
                Ok(Err(_)) => return Err(BulkError::Closed),
                Err(_) => {
                    waits += 1;
                    tracing::debug!(
                        run_id = %self.shared.status.run_id(),
                        id = id,
                        waits = waits,
                        outstanding = self.shared.status.outstanding(),
                        "Waiting for admission permit"
                    );
                }
            }
        }
    }

    /// Starts the pipeline on first use; later calls are no-ops
    fn ensure_started(&self) {
        if self.started.load(Ordering::Acquire) {
            return;
        }

        let mut pipeline = lock(&self.pipeline);
        if pipeline.is_some() || self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(input_rx) = lock(&self.input_rx).take() else {
            return;
        };

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let retries = Arc::new(RetryScheduler::spawn(self.shared.input_tx.clone()));

        let ingest = supervise(
            "ingestion",
            self.shared.clone(),
            ingest(
                input_rx,
                self.executor.clone(),
                self.options.clone(),
                response_tx,
                self.settings.max_concurrent_batches,
            ),
        );
        let responses = supervise(
            "response",
            self.shared.clone(),
            process_responses(response_rx, self.shared.clone(), retries.clone()),
        );

        *pipeline = Some(Pipeline {
            ingest,
            responses,
            retries,
        });
        self.started.store(true, Ordering::Release);

        tracing::info!(
            run_id = %self.shared.status.run_id(),
            max_pending_operations = self.settings.max_pending_operations,
            micro_batch_size = self.options.micro_batch_size(),
            max_concurrent_batches = self.settings.max_concurrent_batches,
            "Started bulk ingestion pipeline"
        );
    }
}

impl Drop for BulkWriter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs a pipeline task; if it stops while the writer is open, flush waiters
/// are released so they do not hang on a dead pipeline.
fn supervise<F>(name: &'static str, shared: Arc<Shared>, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(task).catch_unwind().await;
        if shared.closed.load(Ordering::SeqCst) {
            return;
        }
        match outcome {
            Ok(()) => tracing::error!(
                run_id = %shared.status.run_id(),
                task = name,
                "Bulk pipeline task stopped unexpectedly"
            ),
            Err(_) => tracing::error!(
                run_id = %shared.status.run_id(),
                task = name,
                "Bulk pipeline task panicked"
            ),
        }
        shared.status.signal_drained();
    })
}

/// Drains the input channel in micro-batches and dispatches executor calls
async fn ingest(
    mut input_rx: mpsc::UnboundedReceiver<InFlight>,
    executor: Arc<dyn BulkExecutor>,
    options: Arc<BulkExecutionOptions>,
    response_tx: mpsc::UnboundedSender<ResponseBatch>,
    max_concurrent_batches: usize,
) {
    let slots = Arc::new(Semaphore::new(max_concurrent_batches));
    let mut calls = JoinSet::new();
    let mut buffer = Vec::new();

    loop {
        let limit = options.micro_batch_size().max(1);
        if input_rx.recv_many(&mut buffer, limit).await == 0 {
            break;
        }

        let Ok(slot) = slots.clone().acquire_owned().await else {
            break;
        };
        while calls.try_join_next().is_some() {}

        let (operations, tickets): (Vec<_>, Vec<_>) = std::mem::take(&mut buffer)
            .into_iter()
            .map(|item| (item.operation, item.ticket))
            .unzip();

        let executor = executor.clone();
        let options = options.clone();
        let response_tx = response_tx.clone();
        calls.spawn(async move {
            let operations = Arc::new(operations);
            let call = {
                let operations = operations.clone();
                tokio::spawn(async move { executor.execute(&operations, &options).await })
            };
            let (results, failure) = match call.await {
                Ok(results) => (results, None),
                Err(e) => (Vec::new(), Some(format!("executor call failed: {e}"))),
            };
            drop(slot);

            let operations = Arc::try_unwrap(operations).unwrap_or_else(|shared| (*shared).clone());
            let _ = response_tx.send(ResponseBatch {
                operations,
                tickets,
                results,
                failure,
            });
        });
    }
}

/// Applies executor results to the run's bookkeeping
async fn process_responses(
    mut response_rx: mpsc::UnboundedReceiver<ResponseBatch>,
    shared: Arc<Shared>,
    retries: Arc<RetryScheduler<InFlight>>,
) {
    while let Some(batch) = response_rx.recv().await {
        let ResponseBatch {
            operations,
            tickets,
            results,
            failure,
        } = batch;

        if results.len() != operations.len() {
            tracing::warn!(
                run_id = %shared.status.run_id(),
                expected = operations.len(),
                received = results.len(),
                "Executor returned a mismatched number of results"
            );
        }

        let mut results = results.into_iter();
        for (operation, ticket) in operations.into_iter().zip(tickets) {
            let result = results.next().unwrap_or_else(|| {
                Err(ExecutorError::Unexpected(
                    failure
                        .clone()
                        .unwrap_or_else(|| "executor returned no result".to_string()),
                ))
            });
            shared.handle_result(operation, ticket, result, &retries);
        }
    }
}

impl Shared {
    fn handle_result(
        &self,
        operation: ItemOperation,
        ticket: Ticket,
        result: ItemResult,
        retries: &RetryScheduler<InFlight>,
    ) {
        let charge = match &result {
            Ok(response) => response.request_charge,
            Err(e) => e.request_charge(),
        };
        self.status.add_request_charge(charge);

        match classify(operation.kind(), &result) {
            Disposition::Success => {
                tracing::trace!(
                    id = operation.id(),
                    retry_count = operation.context().retry_count(),
                    status_code = ?result.as_ref().map(|r| r.status_code).ok(),
                    "Write succeeded"
                );
                self.complete(&operation, ticket, WriteOutcome::Success);
            }
            Disposition::Fail => {
                let cause = describe(&result);
                tracing::warn!(
                    run_id = %self.status.run_id(),
                    id = operation.id(),
                    kind = %operation.kind(),
                    error = %cause,
                    "Write failed permanently"
                );
                self.complete(
                    &operation,
                    ticket,
                    WriteOutcome::Failure {
                        document: operation.document(),
                        error: Some(cause),
                    },
                );
            }
            Disposition::Retry { retry_after } => {
                if let Err(ExecutorError::Unexpected(message)) = &result {
                    tracing::error!(
                        run_id = %self.status.run_id(),
                        id = operation.id(),
                        error = %message,
                        "Unexpected error during bulk write, retrying"
                    );
                }
                self.schedule_retry(operation, ticket, describe(&result), retry_after, retries);
            }
        }
    }

    fn schedule_retry(
        &self,
        operation: ItemOperation,
        ticket: Ticket,
        cause: String,
        retry_after: Option<Duration>,
        retries: &RetryScheduler<InFlight>,
    ) {
        let retry_count = operation.context().retry_count();
        match self.policy.decide(&operation, retry_after) {
            RetryDecision::GiveUp => {
                tracing::warn!(
                    run_id = %self.status.run_id(),
                    id = operation.id(),
                    retry_count = retry_count,
                    error = %cause,
                    "Retry limit exceeded"
                );
                self.complete(
                    &operation,
                    ticket,
                    WriteOutcome::Failure {
                        document: operation.document(),
                        error: Some(format!(
                            "retry limit exceeded after {retry_count} retries: {cause}"
                        )),
                    },
                );
            }
            RetryDecision::Immediate(next) => {
                crate::log_retry_attempt!(next.id(), next.context().retry_count(), 0u64, &cause);
                if let Err(rejected) = self.input_tx.send(InFlight {
                    operation: next,
                    ticket,
                }) {
                    self.abandon(rejected.0);
                }
            }
            RetryDecision::Delayed(next, delay) => {
                crate::log_retry_attempt!(
                    next.id(),
                    next.context().retry_count(),
                    delay.as_millis() as u64,
                    &cause
                );
                let item = InFlight {
                    operation: next,
                    ticket,
                };
                if let Err(item) = retries.schedule(item, delay) {
                    self.abandon(item);
                }
            }
        }
    }

    fn abandon(&self, item: InFlight) {
        let InFlight { operation, ticket } = item;
        self.complete(
            &operation,
            ticket,
            WriteOutcome::Failure {
                document: operation.document(),
                error: Some("writer closed before retry".to_string()),
            },
        );
    }

    fn complete(&self, operation: &ItemOperation, ticket: Ticket, outcome: WriteOutcome<'_>) {
        let Ticket { input, permit } = ticket;
        drop(permit);
        self.status.mark_completed(operation.id(), input, outcome);
    }
}

fn describe(result: &ItemResult) -> String {
    match result {
        Ok(response) => format!("unexpected status code {}", response.status_code),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bulk::context::OperationContext;
    use crate::core::bulk::executor::ItemResponse;
    use async_trait::async_trait;
    use serde_json::json;

    struct AlwaysOk;

    #[async_trait]
    impl BulkExecutor for AlwaysOk {
        async fn execute(
            &self,
            operations: &[ItemOperation],
            _options: &BulkExecutionOptions,
        ) -> Vec<ItemResult> {
            operations
                .iter()
                .map(|_| Ok(ItemResponse::with_status(201).charge(1.0)))
                .collect()
        }
    }

    fn create(id: &str) -> (ItemOperation, Value) {
        let doc = json!({"id": id, "pk": "p"});
        let op = ItemOperation::create("p", doc.clone(), OperationContext::new(id, "t").unwrap());
        (op, doc)
    }

    #[tokio::test]
    async fn test_flush_without_writes_returns_immediately() {
        let writer = BulkWriter::new(Arc::new(AlwaysOk), &BulkConfig::default());
        assert!(writer.flush().await.is_empty());
        assert!(!writer.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pipeline_started_once() {
        let writer = BulkWriter::new(Arc::new(AlwaysOk), &BulkConfig::default());
        for i in 0..10 {
            let (op, doc) = create(&format!("d{i}"));
            writer.schedule_write(op, doc).await.unwrap();
        }
        assert!(writer.started.load(Ordering::SeqCst));
        assert!(lock(&writer.input_rx).is_none());

        let written = writer.flush().await;
        assert_eq!(written.len(), 10);
        assert_eq!(writer.summary().request_charge, 10.0);
    }

    #[tokio::test]
    async fn test_permits_released_after_completion() {
        let config = BulkConfig {
            max_pending_operations: 4,
            ..BulkConfig::default()
        };
        let writer = BulkWriter::new(Arc::new(AlwaysOk), &config);
        for i in 0..12 {
            let (op, doc) = create(&format!("d{i}"));
            writer.schedule_write(op, doc).await.unwrap();
        }
        writer.flush().await;
        assert_eq!(writer.available_permits(), 4);
    }

    #[tokio::test]
    async fn test_close_rejects_new_writes() {
        let writer = BulkWriter::new(Arc::new(AlwaysOk), &BulkConfig::default());
        writer.close();
        writer.close();
        let (op, doc) = create("late");
        assert!(matches!(
            writer.schedule_write(op, doc).await,
            Err(BulkError::Closed)
        ));
        assert!(writer.is_closed());
    }
}
