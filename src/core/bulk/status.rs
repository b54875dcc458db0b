//! Shared bookkeeping for one bulk write run
//!
//! [`OperationStatus`] is the only state touched concurrently by callers, the
//! response handler and `flush()`. Counters and the pending multiset sit behind
//! one mutex so that `outstanding == |pending|` holds whenever no handler is
//! mid-update; the result lists have their own locks so snapshot readers never
//! contend with the counter updates.

use super::summary::BulkWriteSummary;
use crate::domain::{BulkError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// A permanently failed write
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteFailure {
    /// Document ids covered by the failed operation
    pub ids: Vec<String>,

    /// Serialized document, or a placeholder if serialization failed
    pub document: String,

    /// Cause, if one was reported
    pub error: Option<String>,
}

/// Terminal outcome of one logical write
#[derive(Debug)]
pub enum WriteOutcome<'a> {
    /// The write landed (or was already in place)
    Success,
    /// The write failed permanently
    Failure {
        document: &'a Value,
        error: Option<String>,
    },
}

#[derive(Debug, Default)]
struct Counters {
    outstanding: u64,
    completed: u64,
    total_scheduled: u64,
    pending: HashMap<String, usize>,
}

impl Counters {
    fn pending_len(&self) -> usize {
        self.pending.values().sum()
    }
}

/// Shared record of one bulk write run
#[derive(Debug)]
pub struct OperationStatus {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    started: Instant,
    flush_requested: AtomicBool,
    counters: Mutex<Counters>,
    // request charge x 100
    request_charge: AtomicU64,
    failures: Mutex<Vec<BulkWriteFailure>>,
    good_documents: Mutex<Vec<Value>>,
    bad_documents: Mutex<Vec<Value>>,
    drained: watch::Sender<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OperationStatus {
    /// Creates the bookkeeping for a new run
    pub fn new() -> Self {
        let (drained, _) = watch::channel(false);
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            flush_requested: AtomicBool::new(false),
            counters: Mutex::new(Counters::default()),
            request_charge: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
            good_documents: Mutex::new(Vec::new()),
            bad_documents: Mutex::new(Vec::new()),
            drained,
        }
    }

    /// Process-unique identifier of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wall-clock start of this run
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Records a newly admitted logical write
    ///
    /// The flush flag is checked under the counter lock, so a concurrent
    /// [`request_flush`](Self::request_flush) either sees this write as
    /// outstanding or makes this call fail.
    ///
    /// # Errors
    ///
    /// Returns [`BulkError::IllegalState`] once a flush was requested.
    pub fn try_mark_scheduled(&self, id: &str) -> Result<()> {
        let mut counters = lock(&self.counters);
        if self.flush_requested.load(Ordering::SeqCst) {
            return Err(BulkError::IllegalState(
                "cannot schedule writes after flush() was called".to_string(),
            ));
        }
        counters.outstanding += 1;
        counters.total_scheduled += 1;
        *counters.pending.entry(id.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Records the terminal outcome of a logical write
    ///
    /// `input` is the caller's original payload; it lands in the good or bad
    /// document list depending on the outcome.
    pub fn mark_completed(&self, id: &str, input: Value, outcome: WriteOutcome<'_>) {
        match outcome {
            WriteOutcome::Success => {
                lock(&self.good_documents).push(input);
            }
            WriteOutcome::Failure { document, error } => {
                let document = serde_json::to_string(document)
                    .unwrap_or_else(|e| format!("<unserializable document {id}: {e}>"));
                lock(&self.failures).push(BulkWriteFailure {
                    ids: vec![id.to_string()],
                    document,
                    error,
                });
                lock(&self.bad_documents).push(input);
            }
        }

        let drained = {
            let mut counters = lock(&self.counters);
            match counters.pending.get_mut(id) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    counters.pending.remove(id);
                }
                None => {
                    tracing::warn!(
                        run_id = %self.run_id,
                        id = id,
                        "Completed operation was not in the pending set"
                    );
                }
            }
            counters.completed += 1;
            counters.outstanding = counters.outstanding.saturating_sub(1);
            counters.outstanding == 0 && self.flush_requested.load(Ordering::SeqCst)
        };

        if drained {
            self.signal_drained();
        }
    }

    /// Marks that the caller is waiting for the run to drain
    ///
    /// Idempotent. Signals completion right away if nothing is outstanding.
    pub fn request_flush(&self) {
        let drained = {
            let counters = lock(&self.counters);
            self.flush_requested.store(true, Ordering::SeqCst);
            counters.outstanding == 0
        };

        if drained {
            self.signal_drained();
        }
    }

    /// Whether `request_flush` has been called
    pub fn is_flush_requested(&self) -> bool {
        self.flush_requested.load(Ordering::SeqCst)
    }

    /// Wakes every `flush()` waiter
    pub fn signal_drained(&self) {
        self.drained.send_replace(true);
    }

    /// Receiver that flips to `true` once the run is drained
    pub fn subscribe_drained(&self) -> watch::Receiver<bool> {
        self.drained.subscribe()
    }

    /// Adds a request charge
    pub fn add_request_charge(&self, charge: f64) {
        if charge.is_finite() && charge > 0.0 {
            let centi = (charge * 100.0).round() as u64;
            self.request_charge.fetch_add(centi, Ordering::Relaxed);
        }
    }

    /// Total request charge of the run
    pub fn total_request_charge(&self) -> f64 {
        self.request_charge.load(Ordering::Relaxed) as f64 / 100.0
    }

    /// Logical writes not yet at a terminal outcome
    pub fn outstanding(&self) -> u64 {
        lock(&self.counters).outstanding
    }

    /// Logical writes at a terminal outcome
    pub fn completed(&self) -> u64 {
        lock(&self.counters).completed
    }

    /// Logical writes ever admitted
    pub fn total_scheduled(&self) -> u64 {
        lock(&self.counters).total_scheduled
    }

    /// Number of entries in the pending multiset
    pub fn pending_count(&self) -> usize {
        lock(&self.counters).pending_len()
    }

    /// Up to `n` pending ids
    pub fn pending_sample(&self, n: usize) -> Vec<String> {
        lock(&self.counters).pending.keys().take(n).cloned().collect()
    }

    /// Drops all pending bookkeeping
    pub fn clear_pending(&self) {
        let mut counters = lock(&self.counters);
        counters.pending.clear();
        counters.outstanding = 0;
    }

    pub fn failures(&self) -> Vec<BulkWriteFailure> {
        lock(&self.failures).clone()
    }

    pub fn good_documents(&self) -> Vec<Value> {
        lock(&self.good_documents).clone()
    }

    pub fn bad_documents(&self) -> Vec<Value> {
        lock(&self.bad_documents).clone()
    }

    /// Snapshot of the run
    pub fn summary(&self) -> BulkWriteSummary {
        let (outstanding, completed) = {
            let counters = lock(&self.counters);
            (counters.outstanding, counters.completed)
        };
        BulkWriteSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            outstanding,
            completed,
            succeeded: lock(&self.good_documents).len(),
            failed: lock(&self.failures).len(),
            request_charge: self.total_request_charge(),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for OperationStatus {
    fn default() -> Self {
        Self::new()
    }
}
