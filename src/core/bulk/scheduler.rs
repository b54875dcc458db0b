//! Delayed resubmission of retried operations
//!
//! One task owns a deadline-ordered heap of pending retries and forwards each
//! item into the sink channel once its delay has passed. Keeping the timers
//! here means the response handler never sleeps.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

struct Delayed<T> {
    due: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Delayed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Delayed<T> {}

impl<T> PartialOrd for Delayed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Delayed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Handle to the retry scheduler task
pub struct RetryScheduler<T> {
    tx: mpsc::UnboundedSender<(T, Duration)>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> RetryScheduler<T> {
    /// Spawns the scheduler; due items are sent into `sink`
    pub fn spawn(sink: mpsc::UnboundedSender<T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, sink));
        Self { tx, handle }
    }

    /// Queues `item` for delivery after `delay`
    ///
    /// Hands the item back if the scheduler is gone.
    pub fn schedule(&self, item: T, delay: Duration) -> std::result::Result<(), T> {
        self.tx.send((item, delay)).map_err(|e| e.0 .0)
    }

    /// Stops the scheduler, dropping queued retries
    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn run<T>(mut rx: mpsc::UnboundedReceiver<(T, Duration)>, sink: mpsc::UnboundedSender<T>) {
    let mut heap: BinaryHeap<Reverse<Delayed<T>>> = BinaryHeap::new();
    let mut seq = 0u64;
    let mut closed = false;

    loop {
        let next_due = heap.peek().map(|Reverse(entry)| entry.due);
        if closed && next_due.is_none() {
            break;
        }

        tokio::select! {
            msg = rx.recv(), if !closed => match msg {
                Some((item, delay)) => {
                    seq += 1;
                    heap.push(Reverse(Delayed {
                        due: Instant::now() + delay,
                        seq,
                        item,
                    }));
                }
                None => closed = true,
            },
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                while heap.peek().is_some_and(|Reverse(entry)| entry.due <= now) {
                    if let Some(Reverse(entry)) = heap.pop() {
                        if sink.send(entry.item).is_err() {
                            tracing::debug!("Retry sink closed, dropping scheduled retries");
                            return;
                        }
                    }
                }
            }
        }
    }
}
