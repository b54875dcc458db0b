//! Executor that never leaves the process
//!
//! Every operation succeeds with the status a real container would return.
//! Used by `--dry-run` and in tests.

use crate::core::bulk::{
    BulkExecutionOptions, BulkExecutor, ItemOperation, ItemResponse, ItemResult, OperationKind,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accepts every operation without sending it anywhere
#[derive(Debug)]
pub struct DryRunExecutor {
    request_charge: f64,
    executed: AtomicU64,
}

impl Default for DryRunExecutor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl DryRunExecutor {
    /// Reports `request_charge` for every operation
    pub fn new(request_charge: f64) -> Self {
        Self {
            request_charge,
            executed: AtomicU64::new(0),
        }
    }

    /// Operations seen so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BulkExecutor for DryRunExecutor {
    async fn execute(
        &self,
        operations: &[ItemOperation],
        _options: &BulkExecutionOptions,
    ) -> Vec<ItemResult> {
        self.executed
            .fetch_add(operations.len() as u64, Ordering::Relaxed);
        tracing::debug!(count = operations.len(), "Dry run: skipping micro-batch");

        operations
            .iter()
            .map(|operation| {
                let status = match operation.kind() {
                    OperationKind::Create => 201,
                    OperationKind::Upsert => 200,
                    OperationKind::Delete => 204,
                };
                Ok(ItemResponse::with_status(status).charge(self.request_charge))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bulk::OperationContext;
    use serde_json::json;

    fn op(kind: OperationKind, id: &str) -> ItemOperation {
        ItemOperation::new(
            kind,
            "pk",
            json!({"id": id}),
            OperationContext::new(id, "dry").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_dry_run_returns_one_result_per_operation() {
        let executor = DryRunExecutor::new(2.5);
        let ops = vec![
            op(OperationKind::Create, "a"),
            op(OperationKind::Upsert, "b"),
            op(OperationKind::Delete, "c"),
        ];

        let results = executor
            .execute(&ops, &BulkExecutionOptions::default())
            .await;

        let statuses: Vec<u16> = results
            .iter()
            .map(|r| r.as_ref().unwrap().status_code)
            .collect();
        assert_eq!(statuses, vec![201, 200, 204]);
        assert!(results
            .iter()
            .all(|r| (r.as_ref().unwrap().request_charge - 2.5).abs() < f64::EPSILON));
        assert_eq!(executor.executed(), 3);
    }
}
