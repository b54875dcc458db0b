//! Core logic for bulkwriter.
//!
//! # Modules
//!
//! - [`bulk`] - Bulk write orchestration: admission, retries and flush
//!
//! # Example
//!
//! ```rust,no_run
//! use bulkwriter::adapters::DryRunExecutor;
//! use bulkwriter::config::BulkConfig;
//! use bulkwriter::core::bulk::{BulkWriter, ItemOperation, OperationContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let writer = BulkWriter::new(Arc::new(DryRunExecutor::default()), &BulkConfig::default());
//!
//! for i in 0..100 {
//!     let id = format!("doc-{i}");
//!     let doc = json!({"id": id, "pk": "tenant-a"});
//!     let context = OperationContext::new(id, "nightly-import")?;
//!     writer
//!         .schedule_write(ItemOperation::upsert("tenant-a", doc.clone(), context), doc)
//!         .await?;
//! }
//!
//! let written = writer.flush().await;
//! println!("Written: {}", written.len());
//! println!("Failed: {}", writer.failures().len());
//! # Ok(())
//! # }
//! ```

pub mod bulk;
