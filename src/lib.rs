// Bulkwriter - Bulk document writer for Azure Cosmos DB
// Copyright (c) 2025 Bulkwriter Contributors
// Licensed under the MIT License

//! # Bulkwriter - Bulk document writer for Azure Cosmos DB
//!
//! Bulkwriter streams large numbers of item writes (create, upsert, delete)
//! into a Cosmos DB container with bounded memory, automatic retries and a
//! flush barrier that reports which documents landed.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - The bulk write pipeline (admission, batching, retry, bookkeeping)
//! - [`adapters`] - Executors that talk to the store (Cosmos DB, dry run)
//! - [`domain`] - Error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bulkwriter::adapters::DryRunExecutor;
//! use bulkwriter::config::BulkConfig;
//! use bulkwriter::core::bulk::{BulkWriter, ItemOperation, OperationContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let writer = BulkWriter::new(Arc::new(DryRunExecutor::default()), &BulkConfig::default());
//!
//!     let doc = json!({"id": "order-1", "pk": "tenant-a", "total": 42});
//!     let context = OperationContext::new("order-1", "orders-import")?;
//!     writer
//!         .schedule_write(ItemOperation::upsert("tenant-a", doc.clone(), context), doc)
//!         .await?;
//!
//!     let written = writer.flush().await;
//!     println!("Wrote {} documents", written.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Throttling (429), timeouts and transient server errors are retried with
//! linear backoff plus jitter, honouring the server's retry-after hint.
//! A create that hits 409 or a delete that hits 404 counts as success, since
//! an earlier attempt already applied it.
//!
//! ## Error Handling
//!
//! Library operations return [`domain::Result`] with [`domain::BulkError`].
//! Per-document failures are not errors: they are recorded and returned by
//! [`core::bulk::BulkWriter::failures`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
