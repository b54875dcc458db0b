//! Bulk executor implementations
//!
//! - [`cosmosdb`] - Azure Cosmos DB container executor
//! - [`dry_run`] - In-process executor that accepts everything
//!
//! # Cosmos DB
//!
//! ```rust,no_run
//! use bulkwriter::adapters::cosmosdb::{CosmosBulkExecutor, CosmosDbClient};
//! use bulkwriter::config::{account_key, CosmosDbConfig};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CosmosDbConfig {
//!     endpoint: "https://account.documents.azure.com:443/".to_string(),
//!     key: account_key("key"),
//!     database_name: "ingest".to_string(),
//!     container: "items".to_string(),
//!     partition_key: "/pk".to_string(),
//!     max_concurrency: 16,
//!     request_timeout_seconds: 60,
//! };
//!
//! let client = Arc::new(CosmosDbClient::new(config)?);
//! let executor = CosmosBulkExecutor::new(client);
//! # Ok(())
//! # }
//! ```

pub mod cosmosdb;
pub mod dry_run;

pub use cosmosdb::{CosmosBulkExecutor, CosmosDbClient};
pub use dry_run::DryRunExecutor;
