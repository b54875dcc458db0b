//! Configuration management for the bulk writer.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Configuration files support:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `BULKWRITER_<SECTION>_<KEY>` environment overrides
//! - Default values for every optional setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bulkwriter::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("bulkwriter.toml")?;
//!
//! println!("Admission capacity: {}", config.bulk.max_pending_operations);
//! if let Some(cosmosdb) = &config.cosmosdb {
//!     println!("Target: {}/{}", cosmosdb.database_name, cosmosdb.container);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run switch
//! - [`CosmosDbConfig`] - Account endpoint, key, database, container and partition key path
//! - [`BulkConfig`] - Admission capacity, retry budget, backoff and batching
//! - [`LoggingConfig`] - Local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [cosmosdb]
//! endpoint = "https://your-account.documents.azure.com:443/"
//! key = "${BULKWRITER_COSMOS_KEY}"
//! database_name = "ingest"
//! container = "items"
//! partition_key = "/pk"
//!
//! [bulk]
//! max_pending_operations = 171008
//! max_retry_count = 20
//! ```

pub mod key;
pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{ApplicationConfig, BulkConfig, BulkWriterConfig, CosmosDbConfig, LoggingConfig};
pub use key::{account_key, AccountKey, KeyMaterial};
