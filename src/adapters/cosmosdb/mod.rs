//! Azure Cosmos DB integration
//!
//! [`CosmosDbClient`] owns the SDK connection; [`CosmosBulkExecutor`] plugs it
//! into the bulk writer.

pub mod client;
pub mod executor;

pub use client::CosmosDbClient;
pub use executor::{document_id, partition_key_value, CosmosBulkExecutor};
