//! Domain error types
//!
//! This module defines the error hierarchy for bulkwriter.
//! Per-operation write failures are never surfaced through these types; they are
//! recorded on the run's [`OperationStatus`](crate::core::bulk::OperationStatus).
//! Only usage errors and setup failures are returned to callers.

use thiserror::Error;

/// Main bulkwriter error type
///
/// This is the primary error type used throughout the crate.
#[derive(Debug, Error)]
pub enum BulkError {
    /// A required argument was missing or empty
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was invoked in the wrong lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The writer was closed while the call was waiting
    #[error("Bulk writer is closed")]
    Closed,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cosmos DB-related errors
    #[error("Cosmos DB error: {0}")]
    CosmosDb(#[from] CosmosDbError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Cosmos DB-specific errors
///
/// Errors raised while setting up the Cosmos DB adapter.
/// These errors don't expose third-party SDK types.
#[derive(Debug, Error)]
pub enum CosmosDbError {
    /// Failed to connect to Cosmos DB
    #[error("Failed to connect to Cosmos DB: {0}")]
    ConnectionFailed(String),

    /// Database not found
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Container not found
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    /// Document is missing the configured partition key
    #[error("Partition key missing: {0}")]
    PartitionKeyMissing(String),

    /// Document is missing its id
    #[error("Document id missing: {0}")]
    DocumentIdMissing(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for BulkError {
    fn from(err: std::io::Error) -> Self {
        BulkError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BulkError {
    fn from(err: serde_json::Error) -> Self {
        BulkError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BulkError {
    fn from(err: toml::de::Error) -> Self {
        BulkError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_error_display() {
        let err = BulkError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");

        let err = BulkError::IllegalState("flush already requested".to_string());
        assert_eq!(err.to_string(), "Illegal state: flush already requested");

        assert_eq!(BulkError::Closed.to_string(), "Bulk writer is closed");
    }

    #[test]
    fn test_cosmosdb_error_conversion() {
        let cosmos_err = CosmosDbError::ContainerNotFound("items".to_string());
        let err: BulkError = cosmos_err.into();
        assert!(matches!(err, BulkError::CosmosDb(_)));
        assert!(err.to_string().contains("Container not found: items"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BulkError = io_err.into();
        assert!(matches!(err, BulkError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: BulkError = json_err.into();
        assert!(matches!(err, BulkError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: BulkError = toml_err.into();
        assert!(matches!(err, BulkError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_bulk_error_implements_std_error() {
        let err = BulkError::InvalidArgument("id".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
