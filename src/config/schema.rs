//! Configuration schema types
//!
//! This module defines the configuration structure for bulkwriter.

use crate::config::AccountKey;
use serde::{Deserialize, Serialize};

/// Main bulkwriter configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkWriterConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Azure Cosmos DB target (not required for dry runs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmosdb: Option<CosmosDbConfig>,

    /// Bulk write tuning
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BulkWriterConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;

        match self.cosmosdb {
            Some(ref config) => config.validate()?,
            None if !self.application.dry_run => {
                return Err(
                    "cosmosdb configuration is required unless application.dry_run = true"
                        .to_string(),
                );
            }
            None => {}
        }

        self.bulk.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (don't write to Cosmos DB)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Azure Cosmos DB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosDbConfig {
    /// Cosmos DB endpoint URL
    pub endpoint: String,

    /// Cosmos DB access key
    /// Stored securely in memory and automatically zeroized on drop
    pub key: AccountKey,

    /// Database name
    pub database_name: String,

    /// Target container name
    pub container: String,

    /// Partition key path, e.g. `/pk` or `/tenant/id`
    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Concurrent item requests per micro-batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl CosmosDbConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.endpoint.is_empty() {
            return Err("cosmosdb.endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("https://") {
            return Err("cosmosdb.endpoint must start with https://".to_string());
        }

        if self.key.expose_secret().is_empty() {
            return Err("cosmosdb.key cannot be empty".to_string());
        }

        if self.database_name.is_empty() {
            return Err("cosmosdb.database_name cannot be empty".to_string());
        }

        if self.container.is_empty() {
            return Err("cosmosdb.container cannot be empty".to_string());
        }

        if !self.partition_key.starts_with('/') || self.partition_key.len() < 2 {
            return Err(format!(
                "cosmosdb.partition_key must be a path like '/pk', got '{}'",
                self.partition_key
            ));
        }

        if self.max_concurrency == 0 || self.max_concurrency > 100 {
            return Err(format!(
                "cosmosdb.max_concurrency must be between 1 and 100, got {}",
                self.max_concurrency
            ));
        }

        Ok(())
    }
}

/// Bulk write tuning
///
/// Every value has a default; the retry cap and admission limit are tunables
/// rather than protocol constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Maximum admitted but unresolved writes
    #[serde(default = "default_max_pending_operations")]
    pub max_pending_operations: usize,

    /// Writes whose retry count exceeds this value fail permanently
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Linear backoff step per retry in milliseconds
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,

    /// Backoff jitter ceiling per retry in milliseconds
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Cap applied to server retry-after hints in milliseconds
    #[serde(default = "default_max_retry_after_ms")]
    pub max_retry_after_ms: u64,

    /// How long one admission wait lasts before it is logged and repeated
    #[serde(default = "default_permit_wait_ms")]
    pub permit_wait_ms: u64,

    /// How often a waiting flush logs progress
    #[serde(default = "default_progress_log_interval_seconds")]
    pub progress_log_interval_seconds: u64,

    /// Starting micro-batch size handed to the executor
    #[serde(default = "default_micro_batch_size")]
    pub initial_micro_batch_size: usize,

    /// Largest micro-batch size the executor may grow to
    #[serde(default = "default_micro_batch_size")]
    pub max_micro_batch_size: usize,

    /// Executor calls allowed in flight at once
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
}

impl BulkConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_pending_operations == 0 {
            return Err("bulk.max_pending_operations must be > 0".to_string());
        }

        if self.max_retry_count > 100 {
            return Err(format!(
                "bulk.max_retry_count must be <= 100, got {}",
                self.max_retry_count
            ));
        }

        if self.permit_wait_ms == 0 {
            return Err("bulk.permit_wait_ms must be > 0".to_string());
        }

        if self.progress_log_interval_seconds == 0 {
            return Err("bulk.progress_log_interval_seconds must be > 0".to_string());
        }

        if self.initial_micro_batch_size == 0 || self.max_micro_batch_size == 0 {
            return Err("bulk micro-batch sizes must be > 0".to_string());
        }

        if self.initial_micro_batch_size > self.max_micro_batch_size {
            return Err(format!(
                "bulk.initial_micro_batch_size ({}) cannot exceed bulk.max_micro_batch_size ({})",
                self.initial_micro_batch_size, self.max_micro_batch_size
            ));
        }

        if self.max_concurrent_batches == 0 || self.max_concurrent_batches > 64 {
            return Err(format!(
                "bulk.max_concurrent_batches must be between 1 and 64, got {}",
                self.max_concurrent_batches
            ));
        }

        Ok(())
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_pending_operations: default_max_pending_operations(),
            max_retry_count: default_max_retry_count(),
            retry_step_ms: default_retry_step_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            max_retry_after_ms: default_max_retry_after_ms(),
            permit_wait_ms: default_permit_wait_ms(),
            progress_log_interval_seconds: default_progress_log_interval_seconds(),
            initial_micro_batch_size: default_micro_batch_size(),
            max_micro_batch_size: default_micro_batch_size(),
            max_concurrent_batches: default_max_concurrent_batches(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log file path
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_partition_key() -> String {
    "/pk".to_string()
}

fn default_max_concurrency() -> usize {
    16
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_pending_operations() -> usize {
    1024 * 167
}

fn default_max_retry_count() -> u32 {
    20
}

fn default_retry_step_ms() -> u64 {
    10
}

fn default_retry_jitter_ms() -> u64 {
    990
}

fn default_max_retry_after_ms() -> u64 {
    5000
}

fn default_permit_wait_ms() -> u64 {
    1000
}

fn default_progress_log_interval_seconds() -> u64 {
    10
}

fn default_micro_batch_size() -> usize {
    100
}

fn default_max_concurrent_batches() -> usize {
    4
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::key::account_key;

    fn cosmos_config() -> CosmosDbConfig {
        CosmosDbConfig {
            endpoint: "https://test.documents.azure.com:443/".to_string(),
            key: account_key("test-key"),
            database_name: "test_db".to_string(),
            container: "items".to_string(),
            partition_key: "/pk".to_string(),
            max_concurrency: 10,
            request_timeout_seconds: 30,
        }
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cosmosdb_config_validation() {
        let mut config = cosmos_config();
        assert!(config.validate().is_ok());

        config.endpoint = "http://insecure.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = cosmos_config();
        config.key = account_key("");
        assert!(config.validate().is_err());

        let mut config = cosmos_config();
        config.partition_key = "pk".to_string();
        assert!(config.validate().is_err());

        let mut config = cosmos_config();
        config.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bulk_config_defaults() {
        let config = BulkConfig::default();
        assert_eq!(config.max_pending_operations, 171_008);
        assert_eq!(config.max_retry_count, 20);
        assert_eq!(config.max_retry_after_ms, 5000);
        assert_eq!(config.progress_log_interval_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bulk_config_validation() {
        let mut config = BulkConfig {
            max_pending_operations: 0,
            ..BulkConfig::default()
        };
        assert!(config.validate().is_err());

        config = BulkConfig {
            initial_micro_batch_size: 200,
            max_micro_batch_size: 100,
            ..BulkConfig::default()
        };
        assert!(config.validate().is_err());

        config = BulkConfig {
            max_concurrent_batches: 0,
            ..BulkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cosmosdb_required_unless_dry_run() {
        let mut config = BulkWriterConfig {
            application: ApplicationConfig::default(),
            cosmosdb: None,
            bulk: BulkConfig::default(),
            logging: LoggingConfig::default(),
        };
        assert!(config.validate().is_err());

        config.application.dry_run = true;
        assert!(config.validate().is_ok());

        config.application.dry_run = false;
        config.cosmosdb = Some(cosmos_config());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
