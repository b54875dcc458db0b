//! Cosmos DB client implementation
//!
//! Thin wrapper that owns the SDK client and hands out the target container.

use crate::config::CosmosDbConfig;
use crate::domain::{BulkError, CosmosDbError, Result};
use azure_core::credentials::Secret;
use azure_data_cosmos::clients::{ContainerClient, DatabaseClient};
use azure_data_cosmos::{CosmosClient, CosmosClientOptions};

/// Connection to one Cosmos DB database and container
pub struct CosmosDbClient {
    database: DatabaseClient,
    container: ContainerClient,
    config: CosmosDbConfig,
}

impl CosmosDbClient {
    /// Create a new Cosmos DB client
    ///
    /// No request is sent; use [`CosmosDbClient::test_connection`] to verify
    /// the account is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK rejects the endpoint or key.
    pub fn new(config: CosmosDbConfig) -> Result<Self> {
        use secrecy::ExposeSecret;

        let key = Secret::new(config.key.expose_secret().as_str().to_string());
        let options = Some(CosmosClientOptions::default());

        let client = CosmosClient::with_key(&config.endpoint, key, options).map_err(|e| {
            BulkError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                "Failed to create Cosmos client: {e}"
            )))
        })?;

        let database = client.database_client(&config.database_name);
        let container = database.container_client(&config.container);

        Ok(Self {
            database,
            container,
            config,
        })
    }

    /// Reads the database and container to verify both exist
    pub async fn test_connection(&self) -> Result<()> {
        self.database.read(None).await.map_err(|e| {
            if is_not_found(&e.to_string()) {
                BulkError::CosmosDb(CosmosDbError::DatabaseNotFound(
                    self.config.database_name.clone(),
                ))
            } else {
                BulkError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                    "Connection test failed: {e}"
                )))
            }
        })?;

        self.container.read(None).await.map_err(|e| {
            if is_not_found(&e.to_string()) {
                BulkError::CosmosDb(CosmosDbError::ContainerNotFound(
                    self.config.container.clone(),
                ))
            } else {
                BulkError::CosmosDb(CosmosDbError::ConnectionFailed(format!(
                    "Container read failed: {e}"
                )))
            }
        })?;

        tracing::info!(
            database = %self.config.database_name,
            container = %self.config.container,
            "Cosmos DB connection verified"
        );
        Ok(())
    }

    /// Client for the configured container
    pub fn container(&self) -> &ContainerClient {
        &self.container
    }

    /// Get the database name
    pub fn database_name(&self) -> &str {
        &self.config.database_name
    }

    /// Get the container name
    pub fn container_name(&self) -> &str {
        &self.config.container
    }

    /// Partition key path documents are routed by, e.g. `/pk`
    pub fn partition_key_path(&self) -> &str {
        &self.config.partition_key
    }

    pub fn config(&self) -> &CosmosDbConfig {
        &self.config
    }
}

fn is_not_found(message: &str) -> bool {
    message.contains("404") || message.contains("NotFound")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::account_key;

    fn config() -> CosmosDbConfig {
        CosmosDbConfig {
            endpoint: "https://test.documents.azure.com:443/".to_string(),
            key: account_key("dGVzdC1rZXk="),
            database_name: "ingest".to_string(),
            container: "items".to_string(),
            partition_key: "/tenant".to_string(),
            max_concurrency: 8,
            request_timeout_seconds: 30,
        }
    }

    #[test]
    fn test_client_accessors() {
        let client = CosmosDbClient::new(config()).unwrap();
        assert_eq!(client.database_name(), "ingest");
        assert_eq!(client.container_name(), "items");
        assert_eq!(client.partition_key_path(), "/tenant");
    }

    #[test]
    fn test_is_not_found() {
        assert!(is_not_found("HTTP 404 NotFound"));
        assert!(!is_not_found("HTTP 403 Forbidden"));
    }
}
