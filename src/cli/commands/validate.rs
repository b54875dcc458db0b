//! Validate config command implementation

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also connect to Cosmos DB and check the database and container exist
    #[arg(long)]
    pub check_connection: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        match &config.cosmosdb {
            Some(cosmos) => {
                println!("  Cosmos DB Endpoint: {}", cosmos.endpoint);
                println!("  Cosmos DB Database: {}", cosmos.database_name);
                println!("  Cosmos DB Container: {}", cosmos.container);
                println!("  Partition Key Path: {}", cosmos.partition_key);
            }
            None => println!("  Cosmos DB: not configured"),
        }
        println!(
            "  Max Pending Operations: {}",
            config.bulk.max_pending_operations
        );
        println!("  Max Retry Count: {}", config.bulk.max_retry_count);
        println!(
            "  Micro-batch Size: {} (max {})",
            config.bulk.initial_micro_batch_size, config.bulk.max_micro_batch_size
        );
        println!();

        if self.check_connection {
            let Some(cosmos) = config.cosmosdb else {
                println!("❌ No [cosmosdb] section to check");
                return Ok(2);
            };
            let client = crate::adapters::CosmosDbClient::new(cosmos)?;
            match client.test_connection().await {
                Ok(()) => println!("✅ Cosmos DB connection verified"),
                Err(e) => {
                    println!("❌ Cosmos DB connection failed");
                    println!("   Error: {e}");
                    return Ok(5);
                }
            }
        }

        Ok(0)
    }
}
