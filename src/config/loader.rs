//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BulkWriterConfig;
use super::key::account_key;
use crate::domain::errors::BulkError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BulkWriterConfig
/// 4. Applies environment variable overrides (BULKWRITER_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsing or substitution
/// fails, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use bulkwriter::config::loader::load_config;
///
/// let config = load_config("bulkwriter.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BulkWriterConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BulkError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BulkError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: BulkWriterConfig = toml::from_str(&contents)
        .map_err(|e| BulkError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        BulkError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BulkError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(BulkError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.parse().ok())
}

/// Applies environment variable overrides using BULKWRITER_* prefix
///
/// Environment variables follow the pattern: BULKWRITER_<SECTION>_<KEY>,
/// e.g. BULKWRITER_COSMOSDB_ENDPOINT or BULKWRITER_BULK_MAX_RETRY_COUNT.
fn apply_env_overrides(config: &mut BulkWriterConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("BULKWRITER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(dry_run) = env_parse("BULKWRITER_APPLICATION_DRY_RUN") {
        config.application.dry_run = dry_run;
    }

    // Cosmos DB overrides (only if CosmosDB is configured)
    if let Some(ref mut cosmos_config) = config.cosmosdb {
        if let Ok(val) = std::env::var("BULKWRITER_COSMOSDB_ENDPOINT") {
            cosmos_config.endpoint = val;
        }
        if let Ok(val) = std::env::var("BULKWRITER_COSMOSDB_KEY") {
            cosmos_config.key = account_key(val);
        }
        if let Ok(val) = std::env::var("BULKWRITER_COSMOSDB_DATABASE_NAME") {
            cosmos_config.database_name = val;
        }
        if let Ok(val) = std::env::var("BULKWRITER_COSMOSDB_CONTAINER") {
            cosmos_config.container = val;
        }
        if let Ok(val) = std::env::var("BULKWRITER_COSMOSDB_PARTITION_KEY") {
            cosmos_config.partition_key = val;
        }
        if let Some(concurrency) = env_parse("BULKWRITER_COSMOSDB_MAX_CONCURRENCY") {
            cosmos_config.max_concurrency = concurrency;
        }
    }

    // Bulk overrides
    if let Some(max) = env_parse("BULKWRITER_BULK_MAX_PENDING_OPERATIONS") {
        config.bulk.max_pending_operations = max;
    }
    if let Some(max) = env_parse("BULKWRITER_BULK_MAX_RETRY_COUNT") {
        config.bulk.max_retry_count = max;
    }
    if let Some(size) = env_parse("BULKWRITER_BULK_MAX_MICRO_BATCH_SIZE") {
        config.bulk.max_micro_batch_size = size;
    }
    if let Some(batches) = env_parse("BULKWRITER_BULK_MAX_CONCURRENT_BATCHES") {
        config.bulk.max_concurrent_batches = batches;
    }

    // Logging overrides
    if let Some(enabled) = env_parse("BULKWRITER_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("BULKWRITER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("BULKWRITER_TEST_VAR", "test_value");
        let input = "key = \"${BULKWRITER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "key = \"test_value\"\n");
        std::env::remove_var("BULKWRITER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("BULKWRITER_MISSING_VAR");
        let input = "key = \"${BULKWRITER_MISSING_VAR}\"";
        let result = substitute_env_vars(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("BULKWRITER_COMMENTED_VAR");
        let input = "# key = \"${BULKWRITER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "info"

[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "test-key"
database_name = "test_db"
container = "items"

[bulk]
max_retry_count = 5
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.bulk.max_retry_count, 5);
        assert_eq!(config.bulk.max_pending_operations, 1024 * 167);
        let cosmos = config.cosmosdb.unwrap();
        assert_eq!(cosmos.container, "items");
        assert_eq!(cosmos.partition_key, "/pk");
    }
}
