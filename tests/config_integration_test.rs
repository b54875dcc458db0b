//! Integration tests for configuration loading and validation
//!
//! Tests that touch environment variables hold ENV_MUTEX.

use bulkwriter::config::{load_config, BulkConfig};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for var in [
        "BULKWRITER_APPLICATION_LOG_LEVEL",
        "BULKWRITER_APPLICATION_DRY_RUN",
        "BULKWRITER_COSMOSDB_ENDPOINT",
        "BULKWRITER_COSMOSDB_KEY",
        "BULKWRITER_COSMOSDB_CONTAINER",
        "BULKWRITER_BULK_MAX_RETRY_COUNT",
        "BULKWRITER_BULK_MAX_PENDING_OPERATIONS",
        "TEST_BULKWRITER_COSMOS_KEY",
    ] {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"

[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "test-key-12345"
database_name = "ingest"
container = "orders"
partition_key = "/customer/id"
max_concurrency = 32
request_timeout_seconds = 20

[bulk]
max_pending_operations = 5000
max_retry_count = 8
retry_step_ms = 25
retry_jitter_ms = 100
max_retry_after_ms = 2000
permit_wait_ms = 500
progress_log_interval_seconds = 5
initial_micro_batch_size = 10
max_micro_batch_size = 50
max_concurrent_batches = 2

[logging]
local_enabled = false
local_path = "/tmp/bulkwriter"
local_rotation = "hourly"
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "debug");
    assert!(!config.application.dry_run);

    let cosmos = config.cosmosdb.as_ref().unwrap();
    let key = cosmos.key.expose_secret().as_str().to_string();
    assert_eq!(key, "test-key-12345");
    assert_eq!(cosmos.container, "orders");
    assert_eq!(cosmos.partition_key, "/customer/id");
    assert_eq!(cosmos.max_concurrency, 32);

    assert_eq!(config.bulk.max_pending_operations, 5000);
    assert_eq!(config.bulk.max_retry_count, 8);
    assert_eq!(config.bulk.initial_micro_batch_size, 10);
    assert_eq!(config.bulk.max_concurrent_batches, 2);

    assert!(!config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "hourly");
}

#[test]
fn test_load_minimal_dry_run_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[application]\ndry_run = true\n");
    let config = load_config(file.path()).expect("Failed to load config");

    assert!(config.application.dry_run);
    assert!(config.cosmosdb.is_none());
    assert_eq!(config.bulk, BulkConfig::default());
    assert_eq!(config.bulk.max_pending_operations, 1024 * 167);
    assert_eq!(config.bulk.max_retry_count, 20);
}

#[test]
fn test_cosmosdb_required_without_dry_run() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[application]\nlog_level = \"info\"\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_BULKWRITER_COSMOS_KEY", "substituted-key");

    let file = write_config(
        r#"
[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "${TEST_BULKWRITER_COSMOS_KEY}"
database_name = "ingest"
container = "items"
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");
    let key = config.cosmosdb.unwrap().key.expose_secret().as_str().to_string();
    assert_eq!(key, "substituted-key");

    cleanup_env_vars();
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("BULKWRITER_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("BULKWRITER_COSMOSDB_CONTAINER", "override");
    std::env::set_var("BULKWRITER_BULK_MAX_RETRY_COUNT", "3");
    std::env::set_var("BULKWRITER_BULK_MAX_PENDING_OPERATIONS", "64");

    let file = write_config(
        r#"
[application]
log_level = "info"

[cosmosdb]
endpoint = "https://test.documents.azure.com:443/"
key = "test-key"
database_name = "ingest"
container = "items"

[bulk]
max_retry_count = 10
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.cosmosdb.unwrap().container, "override");
    assert_eq!(config.bulk.max_retry_count, 3);
    assert_eq!(config.bulk.max_pending_operations, 64);

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let invalid = [
        "[application]\nlog_level = \"loud\"\ndry_run = true\n",
        "[application]\ndry_run = true\n[bulk]\nmax_pending_operations = 0\n",
        "[application]\ndry_run = true\n[bulk]\ninitial_micro_batch_size = 200\nmax_micro_batch_size = 100\n",
        "[application]\ndry_run = true\n[logging]\nlocal_rotation = \"weekly\"\n",
        "[cosmosdb]\nendpoint = \"http://insecure\"\nkey = \"k\"\ndatabase_name = \"d\"\ncontainer = \"c\"\n",
    ];

    for contents in invalid {
        let file = write_config(contents);
        assert!(load_config(file.path()).is_err(), "accepted: {contents}");
    }
}
