//! Integration tests for logging functionality

use bulkwriter::config::LoggingConfig;
use bulkwriter::logging::{init_logging, parse_log_level};
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_parse_log_level_rejects_unknown() {
    assert!(parse_log_level("info").is_ok());
    assert!(parse_log_level("chatty").is_err());
}

// The global subscriber can only be installed once per process, so this is
// the only test in this file that calls init_logging.
#[test]
fn test_init_logging_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    let guard = init_logging("debug", &config).expect("Failed to initialize logging");
    assert!(guard.has_file_output());
    assert!(log_path.exists());

    bulkwriter::log_retry_attempt!("doc-1", 1u32, 25u64, "status 429");
    bulkwriter::log_flush_progress!(uuid::Uuid::new_v4(), 2u64, vec!["doc-1".to_string()]);
}
