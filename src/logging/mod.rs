//! Logging and observability
//!
//! Structured logging built on `tracing`:
//! - Console output filtered by level
//! - Optional JSON log files with rotation
//! - Macros for the writer's recurring events
//!
//! # Example
//!
//! ```no_run
//! use bulkwriter::logging::init_logging;
//! use bulkwriter::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log a retry of a single operation
///
/// # Example
///
/// ```no_run
/// use bulkwriter::log_retry_attempt;
///
/// log_retry_attempt!("doc-1", 2, 150u64, "status 429");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($id:expr, $retry_count:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            id = %$id,
            retry_count = $retry_count,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Retrying operation"
        );
    };
}

/// Log flush progress while waiting for outstanding writes
///
/// # Example
///
/// ```no_run
/// use bulkwriter::log_flush_progress;
///
/// let run_id = uuid::Uuid::new_v4();
/// log_flush_progress!(run_id, 3u64, vec!["a".to_string()]);
/// ```
#[macro_export]
macro_rules! log_flush_progress {
    ($run_id:expr, $outstanding:expr, $sample:expr) => {
        tracing::info!(
            run_id = %$run_id,
            outstanding = $outstanding,
            pending_sample = ?$sample,
            "Waiting for outstanding operations"
        );
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_macros_expand() {
        let run_id = uuid::Uuid::new_v4();
        crate::log_retry_attempt!("doc-1", 1u32, 10u64, "status 503");
        crate::log_flush_progress!(run_id, 0u64, Vec::<String>::new());
    }
}
