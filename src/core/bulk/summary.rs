//! Bulk write summary and reporting

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Snapshot of a bulk write run
#[derive(Debug, Clone, Serialize)]
pub struct BulkWriteSummary {
    /// Run identifier
    pub run_id: Uuid,

    /// When the run's bookkeeping was created
    pub started_at: DateTime<Utc>,

    /// Logical writes still outstanding
    pub outstanding: u64,

    /// Logical writes that reached a terminal outcome
    pub completed: u64,

    /// Writes that succeeded
    pub succeeded: usize,

    /// Writes that failed permanently
    pub failed: usize,

    /// Total request units charged, retries included
    pub request_charge: f64,

    /// Time since the run started
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl BulkWriteSummary {
    /// Check if every completed write succeeded
    pub fn is_successful(&self) -> bool {
        self.failed == 0 && self.outstanding == 0
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded + self.failed;
        if total == 0 {
            return 100.0;
        }
        (self.succeeded as f64 / total as f64) * 100.0
    }

    /// Writes per second over the run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.completed as f64 / secs
    }

    /// Emit the summary as a structured log event
    pub fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            completed = self.completed,
            succeeded = self.succeeded,
            failed = self.failed,
            outstanding = self.outstanding,
            request_charge = self.request_charge,
            duration_ms = self.elapsed.as_millis() as u64,
            "Bulk write summary"
        );
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(succeeded: usize, failed: usize, outstanding: u64) -> BulkWriteSummary {
        BulkWriteSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            outstanding,
            completed: (succeeded + failed) as u64,
            succeeded,
            failed,
            request_charge: 12.5,
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_success_rate() {
        assert_eq!(summary(0, 0, 0).success_rate(), 100.0);
        assert_eq!(summary(3, 1, 0).success_rate(), 75.0);
    }

    #[test]
    fn test_is_successful() {
        assert!(summary(5, 0, 0).is_successful());
        assert!(!summary(5, 1, 0).is_successful());
        assert!(!summary(5, 0, 2).is_successful());
    }

    #[test]
    fn test_throughput() {
        assert_eq!(summary(8, 2, 0).throughput(), 5.0);
    }

    #[test]
    fn test_serializes_elapsed_as_millis() {
        let json = serde_json::to_value(summary(1, 0, 0)).unwrap();
        assert_eq!(json["elapsed"], 2000);
        assert_eq!(json["request_charge"], 12.5);
    }
}
