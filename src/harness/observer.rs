//! Progress and result observation for batch runs.
//!
//! The orchestrator reports through this seam instead of bare callbacks so
//! the coordination logic stays testable without real I/O.

use super::AttemptRecord;

/// Terminal status of one attempt, as shown in progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// The agent ran to completion (exit code may still be non-zero).
    Completed,
    /// The attempt failed at the harness boundary.
    Errored,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Receives per-attempt notifications from the orchestrator.
///
/// For a single attempt, `on_progress` fires strictly before `on_result`,
/// and both fire after the runner call returns but before the worker
/// accepts new work. Implementations must be cheap and non-blocking; slow
/// work belongs behind a channel.
pub trait RunObserver: Send + Sync {
    /// Called once when an attempt reaches a terminal status.
    fn on_progress(&self, instance_id: &str, status: AttemptStatus, done: usize, total: usize);

    /// Called once with the finished record, after `on_progress`.
    fn on_result(&self, record: &AttemptRecord);
}

/// Observer that logs progress through `tracing` and drops results.
pub struct LogObserver;

impl RunObserver for LogObserver {
    fn on_progress(&self, instance_id: &str, status: AttemptStatus, done: usize, total: usize) {
        tracing::info!(
            instance_id,
            status = %status,
            progress = format!("{done}/{total}"),
            "Attempt finished"
        );
    }

    fn on_result(&self, _record: &AttemptRecord) {}
}

/// Observer that ignores everything. Used in tests.
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn on_progress(&self, _instance_id: &str, _status: AttemptStatus, _done: usize, _total: usize) {
    }

    fn on_result(&self, _record: &AttemptRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_status_display() {
        assert_eq!(AttemptStatus::Completed.to_string(), "completed");
        assert_eq!(AttemptStatus::Errored.to_string(), "errored");
    }
}
