//! Batch orchestration for agent attempts.
//!
//! Dispatches every (instance, attempt) pair to an [`AgentRunner`] under a
//! bounded worker pool, streams each completed attempt to an observer (and
//! through it to durable storage) before the worker accepts new work, and
//! returns the full result set only after the pool has drained.
//!
//! Failure containment: a runner error becomes a failed [`AttemptRecord`];
//! it never aborts the batch or other in-flight attempts. The batch as a
//! whole reports failure if any single attempt carried an error, while all
//! results are still returned and written.

pub mod observer;
pub mod writer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::agents::{AgentConfig, AgentRunner};
use crate::dataset::TaskInstance;

pub use observer::{AttemptStatus, LogObserver, NullObserver, RunObserver};
pub use writer::{read_records, write_attempt, write_manifest, PersistingObserver};

/// Raw outcome of one agent invocation, produced by the runner.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Exit code of the agent process.
    pub exit_code: i32,
    /// Candidate patch text (possibly empty).
    pub patch: String,
    /// Error text for attempts that failed outside the agent's control.
    pub error: Option<String>,
}

impl AttemptOutcome {
    /// Outcome for an agent that ran to completion.
    pub fn completed(exit_code: i32, patch: impl Into<String>) -> Self {
        Self {
            exit_code,
            patch: patch.into(),
            error: None,
        }
    }

    /// Outcome for an attempt that failed before producing a patch.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            patch: String::new(),
            error: Some(error.into()),
        }
    }
}

/// One completed attempt, as persisted and scored.
///
/// Created once when the attempt finishes, never mutated afterward.
/// `exit_code` alone does not imply task success: the success boolean used
/// for scoring comes from an external test-evaluation step (see
/// [`crate::evals::Verdicts`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Instance this attempt targeted.
    pub instance_id: String,
    /// 1-based attempt index within the instance.
    pub attempt: u32,
    /// Exit code of the agent process (-1 if it never ran).
    pub exit_code: i32,
    /// Candidate patch text (possibly empty).
    pub patch: String,
    /// Error text if the attempt failed at the harness boundary.
    pub error: Option<String>,
    /// Wall-clock duration of the attempt.
    pub duration_secs: f64,
    /// Timestamp when the attempt completed.
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    fn from_outcome(
        instance_id: &str,
        attempt: u32,
        outcome: AttemptOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            attempt,
            exit_code: outcome.exit_code,
            patch: outcome.patch,
            error: outcome.error,
            duration_secs: duration.as_secs_f64(),
            completed_at: Utc::now(),
        }
    }

    /// Returns true if the attempt completed without a harness-level error.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// Result set of one full batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// All attempt records, one per submitted (instance, attempt) pair.
    /// Order reflects real completion order and is non-deterministic.
    pub records: Vec<AttemptRecord>,
    /// Number of records carrying an error.
    pub errored: usize,
    /// Wall-clock duration of the whole batch.
    pub duration: Duration,
}

impl BatchReport {
    /// True iff every attempt completed without an error condition.
    pub fn is_success(&self) -> bool {
        self.errored == 0
    }

    /// Number of attempts that completed without an error.
    pub fn completed(&self) -> usize {
        self.records.len() - self.errored
    }
}

/// Run `attempts` independent attempts of every instance concurrently.
///
/// At most `workers` attempts are active at once; each attempt occupies one
/// worker for its full duration, including the blocking call into the
/// runner. For every attempt, `observer.on_progress` fires strictly before
/// `observer.on_result`, and both fire before the worker's permit is
/// released. No ordering is guaranteed across attempts.
///
/// Returns only after every submitted attempt has completed.
pub async fn run_batch(
    instances: &[TaskInstance],
    attempts: u32,
    config: &AgentConfig,
    model: &str,
    workers: usize,
    runner: &dyn AgentRunner,
    observer: &dyn RunObserver,
) -> BatchReport {
    let start = Instant::now();
    let total = instances.len() * attempts as usize;

    info!(
        instances = instances.len(),
        attempts_per_instance = attempts,
        total_attempts = total,
        workers,
        "Starting batch run"
    );

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let records: Mutex<Vec<AttemptRecord>> = Mutex::new(Vec::with_capacity(total));
    // Callback critical section: progress and result fire back-to-back for
    // one attempt without interleaving with another attempt's callbacks.
    let callback_lock: Mutex<()> = Mutex::new(());
    let progress = AtomicUsize::new(0);

    let futures: Vec<_> = instances
        .iter()
        .flat_map(|instance| (1..=attempts).map(move |attempt| (instance, attempt)))
        .map(|(instance, attempt)| {
            let semaphore = Arc::clone(&semaphore);
            let records = &records;
            let callback_lock = &callback_lock;
            let progress = &progress;
            async move {
                // Closing the semaphore is not part of this design, so the
                // acquire can only fail if the pool itself is torn down.
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };

                let attempt_start = Instant::now();
                let outcome = match runner.run_attempt(instance, config, model).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            instance_id = %instance.instance_id,
                            attempt,
                            error = %e,
                            "Attempt failed at the runner boundary"
                        );
                        AttemptOutcome::failed(e.to_string())
                    }
                };
                let record = AttemptRecord::from_outcome(
                    &instance.instance_id,
                    attempt,
                    outcome,
                    attempt_start.elapsed(),
                );

                let done = progress.fetch_add(1, Ordering::SeqCst) + 1;
                {
                    let _guard = callback_lock.lock().await;
                    let status = if record.is_clean() {
                        AttemptStatus::Completed
                    } else {
                        AttemptStatus::Errored
                    };
                    observer.on_progress(&record.instance_id, status, done, total);
                    observer.on_result(&record);
                }

                records.lock().await.push(record);
                // _permit drops here: the worker accepts new work only after
                // both callbacks have run.
            }
        })
        .collect();

    futures::future::join_all(futures).await;

    let records = records.into_inner();
    let errored = records.iter().filter(|r| !r.is_clean()).count();
    let duration = start.elapsed();

    info!(
        total = records.len(),
        errored,
        duration_secs = duration.as_secs(),
        "Batch run finished"
    );

    BatchReport {
        records,
        errored,
        duration,
    }
}
