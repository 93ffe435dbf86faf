//! Durable persistence of attempt results.
//!
//! Each attempt is written immediately on completion under a path keyed by
//! instance id and attempt index, so concurrent writers never target the
//! same location and no file-level locking is needed:
//!
//! ```text
//! <eval_dir>/<eval_id>/results/<instance_id>/attempt_<n>/patch.diff
//! <eval_dir>/<eval_id>/results/<instance_id>/attempt_<n>/result.json
//! <eval_dir>/<eval_id>/patches.json        (aggregate manifest)
//! ```
//!
//! Re-running with the same eval id overwrites prior files; nothing stale
//! accumulates. A write failure is logged and does not abort the batch;
//! the in-memory record is still scored.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::observer::{AttemptStatus, RunObserver};
use super::AttemptRecord;
use crate::error::WriteError;

/// Metadata persisted next to the patch for one attempt.
#[derive(Debug, Serialize)]
struct AttemptMetadata<'a> {
    instance_id: &'a str,
    attempt: u32,
    exit_code: i32,
    error: Option<&'a str>,
    duration_secs: f64,
    completed_at: chrono::DateTime<chrono::Utc>,
    eval_id: &'a str,
}

/// One entry of the aggregate patches manifest, consumed by downstream
/// patch-collection tooling.
#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    instance_id: &'a str,
    patch: &'a str,
    prefix: &'a str,
}

fn create_dir(path: &Path) -> Result<(), WriteError> {
    std::fs::create_dir_all(path).map_err(|source| WriteError::CreateDir {
        path: path.display().to_string(),
        source,
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), WriteError> {
    std::fs::write(path, content).map_err(|source| WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    })
}

/// Directory holding one attempt's artifacts.
pub fn attempt_dir(eval_dir: &Path, eval_id: &str, instance_id: &str, attempt: u32) -> PathBuf {
    eval_dir
        .join(eval_id)
        .join("results")
        .join(instance_id)
        .join(format!("attempt_{attempt}"))
}

/// Persist one attempt's patch and metadata.
///
/// The target directory is unique per (instance, attempt), so writes from
/// concurrent workers never collide.
pub fn write_attempt(
    record: &AttemptRecord,
    eval_dir: &Path,
    eval_id: &str,
) -> Result<(), WriteError> {
    let dir = attempt_dir(eval_dir, eval_id, &record.instance_id, record.attempt);
    create_dir(&dir)?;

    write_file(&dir.join("patch.diff"), &record.patch)?;

    let metadata = AttemptMetadata {
        instance_id: &record.instance_id,
        attempt: record.attempt,
        exit_code: record.exit_code,
        error: record.error.as_deref(),
        duration_secs: record.duration_secs,
        completed_at: record.completed_at,
        eval_id,
    };
    write_file(
        &dir.join("result.json"),
        &serde_json::to_string_pretty(&metadata)?,
    )?;

    debug!(
        instance_id = %record.instance_id,
        attempt = record.attempt,
        dir = %dir.display(),
        "Wrote attempt result"
    );
    Ok(())
}

/// Emit the aggregate patches manifest after the batch completes.
///
/// Entries are sorted by (instance_id, attempt) so the manifest is
/// deterministic regardless of completion order; the file is overwritten
/// on re-runs with the same eval id.
pub fn write_manifest(
    records: &[AttemptRecord],
    eval_dir: &Path,
    eval_id: &str,
) -> Result<PathBuf, WriteError> {
    let run_dir = eval_dir.join(eval_id);
    create_dir(&run_dir)?;

    let mut ordered: Vec<&AttemptRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.instance_id
            .cmp(&b.instance_id)
            .then(a.attempt.cmp(&b.attempt))
    });

    let entries: Vec<ManifestEntry> = ordered
        .iter()
        .map(|r| ManifestEntry {
            instance_id: &r.instance_id,
            patch: &r.patch,
            prefix: eval_id,
        })
        .collect();

    let path = run_dir.join("patches.json");
    write_file(&path, &serde_json::to_string_pretty(&entries)?)?;
    Ok(path)
}

/// Reload all attempt records previously written under an eval id.
///
/// Walks `results/<instance_id>/attempt_<n>/` and parses each
/// `result.json` together with its sibling `patch.diff`. Directories that
/// do not match the layout are skipped with a warning.
pub fn read_records(eval_dir: &Path, eval_id: &str) -> Result<Vec<AttemptRecord>, WriteError> {
    let results_dir = eval_dir.join(eval_id).join("results");
    let mut records = Vec::new();

    let instance_dirs = std::fs::read_dir(&results_dir).map_err(|source| WriteError::Read {
        path: results_dir.display().to_string(),
        source,
    })?;
    for instance_entry in instance_dirs.flatten() {
        if !instance_entry.path().is_dir() {
            continue;
        }
        let Ok(attempt_dirs) = std::fs::read_dir(instance_entry.path()) else {
            continue;
        };
        for attempt_entry in attempt_dirs.flatten() {
            let dir = attempt_entry.path();
            let meta_path = dir.join("result.json");
            if !meta_path.is_file() {
                continue;
            }
            let parsed = std::fs::read_to_string(&meta_path)
                .ok()
                .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok());
            let Some(meta) = parsed else {
                warn!(path = %meta_path.display(), "Skipping unreadable result.json");
                continue;
            };
            let patch = std::fs::read_to_string(dir.join("patch.diff")).unwrap_or_default();
            records.push(AttemptRecord {
                instance_id: meta["instance_id"].as_str().unwrap_or_default().to_string(),
                attempt: meta["attempt"].as_u64().unwrap_or(0) as u32,
                exit_code: meta["exit_code"].as_i64().unwrap_or(-1) as i32,
                patch,
                error: meta["error"].as_str().map(|s| s.to_string()),
                duration_secs: meta["duration_secs"].as_f64().unwrap_or(0.0),
                completed_at: meta["completed_at"]
                    .as_str()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(chrono::Utc::now),
            });
        }
    }

    records.sort_by(|a, b| {
        a.instance_id
            .cmp(&b.instance_id)
            .then(a.attempt.cmp(&b.attempt))
    });
    Ok(records)
}

/// Observer that persists every result as it completes.
///
/// Progress goes to the log; results go to disk. Write failures are logged
/// and swallowed so persistence problems never abort the batch.
pub struct PersistingObserver {
    eval_dir: PathBuf,
    eval_id: String,
}

impl PersistingObserver {
    pub fn new(eval_dir: impl Into<PathBuf>, eval_id: impl Into<String>) -> Self {
        Self {
            eval_dir: eval_dir.into(),
            eval_id: eval_id.into(),
        }
    }
}

impl RunObserver for PersistingObserver {
    fn on_progress(&self, instance_id: &str, status: AttemptStatus, done: usize, total: usize) {
        tracing::info!(
            instance_id,
            status = %status,
            progress = format!("{done}/{total}"),
            "Attempt finished"
        );
    }

    fn on_result(&self, record: &AttemptRecord) {
        if let Err(e) = write_attempt(record, &self.eval_dir, &self.eval_id) {
            warn!(
                instance_id = %record.instance_id,
                attempt = record.attempt,
                error = %e,
                "Failed to persist attempt result; keeping it in memory for scoring"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(instance_id: &str, attempt: u32, patch: &str) -> AttemptRecord {
        AttemptRecord {
            instance_id: instance_id.to_string(),
            attempt,
            exit_code: 0,
            patch: patch.to_string(),
            error: None,
            duration_secs: 1.5,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_attempt_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let rec = record("repo.task-1", 2, "diff --git a b");

        write_attempt(&rec, tmp.path(), "mini-swe-agent_gpt-4").unwrap();

        let dir = tmp
            .path()
            .join("mini-swe-agent_gpt-4/results/repo.task-1/attempt_2");
        assert_eq!(
            std::fs::read_to_string(dir.join("patch.diff")).unwrap(),
            "diff --git a b"
        );
        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("result.json")).unwrap())
                .unwrap();
        assert_eq!(meta["instance_id"], "repo.task-1");
        assert_eq!(meta["attempt"], 2);
        assert_eq!(meta["exit_code"], 0);
    }

    #[test]
    fn test_attempts_never_collide() {
        let tmp = tempfile::tempdir().unwrap();
        write_attempt(&record("repo.task-1", 1, "p1"), tmp.path(), "e").unwrap();
        write_attempt(&record("repo.task-1", 2, "p2"), tmp.path(), "e").unwrap();

        let base = tmp.path().join("e/results/repo.task-1");
        assert!(base.join("attempt_1/patch.diff").exists());
        assert!(base.join("attempt_2/patch.diff").exists());
        assert_eq!(
            std::fs::read_to_string(base.join("attempt_1/patch.diff")).unwrap(),
            "p1"
        );
        assert_eq!(
            std::fs::read_to_string(base.join("attempt_2/patch.diff")).unwrap(),
            "p2"
        );
    }

    #[test]
    fn test_manifest_sorted_and_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        // Insertion order is completion order: deliberately unsorted.
        let records = vec![
            record("b.task-2", 1, "pb"),
            record("a.task-1", 2, "pa2"),
            record("a.task-1", 1, "pa1"),
        ];

        let path = write_manifest(&records, tmp.path(), "e").unwrap();
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["instance_id"], "a.task-1");
        assert_eq!(entries[0]["patch"], "pa1");
        assert_eq!(entries[1]["patch"], "pa2");
        assert_eq!(entries[2]["instance_id"], "b.task-2");
        assert_eq!(entries[0]["prefix"], "e");

        // Re-running replaces the manifest rather than accumulating.
        let fewer = vec![record("c.task-9", 1, "pc")];
        write_manifest(&fewer, tmp.path(), "e").unwrap();
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["instance_id"], "c.task-9");
    }

    #[test]
    fn test_read_records_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut errored = record("b.task-2", 1, "");
        errored.error = Some("sandbox exploded".to_string());
        errored.exit_code = -1;

        write_attempt(&record("a.task-1", 2, "p2"), tmp.path(), "e").unwrap();
        write_attempt(&record("a.task-1", 1, "p1"), tmp.path(), "e").unwrap();
        write_attempt(&errored, tmp.path(), "e").unwrap();

        let records = read_records(tmp.path(), "e").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].instance_id, "a.task-1");
        assert_eq!(records[0].attempt, 1);
        assert_eq!(records[0].patch, "p1");
        assert_eq!(records[1].attempt, 2);
        assert_eq!(records[2].instance_id, "b.task-2");
        assert_eq!(records[2].error.as_deref(), Some("sandbox exploded"));
        assert_eq!(records[2].exit_code, -1);
    }

    #[test]
    fn test_persisting_observer_swallows_write_failure() {
        // Point the observer at a path that cannot be created.
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let observer = PersistingObserver::new(&blocker, "e");
        // Must not panic; the failure is logged and dropped.
        observer.on_result(&record("repo.task-1", 1, "p"));
    }
}
