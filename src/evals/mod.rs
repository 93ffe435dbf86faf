//! Pass@k scoring over completed attempt sets.
//!
//! Scoring consumes an explicit per-attempt success boolean supplied by an
//! external test-evaluation step ([`Verdicts`]); an attempt's exit status
//! is never treated as task success. Attempts are exchangeable, so only the
//! count of successes per instance matters.

pub mod pass_at_k;
pub mod report;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::harness::AttemptRecord;

pub use pass_at_k::estimate_pass_at_k;
pub use report::{render_summary_table, save_summary_json, summary_json};

/// External success signal per (instance, attempt).
///
/// Loaded from the JSON output of a test-evaluation run:
/// `{ "<instance_id>": { "<attempt>": true, ... }, ... }`.
/// A missing entry counts the attempt as unsuccessful, not as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verdicts(BTreeMap<String, BTreeMap<u32, bool>>);

impl Verdicts {
    /// Loads verdicts from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Marks one attempt as resolved or not.
    pub fn set(&mut self, instance_id: &str, attempt: u32, resolved: bool) {
        self.0
            .entry(instance_id.to_string())
            .or_default()
            .insert(attempt, resolved);
    }

    /// Whether the given attempt passed the external evaluation.
    pub fn resolved(&self, instance_id: &str, attempt: u32) -> bool {
        self.0
            .get(instance_id)
            .and_then(|attempts| attempts.get(&attempt))
            .copied()
            .unwrap_or(false)
    }
}

/// Group attempt records into per-instance success lists.
///
/// Every record counts as one attempt; its success comes from the external
/// verdicts. Errored attempts therefore score as failures without being
/// dropped from `n`.
pub fn successes_by_instance(
    records: &[AttemptRecord],
    verdicts: &Verdicts,
) -> BTreeMap<String, Vec<bool>> {
    let mut grouped: BTreeMap<String, Vec<bool>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.instance_id.clone())
            .or_default()
            .push(verdicts.resolved(&record.instance_id, record.attempt));
    }
    grouped
}

/// Per-instance derived statistic. Pure function of (n, c, k).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassAtKResult {
    pub instance_id: String,
    /// Attempts completed for this instance (`n`).
    pub attempts: u64,
    /// Successful attempts (`c`).
    pub successes: u64,
    pub pass_at_1: f64,
    pub pass_at_k: f64,
    /// True iff at least one attempt succeeded.
    pub solved: bool,
}

/// Aggregate pass@k statistics plus run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassAtKSummary {
    pub model: String,
    pub dataset: String,
    pub agent: String,
    pub k: u64,
    pub n_tasks: usize,
    pub total_runs: u64,
    pub duration_seconds: f64,
    pub aggregate_pass_at_1: f64,
    pub aggregate_pass_at_k: f64,
    pub per_instance: Vec<PassAtKResult>,
}

/// Run metadata carried into the summary.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub model: String,
    pub dataset: String,
    pub agent: String,
    pub k: u64,
    pub duration_seconds: f64,
}

/// Compute per-instance and aggregate pass@1 / pass@k.
///
/// Aggregates are unweighted means over instances; an empty instance set
/// yields 0.0 aggregates and `n_tasks = 0` rather than a division error.
pub fn compute_summary(
    results_by_instance: &BTreeMap<String, Vec<bool>>,
    meta: RunMeta,
) -> PassAtKSummary {
    let per_instance: Vec<PassAtKResult> = results_by_instance
        .iter()
        .map(|(instance_id, results)| {
            let n = results.len() as u64;
            let c = results.iter().filter(|&&b| b).count() as u64;
            PassAtKResult {
                instance_id: instance_id.clone(),
                attempts: n,
                successes: c,
                pass_at_1: estimate_pass_at_k(n, c, 1),
                pass_at_k: estimate_pass_at_k(n, c, meta.k),
                solved: c > 0,
            }
        })
        .collect();

    let n_tasks = per_instance.len();
    let mean = |f: fn(&PassAtKResult) -> f64| {
        if n_tasks == 0 {
            0.0
        } else {
            per_instance.iter().map(f).sum::<f64>() / n_tasks as f64
        }
    };

    PassAtKSummary {
        model: meta.model,
        dataset: meta.dataset,
        agent: meta.agent,
        k: meta.k,
        n_tasks,
        total_runs: per_instance.iter().map(|r| r.attempts).sum(),
        duration_seconds: meta.duration_seconds,
        aggregate_pass_at_1: mean(|r| r.pass_at_1),
        aggregate_pass_at_k: mean(|r| r.pass_at_k),
        per_instance,
    }
}
