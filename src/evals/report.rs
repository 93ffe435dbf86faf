//! Rendering of pass@k summaries.
//!
//! Produces a deterministic fixed-width table for operators and a JSON
//! summary mirroring the same fields for machine consumption.

use std::path::Path;

use regex::Regex;
use tracing::info;

use super::{PassAtKResult, PassAtKSummary};
use crate::error::WriteError;

/// Sort key for per-instance rows: descending success count, then the repo
/// portion of the instance id (before the final `.`, or the whole id)
/// ascending, then the trailing numeric suffix (0 if absent) ascending.
fn row_sort_key(r: &PassAtKResult) -> (i64, String, u64) {
    let repo = match r.instance_id.rsplit_once('.') {
        Some((head, _)) => head.to_string(),
        None => r.instance_id.clone(),
    };
    let task_num = Regex::new(r"(\d+)$")
        .ok()
        .and_then(|re| re.captures(&r.instance_id))
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .unwrap_or(0);
    (-(r.successes as i64), repo, task_num)
}

fn bar(successes: u64, attempts: u64) -> String {
    let fill = if attempts > 0 {
        ((5.0 * successes as f64 / attempts as f64).round() as usize).min(5)
    } else {
        0
    };
    format!("{}{}", "█".repeat(fill), "░".repeat(5 - fill))
}

fn display_name(instance_id: &str) -> String {
    if instance_id.chars().count() > 40 {
        let head: String = instance_id.chars().take(38).collect();
        format!("{head}..")
    } else {
        instance_id.to_string()
    }
}

/// Render the summary as a fixed-width evaluation results table.
pub fn render_summary_table(summary: &PassAtKSummary) -> String {
    let mut out = String::new();
    let line = |out: &mut String, s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    let minutes = (summary.duration_seconds as u64) / 60;
    let seconds = (summary.duration_seconds as u64) % 60;

    line(&mut out, String::new());
    line(&mut out, "═".repeat(75));
    line(&mut out, format!("{:>43}", "EVALUATION RESULTS"));
    line(&mut out, "═".repeat(75));
    line(&mut out, format!("  Model:       {}", summary.model));
    line(&mut out, format!("  Dataset:     {}", summary.dataset));
    line(&mut out, format!("  Agent:       {}", summary.agent));
    line(&mut out, format!("  Tasks:       {}", summary.n_tasks));
    line(
        &mut out,
        format!(
            "  Attempts:    k={} ({} runs, {}m {}s)",
            summary.k, summary.total_runs, minutes, seconds
        ),
    );
    line(&mut out, String::new());
    line(&mut out, "─".repeat(75));
    line(
        &mut out,
        format!("  pass@1:    {:5.1}%", summary.aggregate_pass_at_1 * 100.0),
    );
    if summary.k > 1 {
        let solved = summary.per_instance.iter().filter(|r| r.solved).count();
        line(
            &mut out,
            format!(
                "  pass@{}:    {:5.1}%   ({}/{} solved)",
                summary.k,
                summary.aggregate_pass_at_k * 100.0,
                solved,
                summary.n_tasks
            ),
        );
    }
    line(&mut out, String::new());
    line(&mut out, "─".repeat(75));
    if summary.k > 1 {
        line(
            &mut out,
            format!(
                "  {:<40} {:<12} {:<8} {:<8}",
                "Task",
                "Result",
                "pass@1",
                format!("pass@{}", summary.k)
            ),
        );
    } else {
        line(
            &mut out,
            format!("  {:<40} {:<12} {:<8}", "Task", "Result", "pass@1"),
        );
    }
    line(&mut out, format!("  {}", "─".repeat(71)));

    let mut rows: Vec<&PassAtKResult> = summary.per_instance.iter().collect();
    rows.sort_by_key(|r| row_sort_key(r));

    for r in rows {
        let status = if r.solved { "✓" } else { "✗" };
        if summary.k > 1 {
            line(
                &mut out,
                format!(
                    "  {:<40} {} {}/{:<5} {:3.0}%    {:3.0}%    {}",
                    display_name(&r.instance_id),
                    bar(r.successes, r.attempts),
                    r.successes,
                    r.attempts,
                    r.pass_at_1 * 100.0,
                    r.pass_at_k * 100.0,
                    status
                ),
            );
        } else {
            line(
                &mut out,
                format!(
                    "  {:<40} {} {}/{:<5} {:3.0}%    {}",
                    display_name(&r.instance_id),
                    bar(r.successes, r.attempts),
                    r.successes,
                    r.attempts,
                    r.pass_at_1 * 100.0,
                    status
                ),
            );
        }
    }

    line(&mut out, "═".repeat(75));
    out
}

/// Build the machine-readable summary JSON.
///
/// Schema: `{ metadata, aggregate: { pass_at_1, pass_at_<k> },
/// per_instance: { <instance_id>: { attempts, successes, pass_at_1,
/// pass_at_<k>, solved } } }`.
pub fn summary_json(summary: &PassAtKSummary) -> serde_json::Value {
    use serde_json::{json, Map, Value};

    let k_key = format!("pass_at_{}", summary.k);

    let per_instance: Map<String, Value> = summary
        .per_instance
        .iter()
        .map(|r| {
            let mut row = Map::new();
            row.insert("attempts".to_string(), json!(r.attempts));
            row.insert("successes".to_string(), json!(r.successes));
            row.insert("pass_at_1".to_string(), json!(r.pass_at_1));
            row.insert(k_key.clone(), json!(r.pass_at_k));
            row.insert("solved".to_string(), json!(r.solved));
            (r.instance_id.clone(), Value::Object(row))
        })
        .collect();

    let mut aggregate = Map::new();
    aggregate.insert("pass_at_1".to_string(), json!(summary.aggregate_pass_at_1));
    aggregate.insert(k_key, json!(summary.aggregate_pass_at_k));

    json!({
        "metadata": {
            "model": summary.model,
            "dataset": summary.dataset,
            "agent": summary.agent,
            "k": summary.k,
            "n_tasks": summary.n_tasks,
            "total_runs": summary.total_runs,
            "duration_seconds": summary.duration_seconds,
        },
        "aggregate": aggregate,
        "per_instance": per_instance,
    })
}

/// Write the summary JSON to `path`.
pub fn save_summary_json(summary: &PassAtKSummary, path: &Path) -> Result<(), WriteError> {
    let json = serde_json::to_string_pretty(&summary_json(summary))?;
    std::fs::write(path, json).map_err(|source| WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), "Wrote summary JSON");
    Ok(())
}
