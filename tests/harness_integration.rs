//! End-to-end tests for the batch harness: orchestration, streaming
//! persistence, and pass@k scoring over the written results.
//!
//! The agent is a scripted in-process runner, so these run without any
//! real agent or sandbox.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use swe_anvil::agents::{AgentConfig, AgentKind, AgentRunner};
use swe_anvil::dataset::TaskInstance;
use swe_anvil::error::RunnerError;
use swe_anvil::evals::{
    compute_summary, successes_by_instance, summary_json, RunMeta, Verdicts,
};
use swe_anvil::harness::{
    read_records, run_batch, write_manifest, AttemptOutcome, PersistingObserver,
};

/// Runner that fails every attempt for the listed instances.
struct ScriptedRunner {
    failing: Vec<&'static str>,
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run_attempt(
        &self,
        instance: &TaskInstance,
        _config: &AgentConfig,
        _model: &str,
    ) -> Result<AttemptOutcome, RunnerError> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        if self.failing.contains(&instance.instance_id.as_str()) {
            return Err(RunnerError::ExecutionFailed("agent crashed".to_string()));
        }
        Ok(AttemptOutcome::completed(
            0,
            format!("diff for {}", instance.instance_id),
        ))
    }
}

fn instances(n: usize) -> Vec<TaskInstance> {
    (1..=n)
        .map(|i| TaskInstance {
            instance_id: format!("my-repo.task-{i}"),
            repo: "owner/my-repo".to_string(),
            prompt: "make the tests pass".to_string(),
            base_commit: "abc123".to_string(),
        })
        .collect()
}

fn config() -> AgentConfig {
    AgentConfig::new(AgentKind::Custom, "agent")
}

#[tokio::test]
async fn batch_with_failures_persists_everything_and_scores_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let eval_id = "custom_gpt-4";
    let instances = instances(10);
    let runner = ScriptedRunner {
        failing: vec!["my-repo.task-3", "my-repo.task-7"],
    };
    let observer = PersistingObserver::new(tmp.path(), eval_id);

    let report = run_batch(
        &instances,
        1,
        &config(),
        "openai/gpt-4",
        3,
        &runner,
        &observer,
    )
    .await;

    // Exactly 10 results, exactly 2 with errors, batch marked failed.
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.errored, 2);
    assert!(!report.is_success());

    // Every attempt was persisted as it completed, including errored ones.
    for i in 1..=10 {
        let dir = tmp
            .path()
            .join(eval_id)
            .join("results")
            .join(format!("my-repo.task-{i}"))
            .join("attempt_1");
        assert!(dir.join("result.json").is_file(), "missing {}", dir.display());
        assert!(dir.join("patch.diff").is_file());
    }

    write_manifest(&report.records, tmp.path(), eval_id).unwrap();
    let manifest: Vec<serde_json::Value> = serde_json::from_str(
        &std::fs::read_to_string(tmp.path().join(eval_id).join("patches.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(manifest.len(), 10);

    // External verdicts mark all 8 clean attempts as resolved; the two
    // errored attempts score as failures without being dropped.
    let mut verdicts = Verdicts::default();
    for record in report.records.iter().filter(|r| r.is_clean()) {
        verdicts.set(&record.instance_id, record.attempt, true);
    }
    let summary = compute_summary(
        &successes_by_instance(&report.records, &verdicts),
        RunMeta {
            model: "openai/gpt-4".to_string(),
            dataset: "my-dataset".to_string(),
            agent: "custom".to_string(),
            k: 1,
            duration_seconds: report.duration.as_secs_f64(),
        },
    );
    assert_eq!(summary.n_tasks, 10);
    assert_eq!(summary.total_runs, 10);
    let solved = summary.per_instance.iter().filter(|r| r.solved).count();
    assert_eq!(solved, 8);
    assert!((summary.aggregate_pass_at_1 - 0.8).abs() < 1e-12);
}

#[tokio::test]
async fn repeated_attempts_never_collide_and_survive_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let eval_id = "custom_gpt-4";
    let instances = instances(2);
    let runner = ScriptedRunner { failing: vec![] };
    let observer = PersistingObserver::new(tmp.path(), eval_id);

    let report = run_batch(
        &instances,
        2,
        &config(),
        "openai/gpt-4",
        4,
        &runner,
        &observer,
    )
    .await;
    assert!(report.is_success());
    assert_eq!(report.records.len(), 4);

    // attempt_1 and attempt_2 are both present and distinct per instance.
    for instance in &instances {
        let base = tmp
            .path()
            .join(eval_id)
            .join("results")
            .join(&instance.instance_id);
        assert!(base.join("attempt_1/patch.diff").is_file());
        assert!(base.join("attempt_2/patch.diff").is_file());
    }

    // Records written during the run reload for offline scoring.
    let reloaded = read_records(tmp.path(), eval_id).unwrap();
    assert_eq!(reloaded.len(), 4);
    assert!(reloaded.iter().all(|r| r.error.is_none()));
    assert!(reloaded
        .iter()
        .any(|r| r.instance_id == "my-repo.task-1" && r.attempt == 2));
}

#[tokio::test]
async fn rerun_with_same_eval_id_overwrites_prior_results() {
    let tmp = tempfile::tempdir().unwrap();
    let eval_id = "custom_gpt-4";
    let instances = instances(1);
    let observer = PersistingObserver::new(tmp.path(), eval_id);

    let runner = ScriptedRunner {
        failing: vec!["my-repo.task-1"],
    };
    let first = run_batch(
        &instances,
        1,
        &config(),
        "openai/gpt-4",
        1,
        &runner,
        &observer,
    )
    .await;
    write_manifest(&first.records, tmp.path(), eval_id).unwrap();

    let runner = ScriptedRunner { failing: vec![] };
    let second = run_batch(
        &instances,
        1,
        &config(),
        "openai/gpt-4",
        1,
        &runner,
        &observer,
    )
    .await;
    write_manifest(&second.records, tmp.path(), eval_id).unwrap();

    let reloaded = read_records(tmp.path(), eval_id).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded[0].error.is_none(), "stale errored result survived");
}

#[test]
fn summary_json_matches_schema_for_empty_run() {
    let summary = compute_summary(
        &BTreeMap::new(),
        RunMeta {
            model: "openai/gpt-4".to_string(),
            dataset: "my-dataset".to_string(),
            agent: "mini-swe-agent".to_string(),
            k: 5,
            duration_seconds: 0.0,
        },
    );
    let json = summary_json(&summary);
    assert_eq!(json["metadata"]["n_tasks"], 0);
    assert_eq!(json["aggregate"]["pass_at_1"], 0.0);
    assert_eq!(json["aggregate"]["pass_at_5"], 0.0);
    assert!(json["per_instance"].as_object().unwrap().is_empty());

    // A written summary parses back to the same shape.
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("summary.json");
    swe_anvil::evals::save_summary_json(&summary, &path).unwrap();
    let reread: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reread, json);
}

#[test]
fn verdicts_boundary_is_explicit_not_exit_code() {
    // A clean exit code without a verdict still scores as unsuccessful.
    let record = swe_anvil::harness::AttemptRecord {
        instance_id: "my-repo.task-1".to_string(),
        attempt: 1,
        exit_code: 0,
        patch: "diff".to_string(),
        error: None,
        duration_secs: 1.0,
        completed_at: chrono::Utc::now(),
    };
    let grouped = successes_by_instance(&[record], &Verdicts::default());
    assert_eq!(grouped["my-repo.task-1"], vec![false]);
}
