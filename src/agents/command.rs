//! Command-based agent runner.
//!
//! Invokes the configured agent as an external process. The agent's own
//! reasoning loop, sandbox provisioning and provider throttling all live
//! behind this command; the harness only supplies the instance, the model
//! and a timeout, and reads the candidate patch back from stdout.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{provider_env_var_from_model, AgentConfig, AgentRunner};
use crate::dataset::TaskInstance;
use crate::error::RunnerError;
use crate::harness::AttemptOutcome;

/// Runs agent attempts by spawning the configured command.
///
/// The command is invoked as
/// `<command> --instance <id> --repo <repo> --prompt <prompt> --model <model>`
/// with the provider API key env var name exported as `PROVIDER_API_KEY_VAR`
/// so wrappers can resolve the right credential.
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRunner for CommandRunner {
    async fn run_attempt(
        &self,
        instance: &TaskInstance,
        config: &AgentConfig,
        model: &str,
    ) -> Result<AttemptOutcome, RunnerError> {
        let mut parts = config.command.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            RunnerError::ExecutionFailed(format!(
                "agent '{}' has an empty command",
                config.kind
            ))
        })?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .arg("--instance")
            .arg(&instance.instance_id)
            .arg("--repo")
            .arg(&instance.repo)
            .arg("--prompt")
            .arg(&instance.prompt)
            .arg("--model")
            .arg(model);
        if !instance.base_commit.is_empty() {
            cmd.arg("--base-commit").arg(&instance.base_commit);
        }
        if let Ok(env_var) = provider_env_var_from_model(model) {
            cmd.env("PROVIDER_API_KEY_VAR", env_var);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            instance_id = %instance.instance_id,
            agent = %config.kind,
            model,
            "Spawning agent attempt"
        );

        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let output = tokio::time::timeout(config.attempt_timeout, child.wait_with_output())
            .await
            .map_err(|_| RunnerError::Timeout(config.attempt_timeout.as_secs()))??;

        let exit_code = output.status.code().unwrap_or(-1);
        let patch = String::from_utf8_lossy(&output.stdout).to_string();

        debug!(
            instance_id = %instance.instance_id,
            exit_code,
            patch_bytes = patch.len(),
            "Agent attempt finished"
        );

        if exit_code == 0 || !patch.trim().is_empty() {
            Ok(AttemptOutcome::completed(exit_code, patch))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.chars().rev().take(500).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            Ok(AttemptOutcome {
                exit_code,
                patch,
                error: Some(format!("agent exited with code {exit_code}: {tail}")),
            })
        }
    }
}
