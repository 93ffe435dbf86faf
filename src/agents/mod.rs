//! Agent registry and the runner seam.
//!
//! The catalog of known agents is an explicit immutable mapping built once
//! at process start and passed by reference into the orchestrator. Each
//! entry is a validated [`AgentConfig`] with named fields and explicit
//! defaults; the [`AgentRunner`] trait is the boundary behind which the
//! agent's own reasoning loop and sandbox live.

pub mod command;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dataset::TaskInstance;
use crate::error::{ConfigError, RunnerError};
use crate::harness::AttemptOutcome;

pub use command::CommandRunner;

/// Named agent variants known to the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// mini-swe-agent (single-loop agent, one shell action per step).
    MiniSweAgent,
    /// SWE-agent (full ACI-based agent).
    SweAgent,
    /// Custom agent invoked via a user-supplied command.
    Custom,
}

impl AgentKind {
    /// Returns the registry key for this agent.
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::MiniSweAgent => "mini-swe-agent",
            AgentKind::SweAgent => "swe-agent",
            AgentKind::Custom => "custom",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mini-swe-agent" | "mini" => Ok(AgentKind::MiniSweAgent),
            "swe-agent" | "sweagent" => Ok(AgentKind::SweAgent),
            "custom" => Ok(AgentKind::Custom),
            other => Err(ConfigError::UnknownAgent(other.to_string())),
        }
    }
}

/// Invocation parameters for one agent variant.
///
/// Read-only after construction; validated on catalog build.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Which agent this config drives.
    pub kind: AgentKind,
    /// Command used to launch one attempt.
    pub command: String,
    /// Hard timeout for a single attempt. Enforced by the runner, not the
    /// orchestrator.
    pub attempt_timeout: Duration,
    /// Suggested worker bound when the caller does not pass one.
    pub default_workers: usize,
}

impl AgentConfig {
    /// Creates a config with the given command and the standard defaults.
    pub fn new(kind: AgentKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            attempt_timeout: Duration::from_secs(1800),
            default_workers: 4,
        }
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the suggested worker bound.
    pub fn with_default_workers(mut self, workers: usize) -> Self {
        self.default_workers = workers;
        self
    }

    /// Validates the config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::InvalidAgentConfig {
                agent: self.kind.name().to_string(),
                reason: "command is empty".to_string(),
            });
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::InvalidAgentConfig {
                agent: self.kind.name().to_string(),
                reason: "attempt timeout is zero".to_string(),
            });
        }
        if self.default_workers == 0 {
            return Err(ConfigError::InvalidAgentConfig {
                agent: self.kind.name().to_string(),
                reason: "default worker count is zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Immutable mapping of agent name to config.
///
/// Built once in `main` and passed by reference; never ambient global state.
#[derive(Debug)]
pub struct AgentCatalog {
    entries: BTreeMap<AgentKind, AgentConfig>,
}

impl AgentCatalog {
    /// Builds the catalog of built-in agents.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for config in [
            AgentConfig::new(AgentKind::MiniSweAgent, "mini-swe-agent")
                .with_default_workers(8),
            AgentConfig::new(AgentKind::SweAgent, "sweagent run")
                .with_timeout(Duration::from_secs(3600)),
            AgentConfig::new(AgentKind::Custom, "agent"),
        ] {
            entries.insert(config.kind, config);
        }
        Self { entries }
    }

    /// Looks up the config for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAgent`] if the agent is not registered,
    /// or the config's own validation error.
    pub fn get(&self, kind: AgentKind) -> Result<&AgentConfig, ConfigError> {
        let config = self
            .entries
            .get(&kind)
            .ok_or_else(|| ConfigError::UnknownAgent(kind.name().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the registered agent names.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().map(|k| k.name()).collect()
    }
}

/// Derive a filesystem-safe model id from a provider-qualified model string.
///
/// `openai/gpt-4:nitro` becomes `gpt-4_nitro`: the last `/` segment with
/// `:` replaced, so the id is usable in directory names.
pub fn model_id_from_model(model: &str) -> Result<String, ConfigError> {
    match model.rsplit('/').next() {
        Some(tail) if !tail.is_empty() => Ok(tail.replace(':', "_")),
        _ => Err(ConfigError::InvalidModel(model.to_string())),
    }
}

/// Derive the provider API key environment variable from a model string.
///
/// `openai/gpt-4` becomes `$OPENAI_API_KEY`; non-alphanumeric characters in
/// the provider segment map to `_`.
pub fn provider_env_var_from_model(model: &str) -> Result<String, ConfigError> {
    let provider = model.split('/').next().unwrap_or("");
    let safe: String = provider
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    let name = safe.trim_matches('_');
    if name.is_empty() {
        return Err(ConfigError::InvalidModel(model.to_string()));
    }
    Ok(format!("${name}_API_KEY"))
}

/// Identifier under which one (agent, model) evaluation is persisted.
pub fn eval_id(kind: AgentKind, model: &str) -> Result<String, ConfigError> {
    Ok(format!("{}_{}", kind.name(), model_id_from_model(model)?))
}

/// Executes one attempt of an agent against one instance.
///
/// Implementations may take minutes and may fail; the orchestrator contains
/// every error at the attempt boundary. The orchestrator's worker bound
/// governs only local concurrency; any throttling the execution provider
/// performs internally is invisible to it.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Runs a single attempt, returning the raw outcome.
    async fn run_attempt(
        &self,
        instance: &TaskInstance,
        config: &AgentConfig,
        model: &str,
    ) -> Result<AttemptOutcome, RunnerError>;
}
