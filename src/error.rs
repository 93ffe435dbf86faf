//! Error types for swe-anvil operations.
//!
//! Errors are split by propagation policy:
//! - [`ConfigError`] is raised before any attempt starts and aborts the run.
//! - [`RunnerError`] is contained at the attempt boundary and downgraded to
//!   a failed attempt record; it never aborts the batch.
//! - [`WriteError`] is logged by the persisting observer; a failed write
//!   never removes a result from in-memory scoring.

use thiserror::Error;

/// Errors raised during run configuration, before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown agent '{0}': not present in the agent catalog")]
    UnknownAgent(String),

    #[error("Invalid model identifier '{0}'")]
    InvalidModel(String),

    #[error("Dataset path does not exist: {0}")]
    DatasetNotFound(String),

    #[error("No instances found in dataset '{0}'")]
    EmptyDataset(String),

    #[error("Duplicate instance id '{0}' in dataset")]
    DuplicateInstance(String),

    #[error("Invalid agent config for '{agent}': {reason}")]
    InvalidAgentConfig { agent: String, reason: String },

    #[error("Attempts per instance must be at least 1")]
    ZeroAttempts,

    #[error("Worker count must be at least 1")]
    ZeroWorkers,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a single agent attempt.
///
/// These never escape the orchestrator: each one is converted into an
/// attempt record carrying the error text.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn agent command '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Agent timed out after {0}s")]
    Timeout(u64),

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while persisting attempt results or the patches manifest.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
