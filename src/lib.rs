//! swe-anvil: agent evaluation harness for SWE benchmark instances.
//!
//! This library runs AI coding agents against benchmark task instances,
//! persists each attempt's candidate patch as it completes, and scores
//! the resulting attempts with the pass@k reliability estimator.

// Core modules
pub mod agents;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod evals;
pub mod harness;

// Re-export commonly used error types
pub use error::{ConfigError, RunnerError, WriteError};
