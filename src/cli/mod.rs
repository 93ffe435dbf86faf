//! Command-line interface for swe-anvil.
//!
//! Provides the `run-evals` batch command and the `score` command for
//! re-scoring a previously written eval directory.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
