//! CLI command definitions for swe-anvil.
//!
//! `run-evals` loads a dataset, runs every instance `k` times through the
//! configured agent under a bounded worker pool, persists each attempt as
//! it completes, and (given an external verdicts file) scores pass@k.
//! The process exits 0 only if every attempt completed without an error;
//! the report is produced either way.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};

use crate::agents::{self, AgentCatalog, AgentKind, CommandRunner};
use crate::dataset::load_instances;
use crate::evals::{
    compute_summary, render_summary_table, save_summary_json, successes_by_instance, RunMeta,
    Verdicts,
};
use crate::harness::{self, PersistingObserver};

/// Default eval output directory.
const DEFAULT_EVAL_DIR: &str = "./evals";

/// SWE benchmark evaluation harness for AI coding agents.
#[derive(Parser)]
#[command(name = "swe-anvil")]
#[command(about = "Run coding agents against SWE benchmark instances and score pass@k")]
#[command(version)]
#[command(
    long_about = "swe-anvil runs an AI coding agent against every instance of a benchmark \
dataset, with k independent attempts per instance executed concurrently.\n\n\
Each attempt's candidate patch is persisted as it completes; results are scored with the \
exact pass@k estimator.\n\nExample usage:\n  \
swe-anvil run-evals --dataset ./my-dataset --model openai/gpt-4 --attempts 5 --workers 8"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run an agent over a dataset and persist every attempt.
    #[command(name = "run-evals", alias = "run")]
    RunEvals(RunEvalsArgs),

    /// Score a previously written eval directory with a verdicts file.
    Score(ScoreArgs),
}

/// Arguments for `swe-anvil run-evals`.
#[derive(Parser, Debug)]
pub struct RunEvalsArgs {
    /// Dataset path: an instances YAML file or a directory of instance.yaml files.
    #[arg(short = 'd', long)]
    pub dataset: String,

    /// Model identifier in provider/model form (e.g. "openai/gpt-4").
    #[arg(short = 'm', long)]
    pub model: String,

    /// Agent to run (mini-swe-agent, swe-agent, custom).
    #[arg(short = 'a', long, default_value = "mini-swe-agent")]
    pub agent: String,

    /// Independent attempts per instance (the k of pass@k).
    #[arg(short = 'k', long = "attempts", default_value = "1")]
    pub attempts: u32,

    /// Maximum concurrently active attempts. Defaults to the agent's
    /// suggested worker bound.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Output directory for eval results.
    #[arg(short = 'o', long, default_value = DEFAULT_EVAL_DIR)]
    pub output: String,

    /// JSON file of external test-evaluation verdicts. When given, pass@k
    /// is computed and rendered after the batch.
    #[arg(long)]
    pub verdicts: Option<String>,

    /// Print the summary as JSON instead of the table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `swe-anvil score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Eval output directory the batch was written to.
    #[arg(short = 'o', long, default_value = DEFAULT_EVAL_DIR)]
    pub output: String,

    /// Dataset label for the report metadata.
    #[arg(short = 'd', long)]
    pub dataset: String,

    /// Model identifier the batch was run with.
    #[arg(short = 'm', long)]
    pub model: String,

    /// Agent the batch was run with.
    #[arg(short = 'a', long, default_value = "mini-swe-agent")]
    pub agent: String,

    /// The k of pass@k.
    #[arg(short = 'k', long, default_value = "1")]
    pub k: u64,

    /// JSON file of external test-evaluation verdicts.
    #[arg(long)]
    pub verdicts: String,

    /// Print the summary as JSON instead of the table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the swe-anvil CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::RunEvals(args) => run_evals_command(args).await,
        Commands::Score(args) => score_command(args).await,
    }
}

async fn run_evals_command(args: RunEvalsArgs) -> anyhow::Result<()> {
    if args.attempts == 0 {
        return Err(crate::error::ConfigError::ZeroAttempts.into());
    }
    if args.workers == Some(0) {
        return Err(crate::error::ConfigError::ZeroWorkers.into());
    }

    // Configuration errors abort here, before any attempt starts.
    let agent_kind: AgentKind = args.agent.parse()?;
    let catalog = AgentCatalog::builtin();
    let config = catalog.get(agent_kind)?;
    let eval_id = agents::eval_id(agent_kind, &args.model)?;
    let instances = load_instances(Path::new(&args.dataset))?;

    let workers = args.workers.unwrap_or(config.default_workers);
    let eval_dir = PathBuf::from(&args.output);
    std::fs::create_dir_all(eval_dir.join(&eval_id))?;

    info!(
        eval_id = %eval_id,
        instances = instances.len(),
        attempts = args.attempts,
        workers,
        "Starting evaluation"
    );

    let runner = CommandRunner::new();
    let observer = PersistingObserver::new(&eval_dir, &eval_id);
    let report = harness::run_batch(
        &instances,
        args.attempts,
        config,
        &args.model,
        workers,
        &runner,
        &observer,
    )
    .await;

    // The aggregate manifest is best-effort like per-attempt writes:
    // results stay available in memory for scoring either way.
    match harness::write_manifest(&report.records, &eval_dir, &eval_id) {
        Ok(path) => info!(path = %path.display(), "Wrote patches manifest"),
        Err(e) => warn!(error = %e, "Failed to write patches manifest"),
    }

    println!(
        "\nResults: {} completed, {} errored",
        report.completed(),
        report.errored
    );
    println!("Output: {}", eval_dir.join(&eval_id).display());

    if report.errored > 0 {
        println!("\nErrored attempts:");
        for record in report.records.iter().filter(|r| !r.is_clean()) {
            println!(
                "  - {} attempt {}: {}",
                record.instance_id,
                record.attempt,
                record.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if let Some(verdicts_path) = &args.verdicts {
        let verdicts = Verdicts::from_file(Path::new(verdicts_path))?;
        let summary = compute_summary(
            &successes_by_instance(&report.records, &verdicts),
            RunMeta {
                model: args.model.clone(),
                dataset: args.dataset.clone(),
                agent: agent_kind.name().to_string(),
                k: args.attempts as u64,
                duration_seconds: report.duration.as_secs_f64(),
            },
        );
        present_summary(&summary, &eval_dir.join(&eval_id), args.json)?;
    }

    // Exit-code contract: any single attempt error marks the run failed,
    // after all results have been written and reported.
    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} of {} attempts errored",
            report.errored,
            report.records.len()
        ))
    }
}

async fn score_command(args: ScoreArgs) -> anyhow::Result<()> {
    let agent_kind: AgentKind = args.agent.parse()?;
    let eval_id = agents::eval_id(agent_kind, &args.model)?;
    let eval_dir = PathBuf::from(&args.output);

    let records = harness::read_records(&eval_dir, &eval_id)?;
    if records.is_empty() {
        warn!(eval_id = %eval_id, "No attempt records found; the summary will be empty");
    }
    let verdicts = Verdicts::from_file(Path::new(&args.verdicts))?;

    let summary = compute_summary(
        &successes_by_instance(&records, &verdicts),
        RunMeta {
            model: args.model.clone(),
            dataset: args.dataset.clone(),
            agent: agent_kind.name().to_string(),
            k: args.k,
            duration_seconds: records.iter().map(|r| r.duration_secs).sum(),
        },
    );
    present_summary(&summary, &eval_dir.join(&eval_id), args.json)
}

fn present_summary(
    summary: &crate::evals::PassAtKSummary,
    run_dir: &Path,
    as_json: bool,
) -> anyhow::Result<()> {
    let json_path = run_dir.join("summary.json");
    if let Err(e) = save_summary_json(summary, &json_path) {
        warn!(error = %e, "Failed to write summary JSON");
    }

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&crate::evals::summary_json(summary))?
        );
    } else {
        print!("{}", render_summary_table(summary));
        println!("Results: {}", json_path.display());
    }
    Ok(())
}
