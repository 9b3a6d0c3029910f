//! embench - compare embedding models on a retrieval corpus.
//!
//! # Usage
//!
//! ```bash
//! # One model, with reranking
//! embench --corpus corpus.json --encoder-url http://localhost:8080/v1 \
//!     model --model BAAI/bge-m3 --top-k 5 --reranking
//!
//! # Every registered model
//! embench --corpus corpus.json --encoder-url http://localhost:8080/v1 all
//!
//! # Every model with and without reranking, plus the delta report
//! embench --corpus corpus.json --encoder-url http://localhost:8080/v1 reranking
//! ```
//!
//! Exit codes: 0 on success, 1 when a single-model run fails, 2 when the
//! evaluation cannot be set up.

mod cli;
mod setup;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use embench_eval::EvaluationReport;
use embench_rag::ModelRegistry;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

const EXIT_MODEL_FAILED: u8 = 1;
const EXIT_SETUP_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "evaluation setup failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_SETUP_FAILED)
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().with_writer(std::io::stderr).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let registry = ModelRegistry::builtin();
    let store = setup::store(cli, &registry).await?;
    let queries = setup::queries(cli).await?;
    let model_ids = setup::model_ids(&cli.command, &registry);
    let evaluator = setup::evaluator(cli, registry, store)?;

    info!(models = model_ids.len(), queries = queries.len(), "starting evaluation");
    let batch = evaluator.run(&model_ids, &queries).await?;

    let report = EvaluationReport::from_batch(&batch);
    let output = cli.output.clone().unwrap_or_else(default_output);
    report.write_json(&output).await?;
    println!("{}", report.summary);
    println!("Report written to {}", output.display());

    let single_model_failed =
        matches!(cli.command, Command::Model { .. }) && batch.failed().next().is_some();
    if single_model_failed {
        return Ok(ExitCode::from(EXIT_MODEL_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

fn default_output() -> PathBuf {
    PathBuf::from(format!("embench_report_{}.json", chrono::Utc::now().format("%Y%m%d_%H%M%S")))
}
