use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Compare Korean sentence-embedding models on a shared retrieval corpus.
#[derive(Parser, Debug)]
#[command(name = "embench", version, about)]
pub struct Cli {
    /// JSON corpus snapshot with chunks and per-model vectors
    #[arg(long, env = "EMBENCH_CORPUS", conflicts_with = "database_url")]
    pub corpus: Option<PathBuf>,

    /// PostgreSQL URL of a pgvector database (requires the `pgvector` feature)
    #[arg(long, env = "EMBENCH_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, env = "EMBENCH_ENCODER_URL")]
    pub encoder_url: String,

    /// Bearer token for the embeddings API
    #[arg(long, env = "EMBENCH_ENCODER_API_KEY", hide_env_values = true)]
    pub encoder_api_key: Option<String>,

    /// JSON file with evaluation queries (default: built-in banking questions)
    #[arg(long)]
    pub queries: Option<PathBuf>,

    /// Report path (default: embench_report_<timestamp>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub reranking: RerankingArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Models evaluated at the same time
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a single model
    Model {
        /// Registered model id, e.g. BAAI/bge-m3
        #[arg(long)]
        model: String,

        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Rerank the candidates before measuring
        #[arg(long)]
        reranking: bool,
    },
    /// Evaluate every registered model without reranking
    All {
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Evaluate every registered model with and without reranking
    Reranking {
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

/// Blend weights of the rerankers combined for reranked runs.
#[derive(Args, Debug, Clone)]
pub struct RerankingArgs {
    #[arg(long, default_value_t = 0.3)]
    pub keyword_weight: f64,

    #[arg(long, default_value_t = 0.1)]
    pub length_weight: f64,

    #[arg(long, default_value_t = 0.1)]
    pub position_weight: f64,

    #[arg(long, default_value_t = 0.4)]
    pub semantic_weight: f64,

    /// Content length (in characters) preferred by the length reranker
    #[arg(long, default_value_t = 200)]
    pub ideal_length: usize,
}

#[derive(Args, Debug)]
pub struct LlmArgs {
    /// Extract keywords with an LLM instead of the tokenizer
    #[arg(long, requires_all = ["llm_url", "llm_model"])]
    pub llm_keywords: bool,

    /// Base URL of an OpenAI-compatible chat completions API
    #[arg(long, env = "EMBENCH_LLM_URL")]
    pub llm_url: Option<String>,

    #[arg(long, env = "EMBENCH_LLM_MODEL")]
    pub llm_model: Option<String>,

    #[arg(long, env = "EMBENCH_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,
}

impl Command {
    pub fn top_k(&self) -> usize {
        match self {
            Self::Model { top_k, .. } | Self::All { top_k } | Self::Reranking { top_k } => *top_k,
        }
    }

    pub fn needs_reranker(&self) -> bool {
        matches!(self, Self::Model { reranking: true, .. } | Self::Reranking { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_single_model_run() {
        let cli = Cli::try_parse_from([
            "embench",
            "--corpus",
            "corpus.json",
            "--encoder-url",
            "http://localhost:8080/v1",
            "model",
            "--model",
            "BAAI/bge-m3",
            "--top-k",
            "3",
            "--reranking",
        ])
        .unwrap();
        assert!(cli.command.needs_reranker());
        assert_eq!(cli.command.top_k(), 3);
        assert_eq!(cli.reranking.keyword_weight, 0.3);
    }

    #[test]
    fn llm_keywords_require_endpoint_and_model() {
        let parsed = Cli::try_parse_from([
            "embench",
            "--encoder-url",
            "http://e",
            "--llm-keywords",
            "all",
        ]);
        assert!(parsed.is_err());
    }
}
