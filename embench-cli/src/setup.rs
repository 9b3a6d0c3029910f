//! Composition root: turns parsed arguments into an [`Evaluator`].

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use embench_eval::{EvalConfig, Evaluator, EvaluationQuery, default_queries, load_queries};
use embench_rag::{
    CachedKeywordExtractor, CombinedReranker, InMemoryVectorStore, KeywordExtractor,
    KeywordReranker, LengthReranker, LlmKeywordExtractor, ModelDescriptor, ModelRegistry,
    OpenAiChatGenerator, OpenAiCompatibleEncoder, PositionReranker, RegexKeywordExtractor,
    Reranker, SemanticReranker, VectorStore,
};
use tracing::info;

use crate::cli::{Cli, Command, LlmArgs, RerankingArgs};

pub async fn store(cli: &Cli, registry: &ModelRegistry) -> Result<Arc<dyn VectorStore>> {
    if let Some(url) = &cli.database_url {
        return pg_store(url).await;
    }
    let Some(path) = &cli.corpus else {
        bail!("either --corpus or --database-url is required");
    };
    let store = InMemoryVectorStore::load_snapshot(path, registry)
        .await
        .with_context(|| format!("failed to load corpus snapshot '{}'", path.display()))?;
    Ok(Arc::new(store))
}

#[cfg(feature = "pgvector")]
async fn pg_store(url: &str) -> Result<Arc<dyn VectorStore>> {
    let store =
        embench_rag::PgVectorStore::new(url).await.context("failed to connect to pgvector")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "pgvector"))]
async fn pg_store(_url: &str) -> Result<Arc<dyn VectorStore>> {
    bail!("--database-url requires embench to be built with the `pgvector` feature")
}

fn keyword_extractor(llm: &LlmArgs) -> Result<Arc<dyn KeywordExtractor>> {
    if !llm.llm_keywords {
        return Ok(Arc::new(CachedKeywordExtractor::new(Arc::new(RegexKeywordExtractor))));
    }
    let (Some(url), Some(model)) = (&llm.llm_url, &llm.llm_model) else {
        bail!("--llm-keywords needs --llm-url and --llm-model");
    };
    let mut generator = OpenAiChatGenerator::new(url.clone(), model.clone());
    if let Some(key) = &llm.llm_api_key {
        generator = generator.with_api_key(key.clone());
    }
    info!(llm_url = %url, llm_model = %model, "using LLM keyword extraction");
    let extractor = LlmKeywordExtractor::new(Arc::new(generator));
    Ok(Arc::new(CachedKeywordExtractor::new(Arc::new(extractor))))
}

/// The four rerankers combined for reranked runs. Each is weighted in the
/// combination by its own blend weight.
struct RerankerPlan {
    encoder: Arc<OpenAiCompatibleEncoder>,
    keyword: Arc<dyn Reranker>,
    length: Arc<dyn Reranker>,
    position: Arc<dyn Reranker>,
    args: RerankingArgs,
}

impl RerankerPlan {
    fn new(
        args: &RerankingArgs,
        extractor: Arc<dyn KeywordExtractor>,
        encoder: Arc<OpenAiCompatibleEncoder>,
    ) -> Result<Self> {
        Ok(Self {
            keyword: Arc::new(KeywordReranker::new(extractor, args.keyword_weight)?),
            length: Arc::new(LengthReranker::new(args.ideal_length, args.length_weight)?),
            position: Arc::new(PositionReranker::new(args.position_weight)?),
            encoder,
            args: args.clone(),
        })
    }

    /// The semantic reranker re-embeds with the model under evaluation.
    fn for_model(&self, model: &ModelDescriptor) -> embench_rag::Result<Arc<dyn Reranker>> {
        let semantic: Arc<dyn Reranker> = Arc::new(
            SemanticReranker::new(self.encoder.clone(), model.clone())
                .with_weight(self.args.semantic_weight)?,
        );
        let combined = CombinedReranker::new(vec![
            (self.keyword.clone(), self.args.keyword_weight),
            (self.length.clone(), self.args.length_weight),
            (self.position.clone(), self.args.position_weight),
            (semantic, self.args.semantic_weight),
        ])?;
        Ok(Arc::new(combined))
    }
}

pub fn evaluator(
    cli: &Cli,
    registry: ModelRegistry,
    store: Arc<dyn VectorStore>,
) -> Result<Evaluator> {
    let mut encoder = OpenAiCompatibleEncoder::new(cli.encoder_url.clone());
    if let Some(key) = &cli.encoder_api_key {
        encoder = encoder.with_api_key(key.clone());
    }
    let encoder = Arc::new(encoder);

    let config = EvalConfig::builder()
        .top_k(cli.command.top_k())
        .use_reranking(matches!(cli.command, Command::Model { reranking: true, .. }))
        .compare_reranking(matches!(cli.command, Command::Reranking { .. }))
        .model_concurrency(cli.concurrency)
        .build()?;

    let probe = registry.descriptors().first().cloned();
    let mut builder = Evaluator::builder()
        .registry(registry)
        .encoder(encoder.clone())
        .store(store)
        .config(config);

    if cli.command.needs_reranker() {
        let plan = RerankerPlan::new(&cli.reranking, keyword_extractor(&cli.llm)?, encoder)?;
        if let Some(model) = &probe {
            // Surface invalid weights before any model runs.
            plan.for_model(model)?;
        }
        builder = builder.reranker_factory(Arc::new(move |model: &ModelDescriptor| {
            plan.for_model(model)
        }));
    }
    Ok(builder.build()?)
}

pub async fn queries(cli: &Cli) -> Result<Vec<EvaluationQuery>> {
    match &cli.queries {
        Some(path) => Ok(load_queries(path).await?),
        None => Ok(default_queries()),
    }
}

pub fn model_ids(command: &Command, registry: &ModelRegistry) -> Vec<String> {
    match command {
        Command::Model { model, .. } => vec![model.clone()],
        Command::All { .. } | Command::Reranking { .. } => {
            registry.ids().map(str::to_string).collect()
        }
    }
}
