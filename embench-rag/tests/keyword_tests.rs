use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use embench_rag::{
    CachedKeywordExtractor, KeywordExtractor, LlmKeywordExtractor, RagError, RegexKeywordExtractor,
    Result, TextGenerator,
};

/// Replies with a fixed text after an optional delay.
struct ScriptedGenerator {
    reply: Result<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Self {
        Self { reply: Ok(reply.to_string()), delay: Duration::ZERO, calls: AtomicUsize::new(0) }
    }

    fn failing() -> Self {
        Self {
            reply: Err(RagError::Generation {
                provider: "scripted".to_string(),
                message: "503 Service Unavailable".to_string(),
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(reply: &str, delay: Duration) -> Self {
        Self { delay, ..Self::replying(reply) }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(RagError::Generation { provider: "scripted".to_string(), message: e.to_string() }),
        }
    }
}

#[tokio::test]
async fn llm_keywords_are_used_when_available() {
    let extractor = LlmKeywordExtractor::new(Arc::new(ScriptedGenerator::replying("대출, 금리\n상환")));
    let keywords = extractor.extract("대출 금리와 상환 방법을 알려주세요").await;
    assert_eq!(keywords, ["대출", "금리", "상환"]);
}

#[tokio::test]
async fn generator_failure_falls_back_to_tokenizer() {
    let extractor = LlmKeywordExtractor::new(Arc::new(ScriptedGenerator::failing()));
    let keywords = extractor.extract("Deposit Support").await;
    assert_eq!(keywords, RegexKeywordExtractor::tokenize("Deposit Support"));
}

#[tokio::test]
async fn unparsable_reply_falls_back_to_tokenizer() {
    let extractor = LlmKeywordExtractor::new(Arc::new(ScriptedGenerator::replying(" ,\n- ")));
    assert_eq!(extractor.extract("loan rate").await, ["loan", "rate"]);
}

#[tokio::test(start_paused = true)]
async fn slow_generator_times_out_and_falls_back() {
    let generator = Arc::new(ScriptedGenerator::slow("never used", Duration::from_secs(60)));
    let extractor = LlmKeywordExtractor::new(generator.clone());
    assert_eq!(extractor.timeout(), Duration::from_secs(10));

    let started = tokio::time::Instant::now();
    let keywords = extractor.extract("loan rate").await;

    assert_eq!(keywords, ["loan", "rate"]);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(60), "{waited:?}");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_returns_identical_results_without_calling_inner() {
    let generator = Arc::new(ScriptedGenerator::replying("loan, rate"));
    let cached = CachedKeywordExtractor::new(Arc::new(LlmKeywordExtractor::new(generator.clone())));

    let first = cached.extract("what is the loan rate").await;
    let second = cached.extract("what is the loan rate").await;

    assert_eq!(first, second);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cached.len().await, 1);
}

#[tokio::test]
async fn cache_is_bounded() {
    let cached = CachedKeywordExtractor::with_capacity(Arc::new(RegexKeywordExtractor), 2);
    for text in ["one text", "two text", "three text"] {
        cached.extract(text).await;
    }
    assert_eq!(cached.len().await, 2);
}

/// Always returns the same keywords.
struct FixedExtractor(&'static [&'static str]);

#[async_trait]
impl KeywordExtractor for FixedExtractor {
    async fn extract(&self, _text: &str) -> Vec<String> {
        self.0.iter().map(|k| k.to_string()).collect()
    }
}

#[tokio::test(start_paused = true)]
async fn every_failure_path_uses_the_configured_fallback() {
    let generators = [
        ScriptedGenerator::failing(),
        ScriptedGenerator::replying(" ,\n- "),
        ScriptedGenerator::slow("late, reply", Duration::from_secs(60)),
    ];
    for generator in generators {
        let extractor = LlmKeywordExtractor::new(Arc::new(generator))
            .with_fallback(Arc::new(FixedExtractor(&["fallback"])));
        assert_eq!(extractor.extract("loan rate").await, ["fallback"]);
    }
}
