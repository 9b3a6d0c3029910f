//! Keyword extraction strategies used by the keyword reranker.
//!
//! - [`RegexKeywordExtractor`] - tokenizes runs of letters and digits
//! - [`LlmKeywordExtractor`] - asks a [`TextGenerator`] for keywords, with a
//!   timeout and a tokenizer fallback
//! - [`CachedKeywordExtractor`] - bounded LRU cache keyed by the exact input text
//!
//! Extraction never fails: every strategy degrades to the tokenizer.

use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::generation::TextGenerator;

/// Runs of two or more letters (any script) or digits.
static KEYWORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]{2,}").expect("keyword pattern is valid"));

/// Bullet or numbering prefix of a list item in an LLM reply.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+[.)])\s*").expect("list marker pattern is valid"));

const EXTRACTION_PROMPT: &str = "Extract the most important search keywords from the text \
below. Reply with the keywords only, separated by commas, without explanations.\n\nText:\n";

/// Default bound on the LLM extraction call.
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of cached extractions.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// A strategy for extracting keywords from text.
///
/// Keywords are lower-cased and de-duplicated, in first-seen order.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Extract keywords from `text`. Never fails.
    async fn extract(&self, text: &str) -> Vec<String>;
}

/// Tokenizer-based extraction: contiguous letter/digit runs of length ≥ 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexKeywordExtractor;

impl RegexKeywordExtractor {
    /// Synchronous form of [`KeywordExtractor::extract`].
    pub fn tokenize(text: &str) -> Vec<String> {
        dedup(KEYWORD_PATTERN.find_iter(text).map(|m| m.as_str().to_lowercase()))
    }
}

#[async_trait]
impl KeywordExtractor for RegexKeywordExtractor {
    async fn extract(&self, text: &str) -> Vec<String> {
        Self::tokenize(text)
    }
}

fn dedup(keywords: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        if !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}

/// LLM-based extraction with a bounded wait.
///
/// On timeout, generator failure, or a reply that contains no usable
/// keyword, the fallback extractor (the tokenizer unless replaced) is used
/// instead. Failures are logged, never raised.
pub struct LlmKeywordExtractor {
    generator: Arc<dyn TextGenerator>,
    fallback: Arc<dyn KeywordExtractor>,
    timeout: Duration,
}

impl LlmKeywordExtractor {
    /// Create an extractor with the default 10 second timeout.
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator, fallback: Arc::new(RegexKeywordExtractor), timeout: DEFAULT_LLM_TIMEOUT }
    }

    /// Replace the extractor used when the LLM path fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn KeywordExtractor>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Parse a comma/newline separated keyword reply.
fn parse_keyword_reply(reply: &str) -> Vec<String> {
    dedup(
        reply
            .split([',', '\n', '、'])
            .map(|item| {
                LIST_MARKER
                    .replace(item.trim(), "")
                    .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c.is_whitespace())
                    .to_lowercase()
            })
            .filter(|item| item.chars().count() >= 2),
    )
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn extract(&self, text: &str) -> Vec<String> {
        let prompt = format!("{EXTRACTION_PROMPT}{text}");
        match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await {
            Ok(Ok(reply)) => {
                let keywords = parse_keyword_reply(&reply);
                if keywords.is_empty() {
                    warn!(reply_len = reply.len(), "unparsable keyword reply, using fallback");
                    return self.fallback.extract(text).await;
                }
                debug!(keyword_count = keywords.len(), "extracted keywords with LLM");
                keywords
            }
            Ok(Err(e)) => {
                warn!(error = %e, "LLM keyword extraction failed, using fallback");
                self.fallback.extract(text).await
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "LLM keyword extraction timed out, using fallback");
                self.fallback.extract(text).await
            }
        }
    }
}

/// Caches another extractor's output by exact input text.
///
/// The cache is bounded; the least recently used entry is evicted once
/// `capacity` distinct texts have been seen.
pub struct CachedKeywordExtractor {
    inner: Arc<dyn KeywordExtractor>,
    cache: Mutex<LruCache<String, Vec<String>>>,
}

impl CachedKeywordExtractor {
    /// Wrap `inner` with a cache of [`DEFAULT_CACHE_CAPACITY`] entries.
    pub fn new(inner: Arc<dyn KeywordExtractor>) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner` with a cache of `capacity` entries (at least one).
    pub fn with_capacity(inner: Arc<dyn KeywordExtractor>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner, cache: Mutex::new(LruCache::new(capacity)) }
    }

    /// Number of cached texts.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}

#[async_trait]
impl KeywordExtractor for CachedKeywordExtractor {
    async fn extract(&self, text: &str) -> Vec<String> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            return hit.clone();
        }
        // The lock is released while the inner extractor runs.
        let keywords = self.inner.extract(text).await;
        self.cache.lock().await.put(text.to_string(), keywords.clone());
        keywords
    }
}
