//! Clients for OpenAI-compatible HTTP APIs.
//!
//! This module is only available when the `openai` feature is enabled.
//!
//! - [`OpenAiCompatibleEncoder`] calls `POST {base_url}/embeddings`, which is
//!   served by OpenAI as well as by self-hosted embedding servers such as
//!   Text Embeddings Inference or vLLM.
//! - [`OpenAiChatGenerator`] calls `POST {base_url}/chat/completions` and is
//!   used for LLM keyword extraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{Encoder, check_dimension};
use crate::error::{RagError, Result};
use crate::generation::TextGenerator;
use crate::registry::ModelDescriptor;

const GENERATION_PROVIDER: &str = "openai-compatible";

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pull the most useful message out of an error body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

// ── Embeddings ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// An [`Encoder`] backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// The descriptor's `id` is sent as the `model` field, so one server can host
/// every model under comparison.
///
/// # Example
///
/// ```rust,ignore
/// use embench_rag::OpenAiCompatibleEncoder;
///
/// let encoder = OpenAiCompatibleEncoder::new("http://localhost:8080/v1")
///     .with_api_key("sk-...");
/// let vector = encoder.encode_query("예금 금리", &descriptor).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleEncoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleEncoder {
    /// Create an encoder for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key: None }
    }

    /// Send `api_key` as a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn encoding_error(model: &ModelDescriptor, message: String) -> RagError {
        RagError::Encoding { model: model.id.clone(), message }
    }
}

#[async_trait]
impl Encoder for OpenAiCompatibleEncoder {
    async fn encode_query(&self, text: &str, model: &ModelDescriptor) -> Result<Vec<f32>> {
        debug!(model = %model.id, text_len = text.len(), "encoding query");
        let vectors = self.encode_batch(&[text], model).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| Self::encoding_error(model, "API returned no embedding".to_string()))
    }

    async fn encode_batch(&self, texts: &[&str], model: &ModelDescriptor) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %model.id, batch_size = texts.len(), "encoding batch");

        let mut request = self
            .client
            .post(endpoint(&self.base_url, "embeddings"))
            .json(&EmbeddingRequest { model: &model.id, input: texts });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(model = %model.id, error = %e, "embedding request failed");
            Self::encoding_error(model, format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(model = %model.id, %status, "embedding API error");
            return Err(Self::encoding_error(
                model,
                format!("API returned {status}: {}", error_detail(body)),
            ));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(model = %model.id, error = %e, "failed to parse embedding response");
            Self::encoding_error(model, format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(Self::encoding_error(
                model,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }
        parsed.data.sort_by_key(|d| d.index);

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            check_dimension(model, vector)?;
        }
        Ok(vectors)
    }
}

// ── Chat completions ───────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// A [`TextGenerator`] backed by an OpenAI-compatible `/chat/completions`
/// endpoint. Sends the prompt as a single user message at temperature 0.
#[derive(Debug, Clone)]
pub struct OpenAiChatGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChatGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn generation_error(message: String) -> RagError {
        RagError::Generation { provider: GENERATION_PROVIDER.to_string(), message }
    }
}

#[async_trait]
impl TextGenerator for OpenAiChatGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
        };
        let mut request = self.client.post(endpoint(&self.base_url, "chat/completions")).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::generation_error(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "chat API error");
            return Err(Self::generation_error(format!(
                "API returned {status}: {}",
                error_detail(body)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::generation_error(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Self::generation_error("API returned no completion".to_string()))
    }
}
