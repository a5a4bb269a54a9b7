//! Text embeddings via the Gemini `batchEmbedContents` endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Turns text into fixed-width vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed texts for storage.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Width of every vector this embedder returns.
    fn dimension(&self) -> u64;
}

/// Task hint sent with each request.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

/// [`Embedder`] backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: u64,
    batch_size: usize,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(EmbeddingError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-goog-api-key"),
            HeaderValue::from_str(api_key)
                .map_err(|e| EmbeddingError::ConnectionError(format!("invalid API key: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: normalize_model(&config.model),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1) as usize,
        })
    }

    async fn embed_with_task(
        &self,
        texts: &[String],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.embed_single_batch(batch, task_type).await?;
            all_embeddings.extend(embeddings);
        }
        Ok(all_embeddings)
    }

    async fn embed_single_batch(
        &self,
        texts: &[String],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbeddingError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("RESOURCE_EXHAUSTED") {
                return Err(EmbeddingError::RateLimited);
            }
            return Err(EmbeddingError::ServerError(format!("status {}: {}", status, body)));
        }

        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() as u64 != self.dimension) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "model returned {}-dimensional vectors, configured dimension is {}",
                bad.len(),
                self.dimension
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed_with_task(&texts, TaskType::RetrievalDocument)
            .await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self
            .embed_with_task(&[text.to_string()], TaskType::RetrievalQuery)
            .await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }
}

/// Gemini model names are addressed as `models/<name>`.
pub(crate) fn normalize_model(model: &str) -> String {
    let model = model.trim().trim_matches('/');
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
