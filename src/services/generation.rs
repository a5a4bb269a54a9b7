//! Streaming chat completions via Gemini `streamGenerateContent`.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::{ChatMessage, GenerationConfig, Role};
use crate::services::embedding::normalize_model;

/// Incremental text from the model, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One generation call: system prompt, prior turns, and the new user message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub message: String,
}

/// A language model that streams its answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

/// [`ChatModel`] backed by the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiChatModel {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiChatModel {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(GenerationError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-goog-api-key"),
            HeaderValue::from_str(api_key)
                .map_err(|e| GenerationError::ConnectionError(format!("invalid API key: {e}")))?,
        );

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| GenerationError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: normalize_model(&config.model),
            temperature: config.temperature,
        })
    }

    fn build_request(&self, request: ChatRequest) -> GenerateRequest {
        let mut contents: Vec<Content> = request
            .history
            .into_iter()
            .map(|m| Content {
                role: Some(match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }),
                parts: vec![Part { text: m.content }],
            })
            .collect();
        contents.push(Content {
            role: Some("user"),
            parts: vec![Part {
                text: request.message,
            }],
        });

        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: request.system,
                }],
            },
            contents,
            generation_config: GenerationParams {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let url = format!(
            "{}/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        let body = self.build_request(request);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GenerationError::ConnectionError(e.to_string())
                } else {
                    GenerationError::RequestError(e)
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ServerError(format!("status {}: {}", status, body)));
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => parse_chunk(&event.data).transpose(),
                    Err(e) => Some(Err(GenerationError::StreamError(e.to_string()))),
                }
            });

        Ok(Box::pin(stream))
    }
}

/// Text carried by one SSE `data` payload; `None` when it carries none.
fn parse_chunk(data: &str) -> Result<Option<String>, GenerationError> {
    if data.trim().is_empty() {
        return Ok(None);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| GenerationError::StreamError(e.to_string()))?;

    if let Some(error) = chunk.error {
        if error.code == 429 || error.status == "RESOURCE_EXHAUSTED" {
            return Err(GenerationError::RateLimited);
        }
        return Err(GenerationError::ServerError(format!(
            "{} {}: {}",
            error.code, error.status, error.message
        )));
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .map(|p| p.text)
        .collect();

    Ok((!text.is_empty()).then_some(text))
}
