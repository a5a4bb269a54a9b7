//! Retrieval-augmented answers: retrieve from both collections, then stream the model's reply.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::{Value, json};

use crate::error::ChatError;
use crate::models::{ChatMessage, RetrievedChunk};
use crate::services::embedding::Embedder;
use crate::services::generation::{ChatModel, ChatRequest, TokenStream};
use crate::services::vector_store::SharedVectorStore;
use crate::{debug_event, log_event};

pub const RATE_LIMIT_MESSAGE: &str = "API rate limit exceeded. Please try again later.";
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred.";

/// One server-sent event of a chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message { content: String, error: bool },
    End,
}

impl ChatEvent {
    pub fn message(content: impl Into<String>) -> Self {
        ChatEvent::Message {
            content: content.into(),
            error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        ChatEvent::Message {
            content: content.into(),
            error: true,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Message { .. } => "message",
            ChatEvent::End => "end",
        }
    }

    /// SSE data payload: `{"content": ..}` plus `"error": true` on failure, `{}` at the end.
    pub fn data(&self) -> Value {
        match self {
            ChatEvent::Message {
                content,
                error: false,
            } => json!({ "content": content }),
            ChatEvent::Message {
                content,
                error: true,
            } => json!({ "content": content, "error": true }),
            ChatEvent::End => json!({}),
        }
    }

    fn from_failure(error: &ChatError) -> Self {
        if error.is_rate_limited() {
            ChatEvent::error(RATE_LIMIT_MESSAGE)
        } else {
            ChatEvent::error(GENERIC_ERROR_MESSAGE)
        }
    }
}

pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// The instructions the model sees ahead of the conversation.
pub fn system_prompt(persona: &str, context: &str) -> String {
    format!(
        "{persona}\n\nYou are a helpful AI assistant. Answer based ONLY on the context provided below.\n\nContext:\n{context}"
    )
}

/// Knowledge-base passages first, then chat-history passages, separated by blank lines.
pub fn build_context(knowledge: &[RetrievedChunk], history: &[RetrievedChunk]) -> String {
    knowledge
        .iter()
        .chain(history)
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Clone)]
pub struct Responder {
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    knowledge_base: SharedVectorStore,
    chat_history: SharedVectorStore,
    top_k: u64,
}

impl Responder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        knowledge_base: SharedVectorStore,
        chat_history: SharedVectorStore,
        top_k: u64,
    ) -> Self {
        Self {
            embedder,
            model,
            knowledge_base,
            chat_history,
            top_k,
        }
    }

    /// Answer `message`. The stream always finishes with [`ChatEvent::End`]; failures become a
    /// single error message just before it. Nothing is retried.
    pub fn respond(
        &self,
        persona: String,
        history: Vec<ChatMessage>,
        message: String,
    ) -> ChatEventStream {
        let this = self.clone();

        let stream = async_stream::stream! {
            match this.start(persona, history, message).await {
                Ok(mut tokens) => {
                    while let Some(item) = tokens.next().await {
                        match item {
                            Ok(text) if text.is_empty() => {}
                            Ok(text) => yield ChatEvent::message(text),
                            Err(e) => {
                                let error = ChatError::from(e);
                                tracing::warn!("[chat] generation failed: {error}");
                                yield ChatEvent::from_failure(&error);
                                break;
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!("[chat] request failed: {error}");
                    yield ChatEvent::from_failure(&error);
                }
            }
            yield ChatEvent::End;
        };

        Box::pin(stream)
    }

    /// Retrieve context and open the model stream.
    async fn start(
        &self,
        persona: String,
        history: Vec<ChatMessage>,
        message: String,
    ) -> Result<TokenStream, ChatError> {
        let context = self.retrieve(&message).await?;
        let request = ChatRequest {
            system: system_prompt(&persona, &context),
            history,
            message,
        };
        Ok(self.model.stream_chat(request).await?)
    }

    /// Embed the query once and search both collections concurrently.
    pub async fn retrieve(&self, query: &str) -> Result<String, ChatError> {
        let vector = self.embedder.embed_query(query).await?;

        let (knowledge, history) = tokio::join!(
            self.knowledge_base.search(vector.clone(), self.top_k),
            self.chat_history.search(vector, self.top_k),
        );
        let (knowledge, history) = (knowledge?, history?);

        log_event!(
            "chat",
            "retrieved",
            "{} knowledge, {} history passages",
            knowledge.len(),
            history.len()
        );
        debug_event!(
            "chat",
            "sources",
            "{:?}",
            knowledge.iter().map(|c| c.source.as_str()).collect::<Vec<_>>()
        );

        Ok(build_context(&knowledge, &history))
    }
}
