//! Error types for the ragchat backend and ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding API: {0}")]
    ConnectionError(String),

    #[error("embedding API rate limit exceeded")]
    RateLimited,

    #[error("embedding API error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_)
            | EmbeddingError::Timeout
            | EmbeddingError::RateLimited => true,
            EmbeddingError::ServerError(msg) => {
                msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
                    || msg.to_lowercase().contains("unavailable")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::MissingApiKey => false,
        }
    }
}

/// Errors raised while streaming a completion from the language model.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("language model rate limit exceeded")]
    RateLimited,

    #[error("failed to connect to language model API: {0}")]
    ConnectionError(String),

    #[error("language model API error: {0}")]
    ServerError(String),

    #[error("malformed stream event: {0}")]
    StreamError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

impl GenerationError {
    /// True when the upstream asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            GenerationError::RateLimited => true,
            GenerationError::ServerError(msg) | GenerationError::StreamError(msg) => {
                msg.contains("RESOURCE_EXHAUSTED") || msg.contains("429")
            }
            _ => false,
        }
    }
}

/// Failure while answering a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] VectorStoreError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl ChatError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ChatError::Embedding(e) => matches!(e, EmbeddingError::RateLimited),
            ChatError::Generation(e) => e.is_rate_limited(),
            ChatError::Retrieval(_) => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to Qdrant: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error(
        "collection '{collection}' has vector width {actual} but the embedding model produces {expected}; \
         recreate the collection or change the embedding model"
    )]
    DimensionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("collection '{0}' does not exist")]
    MissingCollection(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),
}

impl VectorStoreError {
    /// A configuration fault that no amount of retrying will repair.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VectorStoreError::DimensionMismatch { .. })
    }
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::DimensionMismatch { .. } | VectorStoreError::MissingCollection(_) => {
                false
            }
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to reading and rewriting PDF files.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to load PDF {path}: {reason}")]
    LoadError { path: PathBuf, reason: String },

    #[error("failed to extract text from page {page}: {reason}")]
    TextError { page: u32, reason: String },

    #[error("failed to write PDF {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("page range {start}..{end} is outside a document of {pages} pages")]
    InvalidRange { start: u32, end: u32, pages: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors while turning web pages into PDFs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("links file not found: {0}")]
    MissingLinks(PathBuf),

    #[error("request failed for {url}: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("{url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("no readable text in {0}")]
    NoContent(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reasons a document cannot be split by its outline.
#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("document has no outline (bookmarks)")]
    NoOutline,

    #[error("no outline entries at level {0}")]
    EmptyLevel(usize),

    #[error("level {level} is not present; available levels: {available:?}")]
    UnknownLevel { level: usize, available: Vec<usize> },

    #[error("no chapters survived filtering")]
    NothingToWrite,

    #[error(transparent)]
    Pdf(#[from] PdfError),
}

/// Errors related to ingesting a single source file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file read error: {0}")]
    FileReadError(String),

    #[error("directory scan error: {0}")]
    ScanError(String),

    #[error("failed to move {path} to processed: {reason}")]
    MoveError { path: PathBuf, reason: String },

    #[error("PDF error: {0}")]
    PdfError(#[from] PdfError),

    #[error("embedding error: {0}")]
    EmbeddingError(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStoreError(#[from] VectorStoreError),
}

/// Errors related to chat history persistence.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("transcript not found: {0}")]
    NotFound(String),

    #[error("invalid transcript name: {0}")]
    InvalidName(String),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors from the filesystem watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize watcher: {0}")]
    InitFailed(String),

    #[error("cannot watch {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("event channel closed unexpectedly")]
    ChannelClosed,
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed(e.to_string())
    }
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("outline error: {0}")]
    Outline(#[from] OutlineError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
