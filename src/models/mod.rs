mod config;
mod document;
mod outline;
mod search;
mod settings;
mod transcript;

pub use config::{
    API_KEY_ENV, CONFIG_PATH_ENV, ChunkingConfig, Config, DEFAULT_CHAT_HISTORY_COLLECTION,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_GEMINI_URL,
    DEFAULT_GENERATION_MODEL, DEFAULT_KNOWLEDGE_BASE_COLLECTION, DEFAULT_QDRANT_URL,
    EmbeddingConfig, FetchConfig, GenerationConfig, LoggingConfig, PathsConfig, ServerConfig, SplitConfig,
    VectorDriver, VectorStoreConfig, WatchConfig,
};
pub use document::{Chunk, SourceKind, TextBlock};
pub use outline::{
    ChapterPlan, LevelSummary, OutlineEntry, OutlineNode, SkipReason, SkippedEntry, SplitPlan,
    SplitSummary,
};
pub use search::{CollectionInfo, OutputFormat, RetrievedChunk};
pub use settings::{DEFAULT_PERSONA, Settings};
pub use transcript::{ChatMessage, Role, Transcript};
