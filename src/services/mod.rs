pub mod batch;
pub mod chunker;
pub mod embedding;
pub mod fetch;
pub mod generation;
pub mod history;
pub mod ingest;
pub mod outline;
pub mod pdf;
pub mod responder;
pub mod splitter;
pub mod tracker;
pub mod vector_store;
pub mod watcher;

pub use batch::process_batch;
pub use chunker::TextChunker;
pub use embedding::{Embedder, GeminiEmbedder};
pub use fetch::{
    Article, FetchProgress, FetchReport, LinkLedger, LinkOutcome, LinkReport, PageFetcher,
    extract_article,
};
pub use generation::{ChatModel, ChatRequest, GeminiChatModel, TokenStream};
pub use history::{HistoryEntry, HistoryStore};
pub use ingest::{FileOutcome, FileReport, IngestPipeline, IngestReport, ScanProgress};
pub use pdf::{PdfDocument, render_text_document};
pub use responder::{ChatEvent, ChatEventStream, Responder};
pub use splitter::{OutlineSurvey, SplitOptions, split_document};
pub use tracker::IngestionTracker;
pub use vector_store::{
    MemoryBackend, QdrantBackend, SharedVectorStore, VectorStore, create_backend, create_backends,
};
pub use watcher::{Debouncer, IngestWatcher};
