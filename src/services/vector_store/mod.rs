//! Vector store abstraction layer.
//!
//! Each backend instance is bound to one collection with a fixed vector width. Qdrant is the
//! production backend; the in-memory backend serves tests and throwaway sessions.

mod memory;
mod qdrant;

pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{Chunk, CollectionInfo, RetrievedChunk, VectorDriver, VectorStoreConfig};

/// Payload keys written with every point.
pub mod payload {
    pub const SOURCE: &str = "source";
    pub const CONTENT: &str = "content";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const PAGE: &str = "page";
    pub const KIND: &str = "kind";
    pub const INGESTED_AT: &str = "ingested_at";
}

/// Operations the ingestion pipeline and responder need from a collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Point count and width, or `None` when the collection does not exist.
    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the collection when absent; fail with `DimensionMismatch` when it exists with
    /// a different width.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or overwrite chunks, which must carry their embeddings.
    async fn upsert_points(&self, chunks: Vec<Chunk>) -> Result<(), VectorStoreError>;

    /// Top `limit` chunks by cosine similarity.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError>;

    /// Delete every point whose `source` equals `source`. Returns once the deletion is applied.
    async fn delete_by_source(&self, source: &str) -> Result<(), VectorStoreError>;

    /// Drop the collection if present and recreate it empty.
    async fn reset_collection(&self) -> Result<(), VectorStoreError>;

    /// Exact number of points, optionally only those of one source.
    async fn count(&self, source: Option<&str>) -> Result<u64, VectorStoreError>;

    fn collection(&self) -> &str;

    fn dimension(&self) -> u64;
}

/// Shared handle to a collection-bound store.
pub type SharedVectorStore = Arc<dyn VectorStore>;

/// Reject an existing collection whose width differs from the embedding model's.
pub(crate) fn check_dimension(
    collection: &str,
    expected: u64,
    actual: u64,
) -> Result<(), VectorStoreError> {
    if expected != actual {
        return Err(VectorStoreError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Create the backend configured by `config.driver`, bound to `collection`.
pub fn create_backend(
    config: &VectorStoreConfig,
    collection: &str,
    dimension: u64,
) -> Result<SharedVectorStore, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => Ok(Arc::new(QdrantBackend::new(config, collection, dimension)?)),
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new(collection, dimension))),
    }
}

/// Backends for the knowledge base and chat history collections.
pub fn create_backends(
    config: &VectorStoreConfig,
    dimension: u64,
) -> Result<(SharedVectorStore, SharedVectorStore), VectorStoreError> {
    let knowledge_base = create_backend(config, &config.knowledge_base_collection, dimension)?;
    let chat_history = create_backend(config, &config.chat_history_collection, dimension)?;
    Ok((knowledge_base, chat_history))
}
