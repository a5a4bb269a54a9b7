//! Process-local vector store with cosine similarity search.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{VectorStore, check_dimension};
use crate::error::VectorStoreError;
use crate::models::{Chunk, CollectionInfo, RetrievedChunk};

/// In-memory backend bound to one collection. `None` means the collection does not exist.
#[derive(Debug)]
pub struct MemoryBackend {
    collection: String,
    dimension: u64,
    points: RwLock<Option<HashMap<String, Chunk>>>,
}

impl MemoryBackend {
    pub fn new(collection: &str, dimension: u64) -> Self {
        Self {
            collection: collection.to_string(),
            dimension,
            points: RwLock::new(None),
        }
    }

    fn missing(&self) -> VectorStoreError {
        VectorStoreError::MissingCollection(self.collection.clone())
    }
}

/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for MemoryBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let points = self.points.read().await;
        Ok(points.as_ref().map(|p| CollectionInfo {
            name: self.collection.clone(),
            points_count: p.len() as u64,
            dimension: self.dimension,
        }))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().await;
        points.get_or_insert_with(HashMap::new);
        Ok(())
    }

    async fn upsert_points(&self, chunks: Vec<Chunk>) -> Result<(), VectorStoreError> {
        let mut guard = self.points.write().await;
        let points = guard.as_mut().ok_or_else(|| self.missing())?;
        for chunk in chunks {
            check_dimension(
                &self.collection,
                self.dimension,
                chunk.dense_vector.len() as u64,
            )?;
            points.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let guard = self.points.read().await;
        let points = guard.as_ref().ok_or_else(|| self.missing())?;

        let mut scored: Vec<RetrievedChunk> = points
            .values()
            .map(|chunk| RetrievedChunk {
                id: chunk.id.clone(),
                score: cosine_similarity(&chunk.dense_vector, &query_vector),
                content: chunk.content.clone(),
                source: chunk.source.clone(),
                page: chunk.page,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit as usize);
        Ok(scored)
    }

    async fn delete_by_source(&self, source: &str) -> Result<(), VectorStoreError> {
        let mut guard = self.points.write().await;
        let points = guard.as_mut().ok_or_else(|| self.missing())?;
        points.retain(|_, chunk| chunk.source != source);
        Ok(())
    }

    async fn reset_collection(&self) -> Result<(), VectorStoreError> {
        *self.points.write().await = Some(HashMap::new());
        Ok(())
    }

    async fn count(&self, source: Option<&str>) -> Result<u64, VectorStoreError> {
        let guard = self.points.read().await;
        let points = guard.as_ref().ok_or_else(|| self.missing())?;
        let count = match source {
            Some(source) => points.values().filter(|c| c.source == source).count(),
            None => points.len(),
        };
        Ok(count as u64)
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn chunk(source: &str, index: u32, vector: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(
            source,
            SourceKind::Transcript,
            format!("{source} #{index}"),
            index,
            None,
            0,
            1,
        );
        chunk.dense_vector = vector;
        chunk
    }

    #[tokio::test]
    async fn test_requires_collection() {
        let store = MemoryBackend::new("kb", 2);
        assert!(store.collection_info().await.unwrap().is_none());
        assert!(matches!(
            store.upsert_points(vec![chunk("a", 0, vec![1.0, 0.0])]).await,
            Err(VectorStoreError::MissingCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryBackend::new("kb", 2);
        store.ensure_collection().await.unwrap();
        store
            .upsert_points(vec![
                chunk("a", 0, vec![1.0, 0.0]),
                chunk("b", 0, vec![0.0, 1.0]),
                chunk("c", 0, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store.search(vec![1.0, 0.1], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "a");
        assert_eq!(results[1].source, "c");
    }

    #[tokio::test]
    async fn test_delete_by_source_and_reset() {
        let store = MemoryBackend::new("kb", 2);
        store.ensure_collection().await.unwrap();
        store
            .upsert_points(vec![
                chunk("a", 0, vec![1.0, 0.0]),
                chunk("a", 1, vec![1.0, 0.0]),
                chunk("b", 0, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        store.delete_by_source("a").await.unwrap();
        assert_eq!(store.count(Some("a")).await.unwrap(), 0);
        assert_eq!(store.count(Some("b")).await.unwrap(), 1);

        store.reset_collection().await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_wrong_width() {
        let store = MemoryBackend::new("kb", 3);
        store.ensure_collection().await.unwrap();
        let err = store
            .upsert_points(vec![chunk("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
