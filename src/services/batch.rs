use crate::error::IngestError;
use crate::models::Chunk;
use crate::services::embedding::Embedder;
use crate::services::vector_store::VectorStore;
use crate::utils::{RetryConfig, with_retry};

/// Embed `chunks` in one call and upsert them, retrying transient failures of either step.
/// Returns the number of points written.
pub async fn process_batch(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    retry: &RetryConfig,
    chunks: &mut Vec<Chunk>,
) -> Result<usize, IngestError> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = with_retry(retry, "embed", || embedder.embed_documents(texts.clone())).await?;

    for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
        chunk.dense_vector = embedding;
    }

    let points = std::mem::take(chunks);
    let written = points.len();
    with_retry(retry, "upsert", || store.upsert_points(points.clone())).await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::SourceKind;
    use crate::services::vector_store::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyEmbedder {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_documents(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(EmbeddingError::RateLimited);
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> u64 {
            2
        }
    }

    #[tokio::test]
    async fn test_process_batch_retries_and_upserts() {
        let embedder = FlakyEmbedder {
            calls: AtomicU32::new(0),
        };
        let store = MemoryBackend::new("kb", 2);
        store.ensure_collection().await.unwrap();
        let retry = RetryConfig::new(3).with_initial_delay(Duration::from_millis(1));

        let mut chunks = vec![
            Chunk::new("a.json", SourceKind::Transcript, "one".into(), 0, None, 0, 3),
            Chunk::new("a.json", SourceKind::Transcript, "two".into(), 1, None, 2, 5),
        ];
        let written = process_batch(&embedder, &store, &retry, &mut chunks)
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert!(chunks.is_empty());
        assert_eq!(store.count(Some("a.json")).await.unwrap(), 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }
}
