//! Qdrant vector store backend implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};

use super::{VectorStore, check_dimension, payload};
use crate::error::VectorStoreError;
use crate::models::{Chunk, CollectionInfo, RetrievedChunk, VectorStoreConfig};

/// Qdrant backend bound to one collection.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantBackend {
    pub fn new(
        config: &VectorStoreConfig,
        collection: &str,
        dimension: u64,
    ) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    fn source_filter(source: &str) -> Filter {
        Filter::must([Condition::matches(payload::SOURCE, source.to_string())])
    }

    async fn create(&self) -> Result<(), VectorStoreError> {
        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        tracing::info!(
            "[vector] created collection '{}' (dim {}, cosine)",
            self.collection,
            self.dimension
        );
        Ok(())
    }

    async fn exists(&self) -> Result<bool, VectorStoreError> {
        self.client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }
}

fn to_payload(chunk: &mut Chunk) -> HashMap<String, Value> {
    let mut map: HashMap<String, Value> = HashMap::new();
    map.insert(payload::SOURCE.to_string(), chunk.source.clone().into());
    map.insert(
        payload::CONTENT.to_string(),
        std::mem::take(&mut chunk.content).into(),
    );
    map.insert(
        payload::CHUNK_INDEX.to_string(),
        i64::from(chunk.chunk_index).into(),
    );
    if let Some(page) = chunk.page {
        map.insert(payload::PAGE.to_string(), i64::from(page).into());
    }
    map.insert(payload::KIND.to_string(), chunk.kind.label().into());
    map.insert(
        payload::INGESTED_AT.to_string(),
        chunk.ingested_at.clone().into(),
    );
    map
}

fn payload_str<'a>(payload: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.as_str()),
        _ => None,
    })
}

fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(n)) => u32::try_from(*n).ok(),
        _ => None,
    })
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        if !self.exists().await? {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let Some(result) = info.result else {
            return Ok(None);
        };

        let dimension = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                VectorsConfigKind::Params(params) => Some(params.size),
                VectorsConfigKind::ParamsMap(map) => map.map.values().next().map(|p| p.size),
            })
            .unwrap_or(0);

        Ok(Some(CollectionInfo {
            name: self.collection.clone(),
            points_count: result.points_count.unwrap_or(0),
            dimension,
        }))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        match self.collection_info().await? {
            Some(info) => check_dimension(&self.collection, self.dimension, info.dimension),
            None => self.create().await,
        }
    }

    async fn upsert_points(&self, chunks: Vec<Chunk>) -> Result<(), VectorStoreError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(chunks.len());
        for mut chunk in chunks {
            if chunk.dense_vector.len() as u64 != self.dimension {
                return Err(VectorStoreError::UpsertError(format!(
                    "chunk {} of '{}' has a {}-dimensional vector, collection expects {}",
                    chunk.chunk_index,
                    chunk.source,
                    chunk.dense_vector.len(),
                    self.dimension
                )));
            }
            let payload = to_payload(&mut chunk);
            let vector = std::mem::take(&mut chunk.dense_vector);
            points.push(PointStruct::new(chunk.id, vector, payload));
        }

        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        let search =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        let results = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let retrieved = results
            .result
            .into_iter()
            .map(|point| {
                let id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Uuid(uuid)) => uuid,
                    Some(PointIdOptions::Num(num)) => num.to_string(),
                    None => String::new(),
                };

                RetrievedChunk {
                    id,
                    score: point.score,
                    content: payload_str(&point.payload, payload::CONTENT)
                        .unwrap_or_default()
                        .to_string(),
                    source: payload_str(&point.payload, payload::SOURCE)
                        .unwrap_or_default()
                        .to_string(),
                    page: payload_u32(&point.payload, payload::PAGE),
                }
            })
            .collect();

        Ok(retrieved)
    }

    async fn delete_by_source(&self, source: &str) -> Result<(), VectorStoreError> {
        let delete = DeletePointsBuilder::new(&self.collection)
            .points(Self::source_filter(source))
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;

        tracing::debug!(
            "[vector] deleted points of '{}' from '{}'",
            source,
            self.collection
        );
        Ok(())
    }

    async fn reset_collection(&self) -> Result<(), VectorStoreError> {
        if self.exists().await? {
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(|e| VectorStoreError::DeleteError(e.to_string()))?;
        }

        self.create().await
    }

    async fn count(&self, source: Option<&str>) -> Result<u64, VectorStoreError> {
        let mut request = CountPointsBuilder::new(&self.collection).exact(true);
        if let Some(source) = source {
            request = request.filter(Self::source_filter(source));
        }

        let response = self
            .client
            .count(request)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count))
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }
}
