#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tempfile::TempDir;

use ragchat::error::{EmbeddingError, VectorStoreError};
use ragchat::models::{Chunk, CollectionInfo, Config, RetrievedChunk};
use ragchat::services::{Embedder, IngestPipeline, MemoryBackend, SharedVectorStore, VectorStore};
use ragchat::utils::RetryConfig;

pub const DIMENSION: u64 = 8;

/// Bag-of-bytes vectors: equal texts embed equally, and nothing touches the network.
pub struct FakeEmbedder {
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![1.0f32; DIMENSION as usize];
        for (i, b) in text.bytes().enumerate() {
            v[i % DIMENSION as usize] += f32::from(b) / 255.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        Ok(Self::vector(text))
    }

    fn dimension(&self) -> u64 {
        DIMENSION
    }
}

/// In-memory collection whose deletes can be switched to fail like an unreachable server.
pub struct FaultyStore {
    inner: MemoryBackend,
    fail_deletes: AtomicBool,
}

impl FaultyStore {
    pub fn new(collection: &str) -> Self {
        Self {
            inner: MemoryBackend::new(collection, DIMENSION),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorStore for FaultyStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.inner.health_check().await
    }

    async fn collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        self.inner.collection_info().await
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        self.inner.ensure_collection().await
    }

    async fn upsert_points(&self, chunks: Vec<Chunk>) -> Result<(), VectorStoreError> {
        self.inner.upsert_points(chunks).await
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<RetrievedChunk>, VectorStoreError> {
        self.inner.search(query_vector, limit).await
    }

    async fn delete_by_source(&self, source: &str) -> Result<(), VectorStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(VectorStoreError::ConnectionError("connection refused".to_string()));
        }
        self.inner.delete_by_source(source).await
    }

    async fn reset_collection(&self) -> Result<(), VectorStoreError> {
        self.inner.reset_collection().await
    }

    async fn count(&self, source: Option<&str>) -> Result<u64, VectorStoreError> {
        self.inner.count(source).await
    }

    fn collection(&self) -> &str {
        self.inner.collection()
    }

    fn dimension(&self) -> u64 {
        self.inner.dimension()
    }
}

/// Config rooted in a temp directory, with small chunks.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.embedding.dimension = DIMENSION;
    config.embedding.batch_size = 4;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config.paths.data_dir = root.join("data");
    config.paths.chat_history_dir = root.join("chat_history");
    config.paths.settings_file = root.join("config.json");
    config
}

pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub embedder: Arc<FakeEmbedder>,
    pub knowledge_base: SharedVectorStore,
    pub chat_history: SharedVectorStore,
    pub chat_history_faults: Arc<FaultyStore>,
    pub pipeline: Arc<IngestPipeline>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let embedder = Arc::new(FakeEmbedder::new());
        let knowledge_base: SharedVectorStore = Arc::new(MemoryBackend::new(
            &config.vector_store.knowledge_base_collection,
            DIMENSION,
        ));
        let chat_history_faults = Arc::new(FaultyStore::new(
            &config.vector_store.chat_history_collection,
        ));
        let chat_history: SharedVectorStore = chat_history_faults.clone();
        let pipeline = IngestPipeline::new(
            &config,
            embedder.clone(),
            knowledge_base.clone(),
            chat_history.clone(),
        )
        .unwrap()
        .with_retry(RetryConfig::new(1));
        pipeline.ensure_dirs().unwrap();

        Self {
            dir,
            config,
            embedder,
            knowledge_base,
            chat_history,
            chat_history_faults,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn raw_transcripts(&self) -> PathBuf {
        self.config.paths.chat_history_dir.clone()
    }

    pub fn processed_transcripts(&self) -> PathBuf {
        self.config.paths.processed_chat_history_dir()
    }

    pub fn write_transcript(&self, name: &str, summary: &str, messages: &[(&str, &str)]) -> PathBuf {
        let history: Vec<serde_json::Value> = messages
            .iter()
            .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
            .collect();
        let body = serde_json::json!({
            "summary": summary,
            "history": history,
            "timestamp": "2025-01-01T12:00:00.000000",
        });
        let path = self.raw_transcripts().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
        path
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// A PDF with one line of text per page and a flat outline of `(title, zero-based page)`.
pub fn build_pdf(path: &Path, page_count: u32, bookmarks: &[(&str, u32)]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids: Vec<ObjectId> = Vec::new();
    for n in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Page {} body text", n + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids.iter().map(|&id| Object::Reference(id)).collect::<Vec<Object>>(),
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };

    if !bookmarks.is_empty() {
        let outlines_id = doc.new_object_id();
        let item_ids: Vec<ObjectId> = bookmarks.iter().map(|_| doc.new_object_id()).collect();

        for (i, (title, page)) in bookmarks.iter().enumerate() {
            let mut item = Dictionary::new();
            item.set("Title", Object::string_literal(*title));
            item.set("Parent", Object::Reference(outlines_id));
            item.set(
                "Dest",
                Object::Array(vec![
                    Object::Reference(page_ids[*page as usize]),
                    Object::Name(b"Fit".to_vec()),
                ]),
            );
            if i > 0 {
                item.set("Prev", Object::Reference(item_ids[i - 1]));
            }
            if let Some(next) = item_ids.get(i + 1) {
                item.set("Next", Object::Reference(*next));
            }
            doc.objects.insert(item_ids[i], Object::Dictionary(item));
        }

        let outlines = dictionary! {
            "Type" => "Outlines",
            "First" => Object::Reference(item_ids[0]),
            "Last" => Object::Reference(item_ids[item_ids.len() - 1]),
            "Count" => bookmarks.len() as i64,
        };
        doc.objects.insert(outlines_id, Object::Dictionary(outlines));
        catalog.set("Outlines", Object::Reference(outlines_id));
    }

    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
