//! Source file → chunks → embeddings → vector store, with processed-folder bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ConfigError, IngestError, VectorStoreError};
use crate::models::{Chunk, Config, SourceKind, TextBlock, Transcript};
use crate::services::batch::process_batch;
use crate::services::chunker::TextChunker;
use crate::services::embedding::Embedder;
use crate::services::pdf::PdfDocument;
use crate::services::tracker::IngestionTracker;
use crate::services::vector_store::SharedVectorStore;
use crate::utils::{RetryConfig, file_name_string};
use crate::{debug_event, log_event};

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Chunks were embedded and upserted.
    Ingested { chunks: usize },
    /// Nothing to ingest (blank text, empty or malformed transcript).
    Skipped { reason: String },
    /// A retryable failure; the file stays where it is.
    Failed { error: String },
}

impl FileOutcome {
    /// Whether the file should be moved into the processed directory.
    pub fn should_move(&self) -> bool {
        !matches!(self, FileOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub kind: SourceKind,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Aggregated outcomes of a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
}

impl IngestReport {
    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    pub fn extend(&mut self, other: IngestReport) {
        self.files.extend(other.files);
    }

    pub fn ingested(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Ingested { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    pub fn total_chunks(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Ingested { chunks } => chunks,
                _ => 0,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| predicate(&f.outcome)).count()
    }
}

/// Steps of a scan, in order: one `Found`, then `Started`/`Finished` per file.
#[derive(Debug)]
pub enum ScanProgress<'a> {
    Found(usize),
    Started(&'a Path),
    Finished(&'a FileReport),
}

enum Extracted {
    Blocks(Vec<TextBlock>),
    Skip(String),
}

/// Ingests PDFs into the knowledge base and transcripts into the chat history collection.
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    knowledge_base: SharedVectorStore,
    chat_history: SharedVectorStore,
    chunker: TextChunker,
    retry: RetryConfig,
    batch_size: usize,
    documents: IngestionTracker,
    transcripts: IngestionTracker,
}

impl IngestPipeline {
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        knowledge_base: SharedVectorStore,
        chat_history: SharedVectorStore,
    ) -> Result<Self, ConfigError> {
        let paths = &config.paths;
        Ok(Self {
            embedder,
            knowledge_base,
            chat_history,
            chunker: TextChunker::new(&config.chunking)?,
            retry: RetryConfig::default(),
            batch_size: config.embedding.batch_size.max(1) as usize,
            documents: IngestionTracker::new(
                paths.data_dir.clone(),
                paths.processed_data_dir(),
                SourceKind::Document,
            ),
            transcripts: IngestionTracker::new(
                paths.chat_history_dir.clone(),
                paths.processed_chat_history_dir(),
                SourceKind::Transcript,
            ),
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn tracker(&self, kind: SourceKind) -> &IngestionTracker {
        match kind {
            SourceKind::Document => &self.documents,
            SourceKind::Transcript => &self.transcripts,
        }
    }

    pub fn store(&self, kind: SourceKind) -> &SharedVectorStore {
        match kind {
            SourceKind::Document => &self.knowledge_base,
            SourceKind::Transcript => &self.chat_history,
        }
    }

    /// Create both source/processed directory pairs.
    pub fn ensure_dirs(&self) -> Result<(), IngestError> {
        self.documents.ensure_dirs()?;
        self.transcripts.ensure_dirs()
    }

    /// Ensure both collections exist with the embedder's width.
    pub async fn ensure_collections(&self) -> Result<(), VectorStoreError> {
        self.knowledge_base.ensure_collection().await?;
        self.chat_history.ensure_collection().await
    }

    /// Ingest every new file of `kind`. A collection that cannot be ensured (for example a
    /// width mismatch) aborts the scan before any file is touched.
    pub async fn scan(&self, kind: SourceKind) -> Result<IngestReport, IngestError> {
        self.scan_with(kind, |_| {}).await
    }

    /// [`scan`](Self::scan), reporting each step to `progress` as it happens.
    pub async fn scan_with(
        &self,
        kind: SourceKind,
        mut progress: impl FnMut(ScanProgress<'_>),
    ) -> Result<IngestReport, IngestError> {
        let tracker = self.tracker(kind);
        tracker.ensure_dirs()?;
        self.store(kind).ensure_collection().await?;

        let pending = tracker.new_files()?;
        log_event!("ingest", "scan", "{} new {} file(s)", pending.len(), kind);
        progress(ScanProgress::Found(pending.len()));

        let mut report = IngestReport::default();
        for path in pending {
            progress(ScanProgress::Started(&path));
            let file = self.ingest_path(&path, kind).await;
            progress(ScanProgress::Finished(&file));
            report.push(file);
        }
        Ok(report)
    }

    /// Ingest one file and move it to the processed directory unless ingestion failed.
    pub async fn ingest_path(&self, path: &Path, kind: SourceKind) -> FileReport {
        let file = file_name_string(path);
        let mut outcome = match self.ingest_file(path, kind).await {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::Failed {
                error: e.to_string(),
            },
        };

        if outcome.should_move()
            && let Err(e) = self.tracker(kind).mark_processed(path)
        {
            outcome = FileOutcome::Failed {
                error: e.to_string(),
            };
        }

        match &outcome {
            FileOutcome::Ingested { chunks } => {
                log_event!("ingest", "ingested", "{} ({} chunks)", file, chunks)
            }
            FileOutcome::Skipped { reason } => {
                log_event!("ingest", "skipped", "{}: {}", file, reason)
            }
            FileOutcome::Failed { error } => {
                tracing::warn!("[ingest] failed: {}: {}", file, error)
            }
        }

        FileReport {
            file,
            kind,
            outcome,
        }
    }

    /// Delete every point of `source` and wait for the store to confirm. Callers replacing
    /// a file must do this before the new version becomes visible to a scan.
    pub async fn remove_source(
        &self,
        source: &str,
        kind: SourceKind,
    ) -> Result<(), VectorStoreError> {
        self.store(kind).delete_by_source(source).await?;
        debug_event!("ingest", "removed", "{}", source);
        Ok(())
    }

    /// Chunk, embed and upsert one file without moving it.
    pub async fn ingest_file(
        &self,
        path: &Path,
        kind: SourceKind,
    ) -> Result<FileOutcome, IngestError> {
        let blocks = match extract(path, kind).await? {
            Extracted::Blocks(blocks) => blocks,
            Extracted::Skip(reason) => return Ok(FileOutcome::Skipped { reason }),
        };

        let source = file_name_string(path);
        let chunks = self.chunker.chunk(&source, kind, &blocks);
        if chunks.is_empty() {
            return Ok(FileOutcome::Skipped {
                reason: "no extractable text".to_string(),
            });
        }

        let written = self.upsert_chunks(kind, chunks).await?;
        Ok(FileOutcome::Ingested { chunks: written })
    }

    async fn upsert_chunks(&self, kind: SourceKind, chunks: Vec<Chunk>) -> Result<usize, IngestError> {
        let store = self.store(kind);
        let mut written = 0;
        let mut batch = Vec::with_capacity(self.batch_size);

        for chunk in chunks {
            batch.push(chunk);
            if batch.len() >= self.batch_size {
                written +=
                    process_batch(self.embedder.as_ref(), store.as_ref(), &self.retry, &mut batch)
                        .await?;
            }
        }
        written +=
            process_batch(self.embedder.as_ref(), store.as_ref(), &self.retry, &mut batch).await?;

        Ok(written)
    }
}

async fn extract(path: &Path, kind: SourceKind) -> Result<Extracted, IngestError> {
    match kind {
        SourceKind::Document => {
            let owned: PathBuf = path.to_path_buf();
            let blocks = tokio::task::spawn_blocking(move || {
                PdfDocument::open(&owned).map(|pdf| pdf.page_texts())
            })
            .await
            .map_err(|e| IngestError::FileReadError(e.to_string()))??;
            Ok(Extracted::Blocks(blocks))
        }
        SourceKind::Transcript => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| IngestError::FileReadError(format!("{}: {}", path.display(), e)))?;
            Ok(parse_transcript(&content))
        }
    }
}

fn parse_transcript(content: &str) -> Extracted {
    match serde_json::from_str::<Transcript>(content) {
        Ok(transcript) if transcript.is_empty() => {
            Extracted::Skip("transcript has no messages".to_string())
        }
        Ok(transcript) => Extracted::Blocks(vec![TextBlock::whole(transcript.render())]),
        Err(e) => Extracted::Skip(format!("malformed transcript: {e}")),
    }
}
