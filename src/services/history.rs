//! Chat transcript persistence on top of the transcript ingestion path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;

use crate::error::HistoryError;
use crate::models::{ChatMessage, SourceKind, Transcript};
use crate::services::ingest::{FileReport, IngestPipeline};
use crate::services::tracker::IngestionTracker;
use crate::utils::{file_name_string, has_extension, move_file, write_atomic};
use crate::{debug_event, log_event};

/// One saved conversation as listed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub filename: String,
    pub summary: String,
    pub timestamp: String,
}

pub struct HistoryStore {
    pipeline: Arc<IngestPipeline>,
}

impl HistoryStore {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self { pipeline }
    }

    fn tracker(&self) -> &IngestionTracker {
        self.pipeline.tracker(SourceKind::Transcript)
    }

    /// Write a new transcript to the raw directory and ingest it right away.
    /// Returns `None` for an empty conversation.
    pub async fn save(&self, history: Vec<ChatMessage>) -> Result<Option<FileReport>, HistoryError> {
        if history.is_empty() {
            return Ok(None);
        }

        let (file_name, transcript) = Transcript::from_history(history, Local::now());
        let path = self.write_raw(&file_name, &transcript)?;
        log_event!("history", "saved", "{}", file_name);

        Ok(Some(
            self.pipeline
                .ingest_path(&path, SourceKind::Transcript)
                .await,
        ))
    }

    /// Processed transcripts, newest first. Unreadable files are left out.
    pub fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let dir = self.tracker().processed_dir();
        std::fs::create_dir_all(dir)?;

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !has_extension(&path, "json") {
                continue;
            }
            let Some(transcript) = read_transcript(&path) else {
                debug_event!("history", "unreadable", "{}", path.display());
                continue;
            };
            entries.push(HistoryEntry {
                filename: file_name_string(&path),
                summary: transcript.summary,
                timestamp: transcript.timestamp,
            });
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Messages of a processed transcript. Missing, unreadable and empty transcripts are all
    /// reported as not found.
    pub fn load(&self, filename: &str) -> Result<Vec<ChatMessage>, HistoryError> {
        let path = self.processed_path(filename)?;
        match read_transcript(&path) {
            Some(transcript) if !transcript.is_empty() => Ok(transcript.history),
            _ => Err(HistoryError::NotFound(filename.to_string())),
        }
    }

    /// Replace the messages of an existing transcript and re-embed it. The points of the
    /// previous version are deleted before the new file is written, so a failed delete
    /// leaves the processed transcript untouched.
    pub async fn update(
        &self,
        filename: &str,
        history: Vec<ChatMessage>,
    ) -> Result<FileReport, HistoryError> {
        let processed = self.processed_path(filename)?;
        let Some(mut transcript) = read_transcript(&processed) else {
            return Err(HistoryError::NotFound(filename.to_string()));
        };
        let name = file_name_string(&processed);

        self.pipeline
            .remove_source(&name, SourceKind::Transcript)
            .await?;

        transcript.history = history;
        transcript.timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        let raw = self.write_raw(&name, &transcript)?;
        std::fs::remove_file(&processed)?;

        let report = self.pipeline.ingest_path(&raw, SourceKind::Transcript).await;
        log_event!("history", "updated", "{}", name);
        Ok(report)
    }

    /// Re-embed a transcript from scratch, whether it is still raw or already processed.
    pub async fn replace(&self, filename: &str) -> Result<FileReport, HistoryError> {
        let name = checked_name(filename)?;
        let raw = self.tracker().source_dir().join(name);
        let processed = self.tracker().processed_dir().join(name);
        if !raw.is_file() && !processed.is_file() {
            return Err(HistoryError::NotFound(filename.to_string()));
        }

        self.pipeline
            .remove_source(name, SourceKind::Transcript)
            .await?;

        if !raw.is_file() {
            move_file(&processed, &raw)?;
        }
        Ok(self.pipeline.ingest_path(&raw, SourceKind::Transcript).await)
    }

    /// Drop and recreate the chat history collection, delete every transcript, and leave
    /// an empty processed directory behind.
    pub async fn reset(&self) -> Result<(), HistoryError> {
        self.pipeline
            .store(SourceKind::Transcript)
            .reset_collection()
            .await?;

        let raw = self.tracker().source_dir();
        if raw.exists() {
            std::fs::remove_dir_all(raw)?;
        }
        std::fs::create_dir_all(self.tracker().processed_dir())?;

        log_event!("history", "reset");
        Ok(())
    }

    fn processed_path(&self, filename: &str) -> Result<PathBuf, HistoryError> {
        let name = checked_name(filename)?;
        Ok(self.tracker().processed_dir().join(name))
    }

    fn write_raw(&self, file_name: &str, transcript: &Transcript) -> Result<PathBuf, HistoryError> {
        let dir = self.tracker().source_dir();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        let content = serde_json::to_string_pretty(transcript)?;
        write_atomic(&path, content.as_bytes())?;
        Ok(path)
    }
}

fn read_transcript(path: &Path) -> Option<Transcript> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// A bare `.json` file name; anything that could escape the history directory is rejected.
fn checked_name(filename: &str) -> Result<&str, HistoryError> {
    let name = filename.trim();
    let is_plain = !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
        && has_extension(Path::new(name), "json");
    if !is_plain {
        return Err(HistoryError::InvalidName(filename.to_string()));
    }
    Ok(name)
}
