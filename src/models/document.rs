use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two kinds of source file the pipeline ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PDF documents feeding the knowledge base.
    Document,
    /// JSON chat transcripts feeding the chat history collection.
    Transcript,
}

impl SourceKind {
    /// Extension matched (case-insensitively) when scanning for new files.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceKind::Document => "pdf",
            SourceKind::Transcript => "json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Document => "document",
            SourceKind::Transcript => "transcript",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" | "documents" | "pdf" => Ok(SourceKind::Document),
            "transcript" | "transcripts" | "chat" => Ok(SourceKind::Transcript),
            _ => Err(format!("unknown source kind: {}", s)),
        }
    }
}

/// A unit of extracted text: one PDF page, or a whole rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    /// Zero-based page number, when the block came from a paginated document.
    pub page: Option<u32>,
}

impl TextBlock {
    pub fn page(page: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: Some(page),
        }
    }

    pub fn whole(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
        }
    }
}

/// A bounded span of source text, ready to be embedded and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    /// File name of the source; the key used for deletion-by-source.
    pub source: String,
    pub kind: SourceKind,
    pub content: String,
    pub chunk_index: u32,
    pub page: Option<u32>,
    pub start_offset: u64,
    pub end_offset: u64,
    pub checksum: String,
    pub ingested_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dense_vector: Vec<f32>,
}

impl Chunk {
    /// Deterministic point id: re-ingesting identical content overwrites the same point.
    pub fn generate_id(source: &str, checksum: &str, chunk_index: u32) -> String {
        let name = format!("{}:{}:{}", source, checksum, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(
        source: &str,
        kind: SourceKind,
        content: String,
        chunk_index: u32,
        page: Option<u32>,
        start_offset: u64,
        end_offset: u64,
    ) -> Self {
        let checksum = crate::utils::calculate_checksum(&content);
        Self {
            id: Self::generate_id(source, &checksum, chunk_index),
            source: source.to_string(),
            kind,
            content,
            chunk_index,
            page,
            start_offset,
            end_offset,
            checksum,
            ingested_at: chrono::Utc::now().to_rfc3339(),
            dense_vector: Vec::new(),
        }
    }

    /// Character length of the content.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
