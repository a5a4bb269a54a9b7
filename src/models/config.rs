use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_EMBEDDING_DIMENSION: u64 = 768;
pub const DEFAULT_GENERATION_MODEL: &str = "models/gemini-1.5-flash";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_KNOWLEDGE_BASE_COLLECTION: &str = "knowledge_base";
pub const DEFAULT_CHAT_HISTORY_COLLECTION: &str = "chat_history_db";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const CONFIG_PATH_ENV: &str = "RAGCHAT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Per-user config file location.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ragchat").join("config.toml"))
    }

    /// First existing config file: `$RAGCHAT_CONFIG`, `./ragchat.toml`, then the global file.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from("ragchat.toml");
        if local.exists() {
            return Some(local);
        }
        Self::global_path().filter(|p| p.exists())
    }

    /// Load configuration, then apply `.env` / environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut stored = self.clone();
        // Keys belong in the environment, not on disk.
        stored.embedding.api_key = None;
        stored.generation.api_key = None;

        let content = toml::to_string_pretty(&stored)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV)
            && !key.trim().is_empty()
        {
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(key.clone());
            }
            if self.generation.api_key.is_none() {
                self.generation.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if self.vector_store.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "vector_store.top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_gemini_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output width of the model; every collection must match it.
    #[serde(default = "default_dimension")]
    pub dimension: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_gemini_url() -> String {
    DEFAULT_GEMINI_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u64 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    100
}

fn default_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_gemini_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_gemini_url")]
    pub url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_gemini_url(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_knowledge_base_collection")]
    pub knowledge_base_collection: String,

    #[serde(default = "default_chat_history_collection")]
    pub chat_history_collection: String,

    /// Chunks retrieved from each collection per chat request.
    #[serde(default = "default_top_k")]
    pub top_k: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_knowledge_base_collection() -> String {
    DEFAULT_KNOWLEDGE_BASE_COLLECTION.to_string()
}

fn default_chat_history_collection() -> String {
    DEFAULT_CHAT_HISTORY_COLLECTION.to_string()
}

fn default_top_k() -> u64 {
    5
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            api_key: None,
            knowledge_base_collection: default_knowledge_base_collection(),
            chat_history_collection: default_chat_history_collection(),
            top_k: default_top_k(),
        }
    }
}

/// Chunk window sizes, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_chat_history_dir")]
    pub chat_history_dir: PathBuf,

    #[serde(default = "default_processed_subdir")]
    pub processed_subdir: String,

    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_chat_history_dir() -> PathBuf {
    PathBuf::from("chat_history")
}

fn default_processed_subdir() -> String {
    "Processed".to_string()
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("config.json")
}

impl PathsConfig {
    pub fn processed_data_dir(&self) -> PathBuf {
        self.data_dir.join(&self.processed_subdir)
    }

    pub fn processed_chat_history_dir(&self) -> PathBuf {
        self.chat_history_dir.join(&self.processed_subdir)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chat_history_dir: default_chat_history_dir(),
            processed_subdir: default_processed_subdir(),
            settings_file: default_settings_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last filesystem event before a file is ingested.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_settle_ms() -> u64 {
    1000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

/// Link-to-PDF conversion: where the URL list and the log of converted URLs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_links_file")]
    pub links_file: PathBuf,

    #[serde(default = "default_processed_log")]
    pub processed_log: PathBuf,

    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_links_file() -> PathBuf {
    PathBuf::from("link.txt")
}

fn default_processed_log() -> PathBuf {
    PathBuf::from("processed_links.log")
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36"
        .to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            links_file: default_links_file(),
            processed_log: default_processed_log(),
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Chapter titles (compared after normalization) that are never written out.
    #[serde(default = "default_exclude_titles")]
    pub exclude_titles: Vec<String>,
}

fn default_exclude_titles() -> Vec<String> {
    [
        "index",
        "acknowledgements",
        "resources",
        "references",
        "cover",
        "title",
        "about the author",
        "dedication",
        "authors note",
        "copyright",
        "title page",
        "contents",
        "other books by this author",
        "epigraph",
        "glossary",
        "notes",
        "support organizations",
        "copyright page",
        "preface",
        "brief contents",
        "credits",
        "name index",
        "subject index",
        "forward",
        "tables",
        "figures",
        "special features",
        "features",
        "cover page",
        "front matter",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            exclude_titles: default_exclude_titles(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `ragchat::services::watcher = "debug"`.
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.vector_store.knowledge_base_collection, "knowledge_base");
        assert_eq!(config.vector_store.chat_history_collection, "chat_history_db");
        assert_eq!(config.vector_store.top_k, 5);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_processed_dirs() {
        let paths = PathsConfig::default();
        assert_eq!(paths.processed_data_dir(), PathBuf::from("data/Processed"));
        assert_eq!(
            paths.processed_chat_history_dir(),
            PathBuf::from("chat_history/Processed")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 400

            [vector_store]
            top_k = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.vector_store.top_k, 3);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.driver, VectorDriver::Qdrant);
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_save_strips_api_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ragchat.toml");
        let mut config = Config::default();
        config.embedding.api_key = Some("secret".to_string());
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("secret"));
        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_default_exclusions_present() {
        let split = SplitConfig::default();
        assert!(split.exclude_titles.iter().any(|t| t == "index"));
        assert!(split.exclude_titles.iter().any(|t| t == "front matter"));
    }
}
