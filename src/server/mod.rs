//! HTTP backend: chat streaming, transcript history and settings.

pub mod handlers;
pub mod sse;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::Mutex;

use crate::error::{AppError, ConfigError};
use crate::log_event;
use crate::models::{Config, Settings};
use crate::services::{
    ChatModel, Embedder, GeminiChatModel, GeminiEmbedder, HistoryStore, IngestPipeline,
    Responder, SharedVectorStore, create_backends,
};

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub config: Config,
    pub pipeline: Arc<IngestPipeline>,
    pub history: HistoryStore,
    pub responder: Responder,
    settings_path: PathBuf,
    /// Serializes read-modify-write cycles of the settings file.
    settings_lock: Mutex<()>,
}

pub type AppState = Arc<AppContext>;

impl AppContext {
    /// Wire the Gemini clients and the configured vector store backends.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let embedder: Arc<dyn Embedder> = Arc::new(GeminiEmbedder::new(&config.embedding)?);
        let model: Arc<dyn ChatModel> = Arc::new(GeminiChatModel::new(&config.generation)?);
        let (knowledge_base, chat_history) =
            create_backends(&config.vector_store, config.embedding.dimension)?;
        Self::new(config, embedder, model, knowledge_base, chat_history)
    }

    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        knowledge_base: SharedVectorStore,
        chat_history: SharedVectorStore,
    ) -> Result<Self, AppError> {
        let pipeline = Arc::new(IngestPipeline::new(
            &config,
            embedder.clone(),
            knowledge_base.clone(),
            chat_history.clone(),
        )?);
        let responder = Responder::new(
            embedder,
            model,
            knowledge_base,
            chat_history,
            config.vector_store.top_k,
        );

        Ok(Self {
            history: HistoryStore::new(pipeline.clone()),
            settings_path: config.paths.settings_file.clone(),
            settings_lock: Mutex::new(()),
            pipeline,
            responder,
            config,
        })
    }

    /// Create the data directories and make sure both collections exist.
    pub async fn prepare(&self) -> Result<(), AppError> {
        self.pipeline.ensure_dirs()?;
        self.pipeline.ensure_collections().await?;
        Ok(())
    }

    /// Current settings; an unreadable file falls back to the defaults.
    pub fn settings(&self) -> Settings {
        Settings::load(&self.settings_path).unwrap_or_else(|e| {
            tracing::warn!("[settings] {}: {}", self.settings_path.display(), e);
            Settings::default()
        })
    }

    pub async fn update_settings(
        &self,
        user_name: Option<String>,
        persona: Option<String>,
    ) -> Result<Settings, ConfigError> {
        let _guard = self.settings_lock.lock().await;
        let mut settings = Settings::load(&self.settings_path)?;
        settings.merge(user_name, persona);
        settings.save(&self.settings_path)?;
        Ok(settings)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/chat", post(handlers::chat))
        .route("/api/history/list", get(handlers::history_list))
        .route("/api/history/save", post(handlers::history_save))
        .route("/api/history/load", post(handlers::history_load))
        .route("/api/history/update", post(handlers::history_update))
        .route("/api/history/delete_all", post(handlers::history_delete_all))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::post_settings),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves, letting in-flight responses finish.
pub async fn run<F>(state: AppState, bind: &str, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| AppError::Other(format!("invalid bind address {bind}: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log_event!("server", "listening", "http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    log_event!("server", "stopped");
    Ok(())
}
