mod config;
mod fetch;
mod history;
mod ingest;
mod serve;
mod split;
mod status;

use std::sync::Arc;

use anyhow::Result;

use crate::models::Config;
use crate::services::{Embedder, GeminiEmbedder, IngestPipeline, create_backends};

pub use config::ConfigCommand;
pub use fetch::FetchArgs;
pub use history::HistoryCommand;
pub use ingest::{IngestArgs, KindArg};
pub use serve::ServeArgs;
pub use split::SplitArgs;

pub use config::handle_config;
pub use fetch::handle_fetch;
pub use history::handle_history;
pub use ingest::handle_ingest;
pub use serve::handle_serve;
pub use split::handle_split;
pub use status::handle_status;

/// Gemini embedder plus the configured collections, wired into an ingestion pipeline.
pub(crate) fn build_pipeline(config: &Config) -> Result<Arc<IngestPipeline>> {
    let embedder: Arc<dyn Embedder> = Arc::new(GeminiEmbedder::new(&config.embedding)?);
    let (knowledge_base, chat_history) =
        create_backends(&config.vector_store, config.embedding.dimension)?;
    Ok(Arc::new(IngestPipeline::new(
        config,
        embedder,
        knowledge_base,
        chat_history,
    )?))
}
