use anyhow::Result;

use crate::cli::output::{CollectionStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, SourceKind, VectorDriver};
use crate::services::{IngestionTracker, SharedVectorStore, create_backends};

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (knowledge_base, chat_history) =
        create_backends(&config.vector_store, config.embedding.dimension)?;
    let connected = knowledge_base.health_check().await.unwrap_or(false);

    let collections = if connected {
        vec![
            collection_status(&knowledge_base).await,
            collection_status(&chat_history).await,
        ]
    } else {
        Vec::new()
    };

    let paths = &config.paths;
    let documents = IngestionTracker::new(
        paths.data_dir.clone(),
        paths.processed_data_dir(),
        SourceKind::Document,
    );
    let transcripts = IngestionTracker::new(
        paths.chat_history_dir.clone(),
        paths.processed_chat_history_dir(),
        SourceKind::Transcript,
    );

    let status = StatusInfo {
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected: connected,
        collections,
        embedding_model: config.embedding.model.clone(),
        generation_model: config.generation.model.clone(),
        api_key_set: config.embedding.api_key.is_some(),
        pending_documents: pending_count(&documents),
        pending_transcripts: pending_count(&transcripts),
    };

    print!("{}", formatter.format_status(&status));
    if format == OutputFormat::Json {
        println!();
    }

    if !connected && config.vector_store.driver == VectorDriver::Qdrant {
        eprintln!();
        eprintln!("Warning: Qdrant not reachable. Start with: docker run -p 6333:6333 -p 6334:6334 qdrant/qdrant");
    }
    if !status.api_key_set {
        eprintln!("Hint: set GEMINI_API_KEY in the environment or a .env file.");
    }

    Ok(())
}

async fn collection_status(store: &SharedVectorStore) -> CollectionStatus {
    match store.collection_info().await {
        Ok(Some(info)) => CollectionStatus {
            name: info.name,
            exists: true,
            points_count: info.points_count,
            dimension: Some(info.dimension),
        },
        Ok(None) | Err(_) => CollectionStatus {
            name: store.collection().to_string(),
            exists: false,
            points_count: 0,
            dimension: None,
        },
    }
}

fn pending_count(tracker: &IngestionTracker) -> usize {
    tracker.new_files().map(|files| files.len()).unwrap_or(0)
}
