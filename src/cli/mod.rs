//! CLI module for the ragchat binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use tokio::signal;

use crate::models::OutputFormat;

/// Retrieval-augmented chat over your PDFs and past conversations.
#[derive(Debug, Parser)]
#[command(name = "ragchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Embed new PDFs and transcripts into their collections
    Ingest(commands::IngestArgs),

    /// Convert the web pages listed in a links file into PDFs for ingestion
    Fetch(commands::FetchArgs),

    /// Split PDFs by bookmark level and merge the kept chapters
    Split(commands::SplitArgs),

    /// Run the chat HTTP server
    Serve(commands::ServeArgs),

    /// Manage saved conversations
    #[command(subcommand)]
    History(commands::HistoryCommand),

    /// Check vector store, API key and pending files
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

/// Resolves on Ctrl-C or, on unix, SIGTERM. A handler that cannot be installed never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("[signal] failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("[signal] failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
