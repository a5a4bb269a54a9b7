use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::cli::shutdown_signal;
use crate::log_event;
use crate::models::{Config, SourceKind};
use crate::server::{self, AppContext};
use crate::services::IngestWatcher;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Also watch the source directories and ingest new files in the background
    #[arg(long, short = 'w')]
    pub watch: bool,
}

pub async fn handle_serve(args: ServeArgs, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let settle_ms = config.watch.settle_ms;

    let state = Arc::new(AppContext::from_config(config)?);
    state.prepare().await?;

    if args.watch {
        let watcher = IngestWatcher::new(
            state.pipeline.clone(),
            vec![SourceKind::Document, SourceKind::Transcript],
            settle_ms,
        )?;
        tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                tracing::error!("[watcher] stopped: {e}");
            }
        });
    }

    if verbose {
        eprintln!("Starting server on {bind}");
    }
    server::run(state, &bind, shutdown_signal()).await?;
    log_event!("serve", "shutdown complete");
    Ok(())
}
