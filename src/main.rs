use anyhow::Result;
use clap::Parser;

use ragchat::cli::commands::{
    handle_config, handle_fetch, handle_history, handle_ingest, handle_serve, handle_split,
    handle_status,
};
use ragchat::cli::{Cli, Commands, shutdown_signal};
use ragchat::logging;
use ragchat::models::{Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_default();
    logging::init_with_config(&config.logging, cli.verbose);

    let format = cli.format.unwrap_or_default();
    let verbose = cli.verbose;

    // The server drains in-flight requests on its own shutdown signal.
    if let Commands::Serve(args) = cli.command {
        return handle_serve(args, verbose).await;
    }

    tokio::select! {
        result = run_command(cli.command, format, verbose) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat, verbose: bool) -> Result<()> {
    match command {
        Commands::Ingest(args) => {
            handle_ingest(args, format, verbose).await?;
        }
        Commands::Fetch(args) => {
            handle_fetch(args, format, verbose).await?;
        }
        Commands::Split(args) => {
            handle_split(args, format, verbose).await?;
        }
        Commands::History(cmd) => {
            handle_history(cmd, format, verbose).await?;
        }
        Commands::Status => {
            handle_status(format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, format, verbose).await?;
        }
        Commands::Serve(args) => {
            handle_serve(args, verbose).await?;
        }
    }

    Ok(())
}
