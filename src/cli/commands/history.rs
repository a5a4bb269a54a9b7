use anyhow::Result;
use clap::Subcommand;

use super::build_pipeline;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::HistoryStore;

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List saved conversations, newest first
    List,

    /// Delete every transcript and recreate the chat history collection
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        force: bool,
    },

    /// Re-embed one transcript, replacing its previous points
    Replace {
        /// Transcript file name, e.g. chat_20250101_120000.json
        #[arg(required = true)]
        file: String,
    },
}

pub async fn handle_history(cmd: HistoryCommand, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let store = HistoryStore::new(build_pipeline(&config)?);

    match cmd {
        HistoryCommand::List => {
            let entries = store.list()?;
            print!("{}", formatter.format_history(&entries));
            if format == OutputFormat::Json {
                println!();
            }
        }
        HistoryCommand::Reset { force } => {
            if !force {
                println!(
                    "This will delete ALL saved conversations and their embeddings. Continue? [y/N]"
                );
                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;
                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", formatter.format_message("Cancelled."));
                    return Ok(());
                }
            }

            store.reset().await?;
            println!(
                "{}",
                formatter.format_message("Chat history has been cleared.")
            );
        }
        HistoryCommand::Replace { file } => {
            if verbose {
                eprintln!("Re-embedding {file}");
            }
            let report = store.replace(&file).await?;
            print!("{}", formatter.format_file_report(&report));
            if format == OutputFormat::Json {
                println!();
            }
        }
    }

    Ok(())
}
