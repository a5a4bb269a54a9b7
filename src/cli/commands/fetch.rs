//! Fetch command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::output::get_formatter;
use crate::error::FetchError;
use crate::models::{Config, OutputFormat};
use crate::services::{FetchProgress, LinkLedger, PageFetcher};

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// File with one URL per line [default: fetch.links_file]
    pub links_file: Option<PathBuf>,

    /// Log of URLs already converted [default: fetch.processed_log]
    #[arg(long)]
    pub log: Option<PathBuf>,
}

pub async fn handle_fetch(args: FetchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let ledger = LinkLedger::new(
        args.links_file.unwrap_or_else(|| config.fetch.links_file.clone()),
        args.log.unwrap_or_else(|| config.fetch.processed_log.clone()),
    );
    let fetcher = PageFetcher::new(
        &config.fetch,
        ledger,
        config.paths.data_dir.clone(),
        config.paths.processed_data_dir(),
    )?;

    let links_file = fetcher.ledger().links_file().display().to_string();
    match fetcher.ledger().links() {
        Ok(links) if links.is_empty() => {
            println!(
                "{}",
                formatter.format_message(&format!(
                    "The file '{links_file}' is empty. Add some URLs to convert, one per line."
                ))
            );
            return Ok(());
        }
        Ok(_) => {}
        Err(FetchError::MissingLinks(_)) => {
            anyhow::bail!(
                "links file '{links_file}' not found. Create it with one URL per line."
            );
        }
        Err(e) => return Err(e.into()),
    }

    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");
    let mut pb: Option<ProgressBar> = None;
    let report = fetcher
        .run(|step| match step {
            FetchProgress::Found(count) => {
                if verbose {
                    eprintln!("Found {count} new link(s) in {links_file}");
                }
                if format == OutputFormat::Text && count > 0 {
                    let bar = ProgressBar::new(count as u64);
                    bar.set_style(style.clone());
                    pb = Some(bar);
                }
            }
            FetchProgress::Started(url) => {
                if let Some(bar) = &pb {
                    bar.set_message(url.to_string());
                }
            }
            FetchProgress::Finished(_) => {
                if let Some(bar) = &pb {
                    bar.inc(1);
                }
            }
        })
        .await?;
    if let Some(bar) = pb {
        bar.finish_and_clear();
    }

    if report.links.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No new links to process. Everything in '{links_file}' has been converted."
            ))
        );
        return Ok(());
    }

    print!("{}", formatter.format_fetch_report(&report));
    if report.saved() > 0 && format == OutputFormat::Text {
        println!("Run `ragchat ingest --kind documents` to embed the new PDFs.");
    }
    Ok(())
}
