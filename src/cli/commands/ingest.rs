//! Ingest command implementation.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use super::build_pipeline;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, SourceKind};
use crate::services::{IngestPipeline, IngestReport, IngestWatcher, ScanProgress};
use crate::utils::file_name_string;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Documents,
    Transcripts,
    All,
}

impl KindArg {
    pub fn kinds(self) -> Vec<SourceKind> {
        match self {
            KindArg::Documents => vec![SourceKind::Document],
            KindArg::Transcripts => vec![SourceKind::Transcript],
            KindArg::All => vec![SourceKind::Document, SourceKind::Transcript],
        }
    }
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Which source directories to ingest
    #[arg(long, short = 'k', value_enum, default_value = "all")]
    pub kind: KindArg,

    /// Keep running and ingest files as they appear
    #[arg(long, short = 'w')]
    pub watch: bool,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let pipeline = build_pipeline(&config)?;
    let kinds = args.kind.kinds();

    if args.watch {
        if verbose {
            eprintln!(
                "Watching {} for new files (Ctrl-C to stop)",
                describe_dirs(&pipeline, &kinds)
            );
        }
        let watcher = IngestWatcher::new(pipeline, kinds, config.watch.settle_ms)?;
        watcher.watch().await?;
        return Ok(());
    }

    let formatter = get_formatter(format);
    let mut report = IngestReport::default();
    for kind in kinds {
        report.extend(ingest_kind(&pipeline, kind, format, verbose).await?);
    }

    print!("{}", formatter.format_ingest_report(&report));
    Ok(())
}

async fn ingest_kind(
    pipeline: &IngestPipeline,
    kind: SourceKind,
    format: OutputFormat,
    verbose: bool,
) -> Result<IngestReport> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");
    let source_dir = pipeline.tracker(kind).source_dir().display().to_string();

    let mut pb: Option<ProgressBar> = None;
    let report = pipeline
        .scan_with(kind, |step| match step {
            ScanProgress::Found(count) => {
                if verbose {
                    eprintln!("Found {} new {} file(s) in {}", count, kind, source_dir);
                }
                if format == OutputFormat::Text && count > 0 {
                    let bar = ProgressBar::new(count as u64);
                    bar.set_style(style.clone());
                    pb = Some(bar);
                }
            }
            ScanProgress::Started(path) => {
                if let Some(bar) = &pb {
                    bar.set_message(file_name_string(path));
                }
            }
            ScanProgress::Finished(_) => {
                if let Some(bar) = &pb {
                    bar.inc(1);
                }
            }
        })
        .await?;

    if let Some(bar) = pb {
        bar.finish_and_clear();
    }
    Ok(report)
}

fn describe_dirs(pipeline: &Arc<IngestPipeline>, kinds: &[SourceKind]) -> String {
    kinds
        .iter()
        .map(|&k| pipeline.tracker(k).source_dir().display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
