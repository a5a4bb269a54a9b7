use std::fmt::Write as FmtWrite;

use console::style;

use crate::models::{LevelSummary, OutputFormat, SplitSummary};
use crate::services::{FetchReport, FileOutcome, FileReport, HistoryEntry, IngestReport, LinkOutcome};

pub trait Formatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_file_report(&self, report: &FileReport) -> String;
    fn format_fetch_report(&self, report: &FetchReport) -> String;
    fn format_levels(&self, source: &str, levels: &[LevelSummary]) -> String;
    fn format_split_summary(&self, summary: &SplitSummary) -> String;
    fn format_history(&self, entries: &[HistoryEntry]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub exists: bool,
    pub points_count: u64,
    pub dimension: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusInfo {
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collections: Vec<CollectionStatus>,
    pub embedding_model: String,
    pub generation_model: String,
    pub api_key_set: bool,
    pub pending_documents: usize,
    pub pending_transcripts: usize,
}

pub struct TextFormatter;

fn outcome_label(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Ingested { chunks } => {
            format!("{} {} chunks", style("[OK]").green(), chunks)
        }
        FileOutcome::Skipped { reason } => format!("{} {}", style("[SKIP]").yellow(), reason),
        FileOutcome::Failed { error } => format!("{} {}", style("[FAIL]").red(), error),
    }
}

impl Formatter for TextFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        if report.is_empty() {
            return "No new files to ingest.\n".to_string();
        }

        let mut output = String::new();
        for file in &report.files {
            writeln!(
                output,
                "  {:<11} {}  {}",
                file.kind.label(),
                file.file,
                outcome_label(&file.outcome)
            )
            .unwrap();
        }
        writeln!(output).unwrap();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Files ingested:  {}", report.ingested()).unwrap();
        writeln!(output, "Files skipped:   {}", report.skipped()).unwrap();
        writeln!(output, "Files failed:    {}", report.failed()).unwrap();
        writeln!(output, "Chunks stored:   {}", report.total_chunks()).unwrap();
        output
    }

    fn format_file_report(&self, report: &FileReport) -> String {
        format!(
            "{} ({}): {}\n",
            report.file,
            report.kind,
            outcome_label(&report.outcome)
        )
    }

    fn format_fetch_report(&self, report: &FetchReport) -> String {
        let mut output = String::new();
        for link in &report.links {
            let label = match &link.outcome {
                LinkOutcome::Saved { file, pages } => {
                    format!("{} {} ({} pages)", style("[OK]").green(), file, pages)
                }
                LinkOutcome::Failed { error } => format!("{} {}", style("[FAIL]").red(), error),
            };
            writeln!(output, "  {}  {}", link.url, label).unwrap();
        }
        writeln!(output).unwrap();
        writeln!(output, "PDFs created:    {}", report.saved()).unwrap();
        writeln!(output, "Links failed:    {}", report.failed()).unwrap();
        writeln!(output, "Links removed:   {}", report.removed).unwrap();
        output
    }

    fn format_levels(&self, source: &str, levels: &[LevelSummary]) -> String {
        let mut output = String::new();
        writeln!(output, "Bookmark levels in {}:", style(source).bold()).unwrap();
        for level in levels {
            let examples: Vec<String> = level.examples.iter().map(|e| format!("'{e}'")).collect();
            writeln!(
                output,
                "  Level {}: {} items (e.g., {})",
                level.level,
                level.count,
                examples.join(", ")
            )
            .unwrap();
        }
        output
    }

    fn format_split_summary(&self, summary: &SplitSummary) -> String {
        let mut output = String::new();
        writeln!(
            output,
            "{} {} at level {}",
            style("Split").green().bold(),
            summary.source,
            summary.level
        )
        .unwrap();
        for chapter in &summary.chapters_written {
            writeln!(output, "  + {}", chapter).unwrap();
        }
        for skipped in &summary.skipped {
            writeln!(
                output,
                "  {} {} ({})",
                style("-").dim(),
                skipped.title,
                skipped.reason
            )
            .unwrap();
        }
        writeln!(
            output,
            "Merged: {} ({} of {} pages)",
            summary.merged_path, summary.merged_pages, summary.original_pages
        )
        .unwrap();
        output
    }

    fn format_history(&self, entries: &[HistoryEntry]) -> String {
        if entries.is_empty() {
            return "No saved conversations.\n".to_string();
        }

        let mut output = String::new();
        for (i, entry) in entries.iter().enumerate() {
            writeln!(output, "{}. {}", i + 1, style(&entry.summary).bold()).unwrap();
            writeln!(output, "   File:      {}", entry.filename).unwrap();
            writeln!(output, "   Timestamp: {}", entry.timestamp).unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let store_status = if status.vector_store_connected {
            style("[CONNECTED]").green()
        } else {
            style("[DISCONNECTED]").red()
        };
        writeln!(
            output,
            "Vector Store:  {} ({})",
            store_status, status.vector_store_driver
        )
        .unwrap();
        writeln!(output, "  URL:         {}", status.vector_store_url).unwrap();
        for collection in &status.collections {
            if collection.exists {
                let dimension = collection
                    .dimension
                    .map(|d| format!(", dim {d}"))
                    .unwrap_or_default();
                writeln!(
                    output,
                    "  {}: {} points{}",
                    collection.name, collection.points_count, dimension
                )
                .unwrap();
            } else {
                writeln!(output, "  {}: (not created)", collection.name).unwrap();
            }
        }

        writeln!(output).unwrap();
        writeln!(output, "Gemini").unwrap();
        writeln!(output, "  Embedding:   {}", status.embedding_model).unwrap();
        writeln!(output, "  Generation:  {}", status.generation_model).unwrap();
        let key = if status.api_key_set {
            style("set").green()
        } else {
            style("missing").red()
        };
        writeln!(output, "  API key:     {}", key).unwrap();

        writeln!(output).unwrap();
        writeln!(output, "Pending").unwrap();
        writeln!(output, "  Documents:   {}", status.pending_documents).unwrap();
        writeln!(output, "  Transcripts: {}", status.pending_transcripts).unwrap();

        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    fn render(&self, json: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(json).unwrap()
        } else {
            serde_json::to_string(json).unwrap()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let json = serde_json::json!({
            "files": report.files,
            "ingested": report.ingested(),
            "skipped": report.skipped(),
            "failed": report.failed(),
            "chunks": report.total_chunks(),
        });
        self.render(&json)
    }

    fn format_file_report(&self, report: &FileReport) -> String {
        self.render(&serde_json::json!(report))
    }

    fn format_fetch_report(&self, report: &FetchReport) -> String {
        let json = serde_json::json!({
            "links": report.links,
            "saved": report.saved(),
            "failed": report.failed(),
            "removed": report.removed,
        });
        self.render(&json)
    }

    fn format_levels(&self, source: &str, levels: &[LevelSummary]) -> String {
        self.render(&serde_json::json!({"source": source, "levels": levels}))
    }

    fn format_split_summary(&self, summary: &SplitSummary) -> String {
        self.render(&serde_json::json!(summary))
    }

    fn format_history(&self, entries: &[HistoryEntry]) -> String {
        self.render(&serde_json::json!({"files": entries}))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(&serde_json::json!(status))
    }

    fn format_message(&self, message: &str) -> String {
        self.render(&serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        self.render(&serde_json::json!({"error": error}))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter { pretty: true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn report() -> IngestReport {
        let mut report = IngestReport::default();
        report.push(FileReport {
            file: "book.pdf".to_string(),
            kind: SourceKind::Document,
            outcome: FileOutcome::Ingested { chunks: 12 },
        });
        report.push(FileReport {
            file: "chat.json".to_string(),
            kind: SourceKind::Transcript,
            outcome: FileOutcome::Skipped {
                reason: "empty transcript".to_string(),
            },
        });
        report
    }

    #[test]
    fn test_text_ingest_report() {
        console::set_colors_enabled(false);
        let output = TextFormatter.format_ingest_report(&report());
        assert!(output.contains("book.pdf"));
        assert!(output.contains("[OK] 12 chunks"));
        assert!(output.contains("Files skipped:   1"));
        assert!(output.contains("Chunks stored:   12"));
    }

    #[test]
    fn test_json_ingest_report() {
        let formatter = JsonFormatter { pretty: false };
        let value: serde_json::Value =
            serde_json::from_str(&formatter.format_ingest_report(&report())).unwrap();
        assert_eq!(value["chunks"], 12);
        assert_eq!(value["files"][0]["status"], "ingested");
        assert_eq!(value["files"][1]["kind"], "transcript");
        assert_eq!(value["files"][1]["reason"], "empty transcript");
    }

    #[test]
    fn test_text_levels() {
        console::set_colors_enabled(false);
        let levels = vec![LevelSummary {
            level: 0,
            count: 3,
            examples: vec!["Intro".to_string(), "Setup".to_string()],
        }];
        let output = TextFormatter.format_levels("book.pdf", &levels);
        assert!(output.contains("Level 0: 3 items (e.g., 'Intro', 'Setup')"));
    }

    #[test]
    fn test_json_fetch_report() {
        let report = FetchReport {
            links: vec![
                crate::services::LinkReport {
                    url: "https://a.example".to_string(),
                    outcome: LinkOutcome::Saved {
                        file: "A.pdf".to_string(),
                        pages: 2,
                    },
                },
                crate::services::LinkReport {
                    url: "https://b.example".to_string(),
                    outcome: LinkOutcome::Failed {
                        error: "https://b.example returned status 404".to_string(),
                    },
                },
            ],
            removed: 1,
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter { pretty: false }.format_fetch_report(&report))
                .unwrap();
        assert_eq!(value["saved"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["links"][0]["status"], "saved");
        assert_eq!(value["links"][0]["file"], "A.pdf");
        assert_eq!(value["links"][1]["status"], "failed");
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(
            TextFormatter.format_history(&[]),
            "No saved conversations.\n"
        );
    }
}
