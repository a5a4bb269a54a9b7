mod common;

use common::{Harness, build_pdf, file_names};
use ragchat::error::HistoryError;
use ragchat::models::{ChatMessage, SourceKind};
use ragchat::services::{FileOutcome, HistoryStore, ScanProgress};

#[tokio::test]
async fn test_transcript_end_to_end() {
    let h = Harness::new();
    h.write_transcript(
        "password_reset.json",
        "Password Reset",
        &[
            ("user", "How do I reset my password?"),
            ("assistant", "Open Settings, then Security, then choose Reset password."),
        ],
    );

    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert_eq!(report.ingested(), 1);
    assert_eq!(report.failed(), 0);

    let chunks = report.total_chunks() as u64;
    assert!(chunks >= 1);
    assert_eq!(
        h.chat_history.count(Some("password_reset.json")).await.unwrap(),
        chunks
    );
    assert_eq!(h.knowledge_base.count(None).await.unwrap_or(0), 0);

    assert!(file_names(&h.raw_transcripts()).is_empty());
    assert_eq!(
        file_names(&h.processed_transcripts()),
        vec!["password_reset.json"]
    );

    let hits = h
        .chat_history
        .search(common::FakeEmbedder::vector("reset my password"), 3)
        .await
        .unwrap();
    assert!(hits.iter().all(|c| c.source == "password_reset.json"));
    assert!(hits[0].content.contains("Chat Summary: Password Reset"));
}

#[tokio::test]
async fn test_second_scan_finds_nothing_new() {
    let h = Harness::new();
    h.write_transcript("a.json", "A", &[("user", "hello there")]);

    let first = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert_eq!(first.ingested(), 1);
    let before = h.chat_history.count(None).await.unwrap();

    let second = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(h.chat_history.count(None).await.unwrap(), before);
}

#[tokio::test]
async fn test_scan_reports_progress_per_file() {
    let h = Harness::new();
    h.write_transcript("a.json", "A", &[("user", "first")]);
    h.write_transcript("b.json", "B", &[("user", "second")]);

    let mut steps = Vec::new();
    let report = h
        .pipeline
        .scan_with(SourceKind::Transcript, |step| {
            steps.push(match step {
                ScanProgress::Found(n) => format!("found {n}"),
                ScanProgress::Started(path) => {
                    format!("start {}", path.file_name().unwrap().to_string_lossy())
                }
                ScanProgress::Finished(file) => format!("done {}", file.file),
            })
        })
        .await
        .unwrap();

    assert_eq!(report.ingested(), 2);
    assert_eq!(
        steps,
        vec!["found 2", "start a.json", "done a.json", "start b.json", "done b.json"]
    );
}

#[tokio::test]
async fn test_failed_file_is_retried_on_next_scan() {
    let h = Harness::new();
    h.write_transcript("flaky.json", "Flaky", &[("user", "will this work")]);

    h.embedder.set_failing(true);
    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.files[0].outcome,
        FileOutcome::Failed { .. }
    ));
    assert_eq!(file_names(&h.raw_transcripts()), vec!["flaky.json"]);
    assert!(file_names(&h.processed_transcripts()).is_empty());

    h.embedder.set_failing(false);
    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert_eq!(report.ingested(), 1);
    assert!(file_names(&h.raw_transcripts()).is_empty());
    assert_eq!(file_names(&h.processed_transcripts()), vec!["flaky.json"]);
    assert!(h.chat_history.count(Some("flaky.json")).await.unwrap() >= 1);
}

#[tokio::test]
async fn test_malformed_transcript_is_skipped_and_moved() {
    let h = Harness::new();
    std::fs::write(h.raw_transcripts().join("broken.json"), "{ not json").unwrap();
    h.write_transcript("empty.json", "Empty", &[]);

    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.ingested(), 0);
    assert_eq!(h.chat_history.count(None).await.unwrap(), 0);
    assert_eq!(
        file_names(&h.processed_transcripts()),
        vec!["broken.json", "empty.json"]
    );
}

#[tokio::test]
async fn test_files_with_other_extensions_are_ignored() {
    let h = Harness::new();
    std::fs::write(h.raw_transcripts().join("notes.txt"), "hello").unwrap();

    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(file_names(&h.raw_transcripts()), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_update_replaces_only_the_named_source() {
    let h = Harness::new();
    h.write_transcript("keep.json", "Keep", &[("user", "keep this conversation")]);
    h.write_transcript("edit.json", "Edit", &[("user", "original question")]);
    h.pipeline.scan(SourceKind::Transcript).await.unwrap();

    let kept_before = h.chat_history.count(Some("keep.json")).await.unwrap();
    assert!(kept_before >= 1);

    let store = HistoryStore::new(h.pipeline.clone());
    let long_answer = "A much longer answer that spans several chunks. ".repeat(20);
    let report = store
        .update(
            "edit.json",
            vec![
                ChatMessage::user("original question"),
                ChatMessage::assistant(long_answer),
            ],
        )
        .await
        .unwrap();

    let FileOutcome::Ingested { chunks } = report.outcome else {
        panic!("unexpected outcome: {:?}", report.outcome);
    };
    assert!(chunks > 1);
    assert_eq!(
        h.chat_history.count(Some("edit.json")).await.unwrap(),
        chunks as u64
    );
    assert_eq!(
        h.chat_history.count(Some("keep.json")).await.unwrap(),
        kept_before
    );
    assert_eq!(
        file_names(&h.processed_transcripts()),
        vec!["edit.json", "keep.json"]
    );

    let loaded = store.load("edit.json").unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], ChatMessage::user("original question"));
}

#[tokio::test]
async fn test_history_save_list_and_reset() {
    let h = Harness::new();
    let store = HistoryStore::new(h.pipeline.clone());

    assert!(store.save(Vec::new()).await.unwrap().is_none());

    let report = store
        .save(vec![
            ChatMessage::user("what is a vector database"),
            ChatMessage::assistant("A store for embeddings."),
        ])
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(report.outcome, FileOutcome::Ingested { .. }));
    assert!(report.file.starts_with("what_is_a_vector_database_"));

    let entries = store.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].filename, report.file);
    assert_eq!(entries[0].summary, "What Is A Vector Database");

    store.reset().await.unwrap();
    assert!(store.list().unwrap().is_empty());
    assert_eq!(h.chat_history.count(None).await.unwrap(), 0);
    assert!(h.processed_transcripts().is_dir());
    assert!(file_names(&h.raw_transcripts()).is_empty());
    assert!(file_names(&h.processed_transcripts()).is_empty());
}

#[tokio::test]
async fn test_load_unknown_transcript_is_not_found() {
    let h = Harness::new();
    let store = HistoryStore::new(h.pipeline.clone());
    assert!(matches!(
        store.load("missing.json"),
        Err(HistoryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_failed_delete_leaves_transcript_in_place() {
    let h = Harness::new();
    h.write_transcript("edit.json", "Edit", &[("user", "original question")]);
    h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    let before = h.chat_history.count(Some("edit.json")).await.unwrap();
    let processed = h.processed_transcripts().join("edit.json");
    let original = std::fs::read_to_string(&processed).unwrap();

    h.chat_history_faults.set_fail_deletes(true);
    let store = HistoryStore::new(h.pipeline.clone());
    let result = store
        .update(
            "edit.json",
            vec![
                ChatMessage::user("original question"),
                ChatMessage::assistant("a rewritten answer"),
            ],
        )
        .await;
    assert!(matches!(result, Err(HistoryError::VectorStore(_))));

    assert!(file_names(&h.raw_transcripts()).is_empty());
    assert_eq!(std::fs::read_to_string(&processed).unwrap(), original);

    // Nothing is left for a later scan to ingest next to the old points.
    let report = h.pipeline.scan(SourceKind::Transcript).await.unwrap();
    assert!(report.is_empty());
    assert_eq!(h.chat_history.count(Some("edit.json")).await.unwrap(), before);
}

#[tokio::test]
async fn test_failed_delete_does_not_requeue_replaced_transcript() {
    let h = Harness::new();
    h.write_transcript("again.json", "Again", &[("user", "index me twice")]);
    h.pipeline.scan(SourceKind::Transcript).await.unwrap();

    h.chat_history_faults.set_fail_deletes(true);
    let store = HistoryStore::new(h.pipeline.clone());
    assert!(store.replace("again.json").await.is_err());
    assert!(file_names(&h.raw_transcripts()).is_empty());
    assert_eq!(file_names(&h.processed_transcripts()), vec!["again.json"]);

    h.chat_history_faults.set_fail_deletes(false);
    let report = store.replace("again.json").await.unwrap();
    let FileOutcome::Ingested { chunks } = report.outcome else {
        panic!("unexpected outcome: {:?}", report.outcome);
    };
    assert_eq!(
        h.chat_history.count(Some("again.json")).await.unwrap(),
        chunks as u64
    );
    assert_eq!(file_names(&h.processed_transcripts()), vec!["again.json"]);
}

#[tokio::test]
async fn test_pdf_pages_reach_the_knowledge_base() {
    let h = Harness::new();
    let path = h.config.paths.data_dir.join("manual.pdf");
    build_pdf(&path, 3, &[]);

    let report = h.pipeline.scan(SourceKind::Document).await.unwrap();
    assert_eq!(report.files.len(), 1);
    let FileOutcome::Ingested { chunks } = report.files[0].outcome else {
        panic!("unexpected outcome: {:?}", report.files[0].outcome);
    };
    assert!(chunks >= 1);
    assert_eq!(
        h.knowledge_base.count(Some("manual.pdf")).await.unwrap(),
        chunks as u64
    );
    assert_eq!(h.chat_history.count(None).await.unwrap_or(0), 0);

    assert!(!path.exists());
    assert_eq!(
        file_names(&h.config.paths.processed_data_dir()),
        vec!["manual.pdf"]
    );

    let hits = h
        .knowledge_base
        .search(common::FakeEmbedder::vector("Page 2 body text"), 3)
        .await
        .unwrap();
    let mut pages: Vec<u32> = hits.iter().filter_map(|c| c.page).collect();
    pages.sort();
    assert_eq!(pages, vec![0, 1, 2]);
    let second = hits.iter().find(|c| c.page == Some(1)).unwrap();
    assert!(second.content.contains("Page 2 body text"));
}
