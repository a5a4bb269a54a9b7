mod common;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;

use common::{Harness, file_names};
use ragchat::models::{FetchConfig, SourceKind};
use ragchat::services::{FileOutcome, LinkLedger, LinkOutcome, PageFetcher, PdfDocument};

const ARTICLE: &str = r#"<html>
<head><title>Chunk Overlap Explained | Search Notes</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <main>
    <h1>Chunk Overlap Explained</h1>
    <p>Overlapping windows keep sentences that straddle a boundary retrievable.</p>
    <p>Two hundred characters of overlap is a common default.</p>
  </main>
</body>
</html>"#;

async fn spawn_site() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/overlap", get(|| async { Html(ARTICLE) }))
        .route("/empty", get(|| async { Html("<html><body><nav>menu</nav></body></html>") }))
        .route("/gone", get(|| async { StatusCode::NOT_FOUND }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

fn fetcher(h: &Harness, links: &std::path::Path) -> PageFetcher {
    PageFetcher::new(
        &FetchConfig::default(),
        LinkLedger::new(links.to_path_buf(), h.dir.path().join("processed_links.log")),
        h.config.paths.data_dir.clone(),
        h.config.paths.processed_data_dir(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_links_become_ingestible_pdfs() {
    let h = Harness::new();
    let (base, server) = spawn_site().await;
    let links = h.dir.path().join("link.txt");
    std::fs::write(&links, format!("{base}/overlap\n{base}/gone\n{base}/empty\n")).unwrap();

    let report = fetcher(&h, &links).run(|_| {}).await.unwrap();
    assert_eq!(report.saved(), 1);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.removed, 1);

    let saved = report
        .links
        .iter()
        .find(|l| l.url.ends_with("/overlap"))
        .unwrap();
    assert_eq!(
        saved.outcome,
        LinkOutcome::Saved {
            file: "Chunk_Overlap_Explained.pdf".to_string(),
            pages: 1,
        }
    );

    // Failed links stay for the next run; converted ones are logged.
    let remaining = std::fs::read_to_string(&links).unwrap();
    assert_eq!(remaining, format!("{base}/empty\n{base}/gone\n"));
    let log = std::fs::read_to_string(h.dir.path().join("processed_links.log")).unwrap();
    assert_eq!(log, format!("{base}/overlap\n"));

    let pdf_path = h.config.paths.data_dir.join("Chunk_Overlap_Explained.pdf");
    let pdf = PdfDocument::open(&pdf_path).unwrap();
    let text = &pdf.page_texts()[0].text;
    assert!(text.contains("Chunk Overlap Explained"));
    assert!(text.contains("Overlapping windows"));

    let ingest = h.pipeline.scan(SourceKind::Document).await.unwrap();
    let FileOutcome::Ingested { chunks } = ingest.files[0].outcome else {
        panic!("unexpected outcome: {:?}", ingest.files[0].outcome);
    };
    assert_eq!(
        h.knowledge_base
            .count(Some("Chunk_Overlap_Explained.pdf"))
            .await
            .unwrap(),
        chunks as u64
    );

    server.abort();
}

#[tokio::test]
async fn test_second_run_only_retries_failures() {
    let h = Harness::new();
    let (base, server) = spawn_site().await;
    let links = h.dir.path().join("link.txt");
    std::fs::write(&links, format!("{base}/overlap\n{base}/gone\n")).unwrap();

    let first = fetcher(&h, &links).run(|_| {}).await.unwrap();
    assert_eq!(first.saved(), 1);

    // Someone re-adds the converted URL; the log keeps it from being fetched again.
    std::fs::write(&links, format!("{base}/overlap\n{base}/gone\n")).unwrap();
    let second = fetcher(&h, &links).run(|_| {}).await.unwrap();
    assert_eq!(second.links.len(), 1);
    assert!(second.links[0].url.ends_with("/gone"));
    assert_eq!(second.saved(), 0);
    // Nothing succeeded, so the links file is left as it was.
    assert_eq!(second.removed, 0);
    assert_eq!(
        std::fs::read_to_string(&links).unwrap(),
        format!("{base}/overlap\n{base}/gone\n")
    );
    assert_eq!(
        file_names(&h.config.paths.data_dir),
        vec!["Chunk_Overlap_Explained.pdf"]
    );

    server.abort();
}
