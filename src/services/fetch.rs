//! Web pages → readable article text → PDFs in the documents directory.
//!
//! A links file lists one URL per line. Every URL converted successfully is appended to a
//! log, and the links file is rewritten to hold only the URLs still pending, so a failed
//! page is simply tried again on the next run.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::error::FetchError;
use crate::log_event;
use crate::models::FetchConfig;
use crate::services::pdf::render_text_document;

const MAX_STEM_CHARS: usize = 100;
const UNTITLED: &str = "Untitled_Article";

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static ROOTS: LazyLock<[Selector; 4]> = LazyLock::new(|| {
    ["article", "main", "[role=main]", "body"].map(|s| Selector::parse(s).unwrap())
});
static BLOCKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre").unwrap()
});
static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s[|\-\u{2013}\u{2014}]\s").unwrap());
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static SPACES_AND_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s.]+").unwrap());

const SKIPPED_CONTAINERS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "template", "form",
];
const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote", "pre",
];

/// The readable part of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub paragraphs: Vec<String>,
}

/// Title and text blocks of an HTML page. Navigation, headers, footers and scripts are left
/// out, and a block nested in another block is only kept through its parent.
pub fn extract_article(html: &str) -> Article {
    let document = Html::parse_document(html);

    let raw_title = document
        .select(&TITLE)
        .next()
        .map(|t| element_text(&t))
        .unwrap_or_default();
    let mut title = short_title(&raw_title);
    if title.is_empty() {
        title = document
            .select(&H1)
            .next()
            .map(|h| element_text(&h))
            .unwrap_or_default();
    }

    let root = ROOTS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut paragraphs: Vec<String> = Vec::new();
    for block in root.select(&BLOCKS) {
        if inside(&block, SKIPPED_CONTAINERS) || inside(&block, BLOCK_TAGS) {
            continue;
        }
        let text = element_text(&block);
        if text.is_empty() || (paragraphs.is_empty() && text == title) {
            continue;
        }
        paragraphs.push(text);
    }

    Article { title, paragraphs }
}

/// Page title without a trailing (or, for short titles, leading) site name:
/// `"Vector Search Basics | Example Blog"` → `"Vector Search Basics"`.
pub fn short_title(raw: &str) -> String {
    let title = collapse(raw);
    let separators: Vec<_> = TITLE_SEPARATOR.find_iter(&title).collect();
    let (Some(first), Some(last)) = (separators.first(), separators.last()) else {
        return title;
    };

    let before_last = title[..last.start()].trim();
    if before_last.split_whitespace().count() >= 3 {
        return before_last.to_string();
    }
    let after_first = title[first.end()..].trim();
    if after_first.split_whitespace().count() >= 3 {
        return after_first.to_string();
    }
    title
}

/// File name for an article: characters unsafe in file names removed, whitespace and dots
/// turned into underscores, at most a hundred characters before `.pdf`.
pub fn pdf_file_name(title: &str) -> String {
    let stem = UNSAFE_FILENAME_CHARS.replace_all(title.trim(), "");
    let stem = SPACES_AND_DOTS.replace_all(&stem, "_");
    let stem: String = stem.trim_matches('_').chars().take(MAX_STEM_CHARS).collect();
    if stem.is_empty() {
        format!("{UNTITLED}.pdf")
    } else {
        format!("{stem}.pdf")
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    collapse(&element.text().collect::<String>())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inside(element: &ElementRef<'_>, tags: &[&str]) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|e| tags.contains(&e.name()))
    })
}

/// The links file and the log of URLs already converted.
#[derive(Debug, Clone)]
pub struct LinkLedger {
    links_file: PathBuf,
    processed_log: PathBuf,
}

impl LinkLedger {
    pub fn new(links_file: PathBuf, processed_log: PathBuf) -> Self {
        Self {
            links_file,
            processed_log,
        }
    }

    pub fn links_file(&self) -> &Path {
        &self.links_file
    }

    /// Every URL in the links file.
    pub fn links(&self) -> Result<BTreeSet<String>, FetchError> {
        if !self.links_file.is_file() {
            return Err(FetchError::MissingLinks(self.links_file.clone()));
        }
        Ok(read_lines(&self.links_file)?)
    }

    /// URLs converted on earlier runs. An unreadable log counts as empty.
    pub fn processed(&self) -> BTreeSet<String> {
        if !self.processed_log.exists() {
            return BTreeSet::new();
        }
        read_lines(&self.processed_log).unwrap_or_else(|e| {
            tracing::warn!(
                "[fetch] could not read {}: {e}",
                self.processed_log.display()
            );
            BTreeSet::new()
        })
    }

    /// Links not yet converted, sorted.
    pub fn pending(&self) -> Result<Vec<String>, FetchError> {
        let processed = self.processed();
        Ok(self
            .links()?
            .into_iter()
            .filter(|url| !processed.contains(url))
            .collect())
    }

    pub fn record(&self, url: &str) -> Result<(), FetchError> {
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.processed_log)?;
        writeln!(log, "{url}")?;
        Ok(())
    }

    /// Rewrite the links file without the converted URLs. Returns how many were removed.
    pub fn prune(&self) -> Result<usize, FetchError> {
        let links = self.links()?;
        let processed = self.processed();
        let remaining: Vec<&String> = links.iter().filter(|u| !processed.contains(*u)).collect();

        let mut content = String::new();
        for url in &remaining {
            content.push_str(url);
            content.push('\n');
        }
        crate::utils::write_atomic(&self.links_file, content.as_bytes())?;
        Ok(links.len() - remaining.len())
    }
}

fn read_lines(path: &Path) -> std::io::Result<BTreeSet<String>> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// What happened to one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkOutcome {
    Saved { file: String, pages: u32 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: LinkOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub links: Vec<LinkReport>,
    /// URLs dropped from the links file after the run.
    pub removed: usize,
}

impl FetchReport {
    pub fn saved(&self) -> usize {
        self.links
            .iter()
            .filter(|l| matches!(l.outcome, LinkOutcome::Saved { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.links.len() - self.saved()
    }
}

/// Steps of a fetch run: one `Found`, then `Started`/`Finished` per link.
#[derive(Debug)]
pub enum FetchProgress<'a> {
    Found(usize),
    Started(&'a str),
    Finished(&'a LinkReport),
}

/// Downloads pending links and writes them as PDFs for the document ingester.
pub struct PageFetcher {
    client: reqwest::Client,
    user_agent: String,
    ledger: LinkLedger,
    data_dir: PathBuf,
    processed_dir: PathBuf,
}

impl PageFetcher {
    pub fn new(
        config: &FetchConfig,
        ledger: LinkLedger,
        data_dir: PathBuf,
        processed_dir: PathBuf,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::RequestFailed {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            ledger,
            data_dir,
            processed_dir,
        })
    }

    pub fn ledger(&self) -> &LinkLedger {
        &self.ledger
    }

    /// Convert every pending link. Successes are logged as they happen; the links file is
    /// pruned once at the end when anything succeeded.
    pub async fn run(
        &self,
        mut progress: impl FnMut(FetchProgress<'_>),
    ) -> Result<FetchReport, FetchError> {
        std::fs::create_dir_all(&self.data_dir)?;
        let pending = self.ledger.pending()?;
        log_event!("fetch", "pending", "{} link(s)", pending.len());
        progress(FetchProgress::Found(pending.len()));

        let mut report = FetchReport::default();
        for url in pending {
            progress(FetchProgress::Started(&url));
            let outcome = match self.fetch_one(&url).await {
                Ok((file, pages)) => {
                    self.ledger.record(&url)?;
                    log_event!("fetch", "saved", "{} -> {}", url, file);
                    LinkOutcome::Saved { file, pages }
                }
                Err(e) => {
                    tracing::warn!("[fetch] failed: {url}: {e}");
                    LinkOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            let link = LinkReport { url, outcome };
            progress(FetchProgress::Finished(&link));
            report.links.push(link);
        }

        if report.saved() > 0 {
            report.removed = self.ledger.prune()?;
        }
        Ok(report)
    }

    /// Download one page and write it as a PDF. Returns the file name and page count.
    pub async fn fetch_one(&self, url: &str) -> Result<(String, u32), FetchError> {
        let request_failed = |e: reqwest::Error| FetchError::RequestFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let html = response.text().await.map_err(request_failed)?;

        let article = extract_article(&html);
        if article.paragraphs.is_empty() {
            return Err(FetchError::NoContent(url.to_string()));
        }

        let target = self.available_path(&pdf_file_name(&article.title));
        let file = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let pages = tokio::task::spawn_blocking(move || {
            render_text_document(&article.title, &article.paragraphs, &target)
        })
        .await
        .map_err(|e| FetchError::IoError(std::io::Error::other(e)))??;

        Ok((file, pages))
    }

    /// `name` in the data directory, numbered when it is already taken there or among the
    /// processed documents (the ingester would otherwise never pick it up).
    fn available_path(&self, name: &str) -> PathBuf {
        let taken = |n: &str| self.data_dir.join(n).exists() || self.processed_dir.join(n).exists();
        if !taken(name) {
            return self.data_dir.join(name);
        }
        let stem = name.strip_suffix(".pdf").unwrap_or(name);
        (2..)
            .map(|k| format!("{stem}_{k}.pdf"))
            .find(|candidate| !taken(candidate))
            .map(|candidate| self.data_dir.join(candidate))
            .unwrap_or_else(|| self.data_dir.join(name))
    }
}
