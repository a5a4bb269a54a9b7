//! Watch the source directories and ingest files once they stop changing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

use crate::error::WatchError;
use crate::models::SourceKind;
use crate::services::ingest::IngestPipeline;
use crate::{debug_event, log_event};

/// Holds paths until they have been quiet for the settle period.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, Instant>,
    duration: Duration,
}

impl Debouncer {
    pub fn new(settle_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(settle_ms),
        }
    }

    /// Record a change, restarting the settle timer for `path`.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Paths quiet for at least the settle period, removed from pending.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_change| {
            if now.duration_since(*last_change) >= self.duration {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Background ingestion driven by filesystem events.
pub struct IngestWatcher {
    pipeline: Arc<IngestPipeline>,
    kinds: Vec<SourceKind>,
    debouncer: Debouncer,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    watcher: notify::RecommendedWatcher,
}

impl IngestWatcher {
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        kinds: Vec<SourceKind>,
        settle_ms: u64,
    ) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel(100);

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(Self {
            pipeline,
            kinds,
            debouncer: Debouncer::new(settle_ms),
            event_rx: rx,
            watcher,
        })
    }

    /// Run an initial scan of every kind, then ingest files as they settle.
    ///
    /// A kind whose collection cannot be ensured is dropped from the watch set.
    pub async fn watch(mut self) -> Result<(), WatchError> {
        let mut active = Vec::new();
        for &kind in &self.kinds {
            match self.pipeline.scan(kind).await {
                Ok(report) => {
                    log_event!(
                        "watcher",
                        "initial scan",
                        "{}: {} ingested, {} skipped, {} failed",
                        kind,
                        report.ingested(),
                        report.skipped(),
                        report.failed()
                    );
                    active.push(kind);
                }
                Err(e) => tracing::error!("[watcher] not watching {kind} files: {e}"),
            }
        }
        if active.is_empty() {
            return Err(WatchError::InitFailed(
                "no source directory could be watched".to_string(),
            ));
        }
        self.kinds = active;

        for kind in self.kinds.clone() {
            let dir = self.pipeline.tracker(kind).source_dir().to_path_buf();
            self.watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::PathWatchFailed {
                    path: dir.clone(),
                    reason: e.to_string(),
                })?;
            log_event!("watcher", "watching", "{} ({} files)", dir.display(), kind);
        }

        // Fires on schedule even while events keep arriving.
        let mut ticker = interval(Duration::from_millis(100));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.event_rx.recv() => {
                    match received {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                        None => return Err(WatchError::ChannelClosed),
                    }
                }

                _ = ticker.tick() => {
                    if self.debouncer.has_pending() {
                        for path in self.debouncer.take_ready() {
                            self.process(&path).await;
                        }
                    }
                }
            }
        }
    }

    fn kind_for(&self, path: &Path) -> Option<SourceKind> {
        self.kinds
            .iter()
            .copied()
            .find(|&kind| self.pipeline.tracker(kind).accepts(path))
    }

    fn handle_event(&mut self, event: Event) {
        for path in event.paths {
            if self.kind_for(&path).is_none() {
                continue;
            }
            match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) => self.debouncer.record(path),
                EventKind::Remove(_) => self.debouncer.remove(&path),
                _ => {}
            }
        }
    }

    async fn process(&self, path: &Path) {
        let Some(kind) = self.kind_for(path) else {
            return;
        };
        // Moved away (usually by us) or deleted before it settled.
        if !path.is_file() {
            return;
        }
        if self.pipeline.tracker(kind).is_processed(path) {
            debug_event!("watcher", "already processed", "{}", path.display());
            return;
        }
        self.pipeline.ingest_path(path, kind).await;
    }
}
