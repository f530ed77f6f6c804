//! Task orchestration
//!
//! The [`TaskOrchestrator`] owns every per-book task and result and schedules
//! the background workers that fill them in:
//!
//! ```text
//! submit_fetch ──► fetch worker ──► book cache
//!                                     │
//! submit_analysis ──► analysis worker ┴──► analysis cache
//! ```
//!
//! All state lives in one [`TaskStore`] behind a mutex. Submission does its
//! check-and-set under that lock, so two concurrent submissions for the same
//! book schedule at most one worker.

use crate::store::TaskStore;
use crate::stream::{task_updates, StreamEvent};
use futures::{FutureExt, Stream};
use marginalia_domain::{
    AnalysisRecord, BookId, BookRecord, BookSummary, FetchTimings, PartialResults, TaskKey,
    TaskSnapshot, TaskStatus,
};
use marginalia_extractor::{AnalysisPipeline, AnalysisStage};
use marginalia_source::ContentSource;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How the analysis worker drives the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Relay a snapshot for every pipeline stage
    #[default]
    Incremental,
    /// Run the whole pipeline in one call between coarse stages
    Atomic,
}

/// Scheduling parameters for the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Pause between stage transitions; zero only yields
    pub stage_delay: Duration,
    /// Interval between polls of an update stream
    pub stream_poll: Duration,
    /// Analysis worker mode
    pub analysis_mode: AnalysisMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_delay: Duration::from_millis(100),
            stream_poll: Duration::from_millis(250),
            analysis_mode: AnalysisMode::Incremental,
        }
    }
}

/// The two kinds of per-book task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Book fetch
    Fetch,
    /// Book analysis
    Analysis,
}

impl TaskKind {
    /// Active-marker key for a book
    pub fn key(&self, id: &BookId) -> TaskKey {
        match self {
            TaskKind::Fetch => TaskKey::Fetch(id.clone()),
            TaskKind::Analysis => TaskKey::Analysis(id.clone()),
        }
    }

    /// Message reported by a status query once the result is cached
    pub fn cached_message(&self) -> &'static str {
        match self {
            TaskKind::Fetch => "Book is available",
            TaskKind::Analysis => "Analysis is complete",
        }
    }

    /// Message reported by an update stream once the result is cached
    pub fn stream_complete_message(&self) -> &'static str {
        match self {
            TaskKind::Fetch => "Book is available",
            TaskKind::Analysis => "Analysis complete",
        }
    }

    /// Message reported by a status query for an unknown book
    pub fn not_found_message(&self) -> &'static str {
        match self {
            TaskKind::Fetch => "No fetch operation found for this book ID",
            TaskKind::Analysis => "No analysis found for this book ID",
        }
    }

    /// Message reported by an update stream for an unknown book
    pub fn stream_not_found_message(&self) -> &'static str {
        match self {
            TaskKind::Fetch => "No fetch operation found",
            TaskKind::Analysis => "No analysis found",
        }
    }
}

/// Outcome of a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The result is already cached
    Complete,
    /// A task for the book is already processing
    AlreadyRunning,
    /// A new task was initialized
    Started,
    /// Analysis must wait for the book; `fetch_started` is set when this
    /// submission started the fetch
    WaitingForBook {
        /// Whether the fetch was started by this submission
        fetch_started: bool,
    },
    /// The book's fetch failed with this message
    Failed(String),
}

impl Submission {
    /// Status reported to the caller
    pub fn status(&self) -> &'static str {
        match self {
            Submission::Complete => "complete",
            Submission::AlreadyRunning | Submission::Started => "processing",
            Submission::WaitingForBook { .. } => "waiting_for_book",
            Submission::Failed(_) => "error",
        }
    }

    /// Message reported to the caller
    pub fn message(&self, kind: TaskKind) -> String {
        let message = match (self, kind) {
            (Submission::Failed(message), _) => return message.clone(),
            (Submission::Complete, kind) => kind.cached_message(),
            (Submission::AlreadyRunning, TaskKind::Fetch) => "Book fetch is in progress",
            (Submission::AlreadyRunning, TaskKind::Analysis) => "Analysis is already in progress",
            (Submission::Started, TaskKind::Fetch) => "Book fetch started",
            (Submission::Started, TaskKind::Analysis) => "Analysis started",
            (Submission::WaitingForBook { fetch_started: true }, _) => {
                "Waiting for book to be fetched first"
            }
            (Submission::WaitingForBook { fetch_started: false }, _) => {
                "Waiting for book fetch to complete"
            }
        };
        message.to_string()
    }
}

/// Why a record is not available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The task producing it is still processing
    #[error("still in progress")]
    InProgress,
    /// No record and no running task
    #[error("not found")]
    NotFound,
}

/// Debug view of the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTaskReport {
    /// Number of workers in flight
    pub active_task_count: usize,
    /// Identifiers of workers in flight
    pub active_tasks: Vec<String>,
    /// Number of fetch snapshots held
    pub book_fetch_tasks: usize,
    /// Number of analysis snapshots held
    pub analysis_tasks: usize,
}

/// What a status reader currently sees for a task
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observation {
    /// The result is cached
    Cached,
    /// The latest task snapshot
    Live(TaskSnapshot),
    /// Neither a task nor a result exists
    Missing,
}

/// Coordinates fetch and analysis workers over a shared store
pub struct TaskOrchestrator {
    source: Arc<dyn ContentSource>,
    pipeline: AnalysisPipeline,
    config: OrchestratorConfig,
    store: Mutex<TaskStore>,
}

impl TaskOrchestrator {
    /// Create an orchestrator with empty stores
    pub fn new(
        source: Arc<dyn ContentSource>,
        pipeline: AnalysisPipeline,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            pipeline,
            config,
            store: Mutex::new(TaskStore::new()),
        })
    }

    /// Scheduling parameters in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn store(&self) -> MutexGuard<'_, TaskStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Request a book fetch
    ///
    /// Returns immediately; the fetch runs in the background.
    pub fn submit_fetch(self: &Arc<Self>, id: &BookId) -> Submission {
        let (submission, spawn) = {
            let mut store = self.store();
            Self::begin_fetch(&mut store, id)
        };
        if spawn {
            self.spawn_fetch(id.clone());
        }
        submission
    }

    /// Fetch check-and-set; the flag says whether a worker must be spawned
    fn begin_fetch(store: &mut TaskStore, id: &BookId) -> (Submission, bool) {
        if store.book(id).is_some() {
            return (Submission::Complete, false);
        }
        let key = TaskKind::Fetch.key(id);
        // A finished worker holds its marker until it has fully unwound
        if store.fetch_status(id) == Some(TaskStatus::Processing) || store.is_active(&key) {
            debug!("Fetch for book {} already in progress", id);
            return (Submission::AlreadyRunning, false);
        }

        store.set_fetch_task(
            id,
            TaskSnapshot::processing(5, "fetch_init", format!("Starting book fetch for ID {}", id)),
        );
        (Submission::Started, store.activate(key))
    }

    /// Request an analysis of a book
    ///
    /// Starts the book's fetch first if nothing has requested it yet.
    pub fn submit_analysis(self: &Arc<Self>, id: &BookId) -> Submission {
        let mut spawn_fetch = false;
        let mut spawn_analysis = false;

        let submission = {
            let mut store = self.store();

            if store.analysis(id).is_some() {
                Submission::Complete
            } else if store.analysis_status(id) == Some(TaskStatus::Processing)
                || store.is_active(&TaskKind::Analysis.key(id))
            {
                debug!("Analysis for book {} already in progress", id);
                Submission::AlreadyRunning
            } else if store.book(id).is_none() {
                let fetch = store
                    .fetch_task(id)
                    .map(|snapshot| (snapshot.status, snapshot.message.clone()));
                match fetch {
                    None => {
                        let (_, spawn) = Self::begin_fetch(&mut store, id);
                        spawn_fetch = spawn;
                        Submission::WaitingForBook {
                            fetch_started: true,
                        }
                    }
                    Some((TaskStatus::Error, message)) => Submission::Failed(message),
                    Some(_) => Submission::WaitingForBook {
                        fetch_started: false,
                    },
                }
            } else {
                store.set_analysis_task(
                    id,
                    TaskSnapshot::processing(5, "initialization", "Starting analysis..."),
                );
                spawn_analysis = store.activate(TaskKind::Analysis.key(id));
                Submission::Started
            }
        };

        if spawn_fetch {
            self.spawn_fetch(id.clone());
        }
        if spawn_analysis {
            self.spawn_analysis(id.clone());
        }
        submission
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub(crate) fn observe(&self, kind: TaskKind, id: &BookId) -> Observation {
        let store = self.store();
        let (cached, live) = match kind {
            TaskKind::Fetch => (store.book(id).is_some(), store.fetch_task(id)),
            TaskKind::Analysis => (store.analysis(id).is_some(), store.analysis_task(id)),
        };

        if cached {
            Observation::Cached
        } else if let Some(snapshot) = live {
            Observation::Live(snapshot.clone())
        } else {
            Observation::Missing
        }
    }

    fn status(&self, kind: TaskKind, id: &BookId) -> Option<TaskSnapshot> {
        match self.observe(kind, id) {
            Observation::Cached => Some(TaskSnapshot {
                stage: None,
                ..TaskSnapshot::complete(kind.cached_message())
            }),
            Observation::Live(snapshot) => Some(snapshot),
            Observation::Missing => None,
        }
    }

    /// Current fetch state; `None` when the book is unknown
    pub fn fetch_status(&self, id: &BookId) -> Option<TaskSnapshot> {
        self.status(TaskKind::Fetch, id)
    }

    /// Current analysis state; `None` when the book is unknown
    pub fn analysis_status(&self, id: &BookId) -> Option<TaskSnapshot> {
        self.status(TaskKind::Analysis, id)
    }

    /// Coalesced fetch updates until completion, failure or cancellation
    pub fn stream_fetch_updates(
        self: &Arc<Self>,
        id: BookId,
        cancel: CancellationToken,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        task_updates(Arc::clone(self), TaskKind::Fetch, id, cancel)
    }

    /// Coalesced analysis updates until completion, failure or cancellation
    pub fn stream_analysis_updates(
        self: &Arc<Self>,
        id: BookId,
        cancel: CancellationToken,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        task_updates(Arc::clone(self), TaskKind::Analysis, id, cancel)
    }

    /// Metadata, preview and length of a fetched book
    pub fn book_summary(&self, id: &BookId) -> Result<BookSummary, LookupError> {
        let store = self.store();
        match store.book(id) {
            Some(record) => Ok(record.summary()),
            None if store.fetch_status(id) == Some(TaskStatus::Processing) => {
                Err(LookupError::InProgress)
            }
            None => Err(LookupError::NotFound),
        }
    }

    /// The full fetched record, including the cleaned text
    pub fn book_record(&self, id: &BookId) -> Option<Arc<BookRecord>> {
        self.store().book(id)
    }

    /// A completed analysis
    pub fn analysis_record(&self, id: &BookId) -> Result<Arc<AnalysisRecord>, LookupError> {
        let store = self.store();
        match store.analysis(id) {
            Some(record) => Ok(record),
            None if store.analysis_status(id) == Some(TaskStatus::Processing) => {
                Err(LookupError::InProgress)
            }
            None => Err(LookupError::NotFound),
        }
    }

    /// Counts and identifiers of in-flight workers
    pub fn active_tasks(&self) -> ActiveTaskReport {
        let store = self.store();
        ActiveTaskReport {
            active_task_count: store.active_count(),
            active_tasks: store.active_keys().map(ToString::to_string).collect(),
            book_fetch_tasks: store.fetch_task_count(),
            analysis_tasks: store.analysis_task_count(),
        }
    }

    // ── Workers ─────────────────────────────────────────────────────

    fn set_fetch(&self, id: &BookId, snapshot: TaskSnapshot) {
        self.store().set_fetch_task(id, snapshot);
    }

    fn set_analysis(&self, id: &BookId, snapshot: TaskSnapshot) {
        self.store().set_analysis_task(id, snapshot);
    }

    /// Cooperative pause between stage transitions
    async fn pause(&self) {
        if self.config.stage_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.stage_delay).await;
        }
    }

    fn spawn_fetch(self: &Arc<Self>, id: BookId) {
        let marker = ActiveMarker::new(Arc::clone(self), TaskKind::Fetch.key(&id));
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            let _marker = marker;
            let outcome = AssertUnwindSafe(orchestrator.run_fetch(&id))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                let reason = panic_message(panic.as_ref());
                error!("Error in book fetch for {}: {}", id, reason);
                orchestrator.set_fetch(&id, TaskSnapshot::failed(format!("Error during book fetch: {}", reason)));
            }
        });
    }

    fn spawn_analysis(self: &Arc<Self>, id: BookId) {
        let marker = ActiveMarker::new(Arc::clone(self), TaskKind::Analysis.key(&id));
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            let _marker = marker;
            let outcome = AssertUnwindSafe(orchestrator.run_analysis(&id))
                .catch_unwind()
                .await;
            if let Err(panic) = outcome {
                let reason = panic_message(panic.as_ref());
                error!("Error in book analysis for {}: {}", id, reason);
                orchestrator.set_analysis(&id, TaskSnapshot::failed(format!("Error during analysis: {}", reason)));
            }
        });
    }

    async fn run_fetch(&self, id: &BookId) {
        let started = Instant::now();
        info!("Fetching book {}", id);

        self.set_fetch(id, TaskSnapshot::processing(5, "fetch_init", "Starting book fetch..."));
        self.pause().await;

        self.set_fetch(id, TaskSnapshot::processing(10, "metadata_fetch", "Fetching book metadata..."));
        let metadata = match self.source.get_metadata(id).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata fetch for book {} failed: {}", id, e);
                self.set_fetch(id, TaskSnapshot::failed(e.to_string()));
                return;
            }
        };

        self.set_fetch(
            id,
            TaskSnapshot::processing(
                25,
                "content_fetch_starting",
                format!("Metadata retrieved for '{}'. Fetching content...", metadata.title),
            ),
        );
        self.pause().await;

        self.set_fetch(
            id,
            TaskSnapshot::processing(
                30,
                "content_fetch",
                format!("Downloading content for '{}'...", metadata.title),
            ),
        );
        let content_started = Instant::now();
        let raw = match self.source.get_content(id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Content fetch for book {} failed: {}", id, e);
                self.set_fetch(id, TaskSnapshot::failed(e.to_string()));
                return;
            }
        };
        let fetch_duration = content_started.elapsed().as_secs_f64();

        self.set_fetch(
            id,
            TaskSnapshot::processing(
                60,
                "content_cleaning_starting",
                format!(
                    "Content downloaded ({:.1} KB). Cleaning and processing...",
                    raw.len() as f64 / 1024.0
                ),
            ),
        );
        self.pause().await;

        self.set_fetch(
            id,
            TaskSnapshot::processing(70, "content_cleaning", "Cleaning and formatting book content..."),
        );
        let cleaned = self.source.clean_content(&raw);

        self.set_fetch(
            id,
            TaskSnapshot::processing(90, "finalizing", "Content processed, finalizing..."),
        );
        self.pause().await;

        let record = BookRecord::new(metadata, cleaned);
        let timings = FetchTimings {
            fetch_duration,
            total_duration: started.elapsed().as_secs_f64(),
            content_size: record.content_length,
        };
        let message = format!(
            "Book '{}' successfully fetched and processed",
            record.metadata.title
        );
        info!(
            "Book {} fetched ({} characters in {:.2}s)",
            id, record.content_length, timings.total_duration
        );

        let mut store = self.store();
        store.publish_book(id, Arc::new(record));
        store.set_fetch_task(id, TaskSnapshot::complete(message).with_timings(timings));
    }

    async fn run_analysis(&self, id: &BookId) {
        info!("Analyzing book {}", id);
        self.set_analysis(
            id,
            TaskSnapshot::processing(5, "initialization", "Preparing analysis..."),
        );

        let book = self.store().book(id);
        let Some(book) = book else {
            error!("Analysis started for book {} without a fetched record", id);
            self.set_analysis(
                id,
                TaskSnapshot::failed(format!("Error during analysis: book {} is not available", id)),
            );
            return;
        };
        self.pause().await;

        match self.config.analysis_mode {
            AnalysisMode::Incremental => self.relay_incremental(id, &book).await,
            AnalysisMode::Atomic => self.run_atomic(id, &book).await,
        }
    }

    /// Relay every pipeline snapshot, keeping progress non-decreasing
    async fn relay_incremental(&self, id: &BookId, book: &BookRecord) {
        let mut run = self
            .pipeline
            .start(&book.full_content, book.metadata.clone());
        let mut relayed: u8 = 0;

        while let Some(mut snapshot) = run.step(&self.pipeline).await {
            if snapshot.is_processing() {
                if let Some(progress) = snapshot.progress {
                    let floor = snapshot
                        .stage
                        .as_deref()
                        .and_then(AnalysisStage::from_tag)
                        .and_then(|stage| stage.progress_floor())
                        .unwrap_or(0);
                    relayed = progress.max(floor).max(relayed);
                    snapshot.progress = Some(relayed);
                }
            }

            debug!(
                "Analysis of book {} at {} ({:?})",
                id,
                snapshot.stage.as_deref().unwrap_or(snapshot.status.as_str()),
                snapshot.progress
            );

            if snapshot.status == TaskStatus::Complete {
                let record = snapshot
                    .partial_results
                    .clone()
                    .and_then(PartialResults::into_record)
                    .unwrap_or_default();
                let mut store = self.store();
                store.publish_analysis(id, Arc::new(record));
                store.set_analysis_task(id, snapshot);
                info!("Analysis of book {} complete", id);
                return;
            }

            self.set_analysis(id, snapshot);
            self.pause().await;
        }
    }

    /// Run the pipeline in one call, reporting coarse stages around it
    async fn run_atomic(&self, id: &BookId, book: &BookRecord) {
        self.set_analysis(
            id,
            TaskSnapshot::processing(
                15,
                "text_processing",
                format!("Analyzing text structure for '{}'", book.metadata.title),
            ),
        );
        self.pause().await;

        self.set_analysis(
            id,
            TaskSnapshot::processing(30, "character_analysis", "Identifying characters and relationships"),
        );
        let record = match self.pipeline.analyze(&book.full_content, &book.metadata).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Analysis of book {} failed: {}", id, e);
                self.set_analysis(id, TaskSnapshot::failed(format!("Error in book analysis: {}", e)));
                return;
            }
        };

        for (progress, stage, message) in [
            (70, "graph_generation", "Building character network graph"),
            (85, "theme_analysis", "Extracting themes and significant quotes"),
            (95, "finalization", "Finalizing results"),
        ] {
            self.set_analysis(id, TaskSnapshot::processing(progress, stage, message));
            self.pause().await;
        }

        let mut store = self.store();
        store.publish_analysis(id, Arc::new(record));
        store.set_analysis_task(id, TaskSnapshot::complete("Analysis complete"));
        info!("Analysis of book {} complete", id);
    }
}

/// Releases a task's active marker when the worker ends, however it ends
struct ActiveMarker {
    orchestrator: Arc<TaskOrchestrator>,
    key: TaskKey,
}

impl ActiveMarker {
    fn new(orchestrator: Arc<TaskOrchestrator>, key: TaskKey) -> Self {
        Self { orchestrator, key }
    }
}

impl Drop for ActiveMarker {
    fn drop(&mut self) {
        debug!("Releasing {}", self.key);
        self.orchestrator.store().release(&self.key);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
