//! Indexing run coordinator.
//!
//! A fixed pool of worker threads turns [`IndexJob`]s into filled
//! [`IntermediateStorage`] buffers through a [`FrontEnd`]; the calling thread
//! is the only merge consumer and folds each buffer into the shared
//! [`GraphStorage`].
//!
//! # Lock Ordering
//!
//! 1. **job queue lock**: held only while popping the next job
//! 2. **transport lock** (inside [`StorageTransport`]): held only per call
//! 3. **graph write lock**: taken by the consumer for one merge at a time
//!
//! Workers never touch the graph lock, so a slow merge only stalls them
//! through back-pressure on `pending_byte_size`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticStage, IngestDiagnostic};
use crate::error_codes::{
    CT_IDX_001_FRONT_END_FAILED, CT_IDX_002_DISCARDED_AFTER_INTERRUPT, CT_MRG_001_MERGE_FAILED,
};
use crate::graph::GraphStorage;
use crate::ingest::{replay, IngestEvent, ParserClient, StorageParserClient};
use crate::model::DELIMITER_CXX;
use crate::search::SearchIndex;
use crate::storage::{IntermediateStorage, StorageTransport};

/// Tuning for one indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Worker threads producing buffers. Zero is treated as one.
    pub worker_count: usize,
    /// Workers wait while buffers awaiting merge exceed this many bytes.
    pub max_pending_bytes: usize,
    /// Sleep between polls of an empty or full hand-off queue.
    pub poll_interval: Duration,
    /// Scope delimiter used when rebuilding the search index.
    pub search_delimiter: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_pending_bytes: 64 * 1024 * 1024,
            poll_interval: Duration::from_millis(5),
            search_delimiter: DELIMITER_CXX.to_string(),
        }
    }
}

/// One translation unit to index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexJob {
    /// Owner path; the merge records ownership and runs re-index GC under it.
    pub path: String,
}

impl IndexJob {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// A language front end. Implementations must tolerate being called from
/// several workers at once.
pub trait FrontEnd: Sync {
    /// Walks `job` and reports everything it finds to `client`.
    ///
    /// Returning an error records a fatal error for `job.path`; whatever was
    /// reported before the error is still merged.
    fn index_file(&self, job: &IndexJob, client: &mut dyn ParserClient) -> Result<()>;
}

/// [`FrontEnd`] that replays pre-recorded [`IngestEvent`] streams per path.
///
/// This is how out-of-process front ends plug in: they emit NDJSON events,
/// which are parsed with [`crate::ingest::parse_event_lines`] and replayed here.
#[derive(Debug, Clone, Default)]
pub struct ReplayFrontEnd {
    events: AHashMap<String, Vec<IngestEvent>>,
}

impl ReplayFrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the events replayed for `path`, replacing earlier ones.
    pub fn insert(&mut self, path: impl Into<String>, events: Vec<IngestEvent>) {
        self.events.insert(path.into(), events);
    }
}

impl FrontEnd for ReplayFrontEnd {
    fn index_file(&self, job: &IndexJob, client: &mut dyn ParserClient) -> Result<()> {
        let events = self
            .events
            .get(&job.path)
            .with_context(|| format!("no recorded events for {}", job.path))?;
        replay(events, client);
        Ok(())
    }
}

/// Outcome of [`run_indexing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub jobs: usize,
    pub merged_files: usize,
    pub front_end_failures: usize,
    pub merge_failures: usize,
    /// Buffers finished after interruption and thrown away.
    pub discarded: usize,
    /// Jobs never started because of interruption.
    pub skipped: usize,
    pub interrupted: bool,
    pub nodes: usize,
    pub edges: usize,
    pub source_locations: usize,
    pub removed_elements: usize,
    pub dropped_references: usize,
    pub diagnostics: Vec<IngestDiagnostic>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct WorkerOutcome {
    produced: usize,
    discarded: usize,
    diagnostics: Vec<IngestDiagnostic>,
}

/// Counts a worker as finished even when it errors out or panics, so the
/// consumer loop always terminates.
struct FinishedGuard<'a>(&'a AtomicUsize);

impl Drop for FinishedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reasons for a worker to stop taking jobs: the caller's interruption flag,
/// or the run's own abort flag raised when the consumer fails.
#[derive(Clone, Copy)]
struct StopSignals<'a> {
    shutdown: &'a AtomicBool,
    abort: &'a AtomicBool,
}

impl StopSignals<'_> {
    fn interrupted(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn stopped(&self) -> bool {
        self.interrupted() || self.aborted()
    }
}

/// Index `jobs` into `graph`.
///
/// # Behavior
/// 1. Spawn `worker_count` scoped workers; each pops a job, fills a fresh
///    buffer through a [`StorageParserClient`], and pushes it to `transport`
/// 2. On the calling thread, pop filled buffers in FIFO order and merge each
///    under its job path, taking the graph write lock per merge
/// 3. A front-end error records a fatal error for its file (CT-IDX-001); a
///    merge error rolls back that file only (CT-MRG-001); the run continues
/// 4. Once `shutdown` is set, no new job starts and buffers finishing
///    afterwards are discarded (CT-IDX-002); buffers pushed earlier are
///    still merged
///
/// # Guarantees
/// - Every pushed buffer is merged at most once
/// - Insertion order within one file is preserved; no order across files
///
/// Errors only on a poisoned lock or a broken transport. When the consumer
/// fails, workers are told to stop before the error is returned.
pub fn run_indexing(
    config: &IndexerConfig,
    jobs: Vec<IndexJob>,
    front_end: &dyn FrontEnd,
    graph: &RwLock<GraphStorage>,
    transport: &dyn StorageTransport,
    shutdown: &AtomicBool,
) -> Result<IndexReport> {
    let started = Instant::now();
    let worker_count = config.worker_count.max(1).min(jobs.len().max(1));
    let span = tracing::info_span!("run_indexing", jobs = jobs.len(), workers = worker_count);
    let _enter = span.enter();

    let mut report = IndexReport {
        jobs: jobs.len(),
        ..IndexReport::default()
    };
    let queue = Mutex::new(VecDeque::from(jobs));
    let finished = AtomicUsize::new(0);
    let abort = AtomicBool::new(false);
    let signals = StopSignals {
        shutdown,
        abort: &abort,
    };

    let outcomes = thread::scope(|scope| -> Result<Vec<WorkerOutcome>> {
        let handles: Vec<_> = (0..worker_count)
            .map(|worker| {
                let queue = &queue;
                let finished = &finished;
                scope.spawn(move || {
                    let _guard = FinishedGuard(finished);
                    let span = tracing::debug_span!("index_worker", worker);
                    let _enter = span.enter();
                    run_worker(config, queue, front_end, transport, signals)
                })
            })
            .collect();

        let consumed = consume(config, graph, transport, &finished, worker_count, &mut report);
        if let Err(e) = &consumed {
            tracing::error!("merge consumer failed, stopping workers: {:#}", e);
            abort.store(true, Ordering::SeqCst);
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.join() {
                Ok(outcome) => outcomes.push(outcome?),
                Err(_) => anyhow::bail!("indexing worker panicked"),
            }
        }
        consumed?;
        Ok(outcomes)
    })?;

    report.skipped = queue
        .lock()
        .map_err(|_| anyhow::anyhow!("job queue lock poisoned"))?
        .len();
    report.interrupted = shutdown.load(Ordering::SeqCst);

    let mut worker_diagnostics = Vec::new();
    for outcome in outcomes {
        report.discarded += outcome.discarded;
        tracing::debug!(produced = outcome.produced, "worker finished");
        worker_diagnostics.extend(outcome.diagnostics);
    }
    report.front_end_failures = worker_diagnostics
        .iter()
        .filter(|d| d.code() == CT_IDX_001_FRONT_END_FAILED)
        .count();
    {
        let mut graph = graph
            .write()
            .map_err(|_| anyhow::anyhow!("graph storage lock poisoned"))?;
        for diagnostic in &worker_diagnostics {
            graph.record_diagnostic(diagnostic.clone());
        }
    }
    report.diagnostics.extend(worker_diagnostics);
    report.diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    report.elapsed_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        merged = report.merged_files,
        front_end_failures = report.front_end_failures,
        merge_failures = report.merge_failures,
        discarded = report.discarded,
        skipped = report.skipped,
        elapsed_ms = report.elapsed_ms,
        "indexing finished"
    );
    Ok(report)
}

fn run_worker(
    config: &IndexerConfig,
    queue: &Mutex<VecDeque<IndexJob>>,
    front_end: &dyn FrontEnd,
    transport: &dyn StorageTransport,
    signals: StopSignals<'_>,
) -> Result<WorkerOutcome> {
    let mut outcome = WorkerOutcome::default();

    while !signals.stopped() {
        let job = queue
            .lock()
            .map_err(|_| anyhow::anyhow!("job queue lock poisoned"))?
            .pop_front();
        let Some(job) = job else { break };

        wait_for_capacity(config, transport, signals)?;
        if signals.aborted() {
            break;
        }

        let mut buffer = transport.pop_indexer_target()?;
        buffer.set_source_path(job.path.clone());
        if let Some(diagnostic) = fill_buffer(front_end, &job, &mut buffer) {
            outcome.diagnostics.push(diagnostic);
        }

        if signals.aborted() {
            transport.recycle(buffer)?;
            break;
        }
        if signals.interrupted() {
            let diagnostic = IngestDiagnostic::file_failed(
                DiagnosticStage::Index,
                &job.path,
                CT_IDX_002_DISCARDED_AFTER_INTERRUPT,
                "finished after interruption",
            );
            tracing::debug!(path = %job.path, "discarding buffer after interruption");
            outcome.diagnostics.push(diagnostic);
            outcome.discarded += 1;
            transport.recycle(buffer)?;
            break;
        }

        transport.push_indexer_target(buffer)?;
        outcome.produced += 1;
    }
    Ok(outcome)
}

/// Runs the front end for one job. Returns the failure diagnostic, if any.
fn fill_buffer(
    front_end: &dyn FrontEnd,
    job: &IndexJob,
    buffer: &mut IntermediateStorage,
) -> Option<IngestDiagnostic> {
    let mut client = StorageParserClient::new(buffer, job.path.clone());
    let failure = match front_end.index_file(job, &mut client) {
        Ok(()) => None,
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::warn!(path = %job.path, code = CT_IDX_001_FRONT_END_FAILED, "front end failed: {}", message);
            client.on_front_end_failure(&job.path, &message);
            Some(IngestDiagnostic::file_failed(
                DiagnosticStage::Index,
                &job.path,
                CT_IDX_001_FRONT_END_FAILED,
                message,
            ))
        }
    };
    client.finish();
    failure
}

fn wait_for_capacity(
    config: &IndexerConfig,
    transport: &dyn StorageTransport,
    signals: StopSignals<'_>,
) -> Result<()> {
    while transport.pending_byte_size()? > config.max_pending_bytes && !signals.stopped() {
        thread::sleep(config.poll_interval);
    }
    Ok(())
}

fn consume(
    config: &IndexerConfig,
    graph: &RwLock<GraphStorage>,
    transport: &dyn StorageTransport,
    finished: &AtomicUsize,
    worker_count: usize,
    report: &mut IndexReport,
) -> Result<()> {
    loop {
        // Read before popping: once all workers are done, an empty pop is final.
        let all_done = finished.load(Ordering::SeqCst) == worker_count;
        match transport.pop_injection_source()? {
            Some(buffer) => {
                merge_buffer(graph, &buffer, report)?;
                transport.recycle(buffer)?;
            }
            None if all_done => return Ok(()),
            None => thread::sleep(config.poll_interval),
        }
    }
}

fn merge_buffer(
    graph: &RwLock<GraphStorage>,
    buffer: &IntermediateStorage,
    report: &mut IndexReport,
) -> Result<()> {
    let path = match buffer
        .source_path()
        .or_else(|| buffer.files().first().map(|f| f.path.as_str()))
    {
        Some(path) => path.to_string(),
        None => {
            tracing::warn!("skipping buffer without a source path");
            return Ok(());
        }
    };

    let mut graph = graph
        .write()
        .map_err(|_| anyhow::anyhow!("graph storage lock poisoned"))?;
    match graph.merge_file(&path, buffer) {
        Ok(merged) => {
            report.merged_files += 1;
            report.nodes += merged.nodes_added;
            report.edges += merged.edges_added;
            report.source_locations += merged.source_locations;
            report.removed_elements += merged.removed_elements;
            report.dropped_references += merged.dropped + buffer.diagnostics().len();
            report.diagnostics.extend(buffer.diagnostics().iter().cloned());
            report.diagnostics.extend(merged.diagnostics);
        }
        Err(e) => {
            let diagnostic = IngestDiagnostic::file_failed(
                DiagnosticStage::Merge,
                &path,
                CT_MRG_001_MERGE_FAILED,
                e.to_string(),
            );
            tracing::warn!(path = %path, code = CT_MRG_001_MERGE_FAILED, "merge failed: {}", e);
            graph.record_diagnostic(diagnostic.clone());
            report.merge_failures += 1;
            report.diagnostics.push(diagnostic);
        }
    }
    Ok(())
}

/// Replaces the contents of `index` with every node name committed to `graph`.
///
/// Returns the number of named search nodes.
pub fn rebuild_search_index(
    graph: &RwLock<GraphStorage>,
    index: &RwLock<SearchIndex>,
    delimiter: &str,
) -> Result<usize> {
    let rebuilt = {
        let graph = graph
            .read()
            .map_err(|_| anyhow::anyhow!("graph storage lock poisoned"))?;
        SearchIndex::build(&graph, delimiter)?
    };
    let len = rebuilt.len();
    *index
        .write()
        .map_err(|_| anyhow::anyhow!("search index lock poisoned"))? = rebuilt;
    Ok(len)
}
