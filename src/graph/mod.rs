//! Persistent graph storage on SQLite.
//!
//! `GraphStorage` owns one rusqlite connection. Writers (`merge_file`,
//! `remove_element`, `clear_file`, `clear`) need `&mut self`; readers take
//! `&self` and lock the connection briefly. Shared across threads as
//! `RwLock<GraphStorage>`, readers therefore see the last committed merge and
//! wait while one is in progress.

mod count;
mod merge;
mod ops;
mod query;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use anyhow::Result;
use rusqlite::Connection;

use crate::diagnostics::IngestDiagnostic;
use crate::model::Id;
use crate::storage::IntermediateStorage;

pub use count::StorageStats;
pub use merge::MergeReport;
pub use schema::SCHEMA_VERSION;

/// Failure of a write to the persistent graph.
///
/// Any of these aborts only the operation in progress; its savepoint is rolled
/// back and previously committed data is untouched.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("transaction misuse: {0}")]
    Transaction(&'static str),

    #[error("database schema version {found} does not match expected version {expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("graph storage connection lock poisoned")]
    Poisoned,
}

/// Durable, merged code graph.
pub struct GraphStorage {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    stats_cache: RwLock<Option<StorageStats>>,
    diagnostics: Vec<IngestDiagnostic>,
    dropped_references: usize,
}

impl GraphStorage {
    /// Open (or create) a graph database at `db_path`.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)
            .map_err(|e| anyhow::anyhow!("Failed to open graph database {:?}: {}", db_path, e))?;
        schema::ensure_schema(&conn)?;

        tracing::debug!(path = ?db_path, "opened graph storage");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            stats_cache: RwLock::new(None),
            diagnostics: Vec::new(),
            dropped_references: 0,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("graph storage connection lock poisoned"))
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, MergeError> {
        self.conn.get_mut().map_err(|_| MergeError::Poisoned)
    }

    fn invalidate_stats(&mut self) {
        match self.stats_cache.get_mut() {
            Ok(cache) => *cache = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Starts an explicit write transaction spanning several merges.
    ///
    /// Merges always run in their own savepoint, so a failed merge inside an
    /// explicit transaction rolls back only itself.
    pub fn begin_transaction(&mut self) -> Result<(), MergeError> {
        let conn = self.conn_mut()?;
        if !conn.is_autocommit() {
            return Err(MergeError::Transaction("a transaction is already active"));
        }
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<(), MergeError> {
        let conn = self.conn_mut()?;
        if conn.is_autocommit() {
            return Err(MergeError::Transaction("no active transaction to commit"));
        }
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback_transaction(&mut self) -> Result<(), MergeError> {
        let conn = self.conn_mut()?;
        if conn.is_autocommit() {
            return Err(MergeError::Transaction("no active transaction to roll back"));
        }
        conn.execute_batch("ROLLBACK")?;
        self.invalidate_stats();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Merges `buffer` as the latest index result for `path`.
    ///
    /// # Behavior
    /// 1. Remap every buffer record onto existing rows by its dedup key,
    ///    inserting what is new
    /// 2. Drop and report records whose references cannot be remapped
    /// 3. Recompute `complete` for each indexed file from this run's errors
    /// 4. Delete what `path` produced last time but not this time, unless
    ///    another file still owns it. Occurrences are tracked the same way.
    /// 5. Reset each touched node's type and definition kind to the strongest
    ///    one its current owners report
    ///
    /// # Guarantees
    /// All-or-nothing: on error nothing from `buffer` is visible and the
    /// previous state of `path` is intact.
    pub fn merge_file(
        &mut self,
        path: &str,
        buffer: &IntermediateStorage,
    ) -> Result<MergeReport, MergeError> {
        let span = tracing::info_span!("merge_file", path = %path);
        let _enter = span.enter();

        let conn = self.conn_mut()?;
        let savepoint = conn.savepoint()?;
        let report = merge::merge_buffer(&savepoint, path, buffer).map_err(|e| {
            tracing::warn!(path = %path, "merge rolled back: {}", e);
            e
        })?;
        savepoint.commit()?;

        self.invalidate_stats();
        self.dropped_references += report.dropped + buffer.diagnostics().len();
        self.diagnostics.extend(buffer.diagnostics().iter().cloned());
        self.diagnostics.extend(report.diagnostics.iter().cloned());

        tracing::info!(
            nodes = report.nodes,
            edges = report.edges,
            locations = report.source_locations,
            removed = report.removed_elements,
            dropped = report.dropped,
            "merged"
        );
        Ok(report)
    }

    /// Deletes an element with its dependent rows. Returns rows removed.
    pub fn remove_element(&mut self, id: Id) -> Result<usize, MergeError> {
        let conn = self.conn_mut()?;
        let savepoint = conn.savepoint()?;
        let removed = ops::delete_element_cascade(&savepoint, id)?;
        savepoint.commit()?;

        self.invalidate_stats();
        tracing::debug!(id, removed, "removed element");
        Ok(removed)
    }

    /// Forgets a source file: everything only it owns, plus its file node.
    pub fn clear_file(&mut self, path: &str) -> Result<usize, MergeError> {
        let conn = self.conn_mut()?;
        let savepoint = conn.savepoint()?;
        let removed = merge::clear_owner(&savepoint, path)?;
        savepoint.commit()?;

        self.invalidate_stats();
        tracing::info!(path = %path, removed, "cleared file");
        Ok(removed)
    }

    /// Deletes all graph data. Ids issued before stay retired.
    pub fn clear(&mut self) -> Result<(), MergeError> {
        let conn = self.conn_mut()?;
        let savepoint = conn.savepoint()?;
        ops::delete_all(&savepoint)?;
        savepoint.commit()?;

        self.invalidate_stats();
        self.diagnostics.clear();
        self.dropped_references = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Diagnostics collected from every merge since open (or the last clear).
    pub fn diagnostics(&self) -> &[IngestDiagnostic] {
        &self.diagnostics
    }

    /// Records an indexing-level diagnostic (front-end or merge failure).
    pub fn record_diagnostic(&mut self, diagnostic: IngestDiagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
