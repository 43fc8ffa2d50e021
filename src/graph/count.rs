//! Aggregate counts over the persistent graph.
//!
//! Counting is a full scan per table, so results are cached until the next
//! write.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::GraphStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub file_count: usize,
    pub indexed_file_count: usize,
    pub completed_file_count: usize,
    pub source_location_count: usize,
    pub local_symbol_count: usize,
    pub error_count: usize,
    pub fatal_error_count: usize,
    /// Records dropped during ingest or merge since the storage was opened.
    pub dropped_references: usize,
}

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let value: i64 = conn
        .query_row(sql, [], |row| row.get(0))
        .map_err(|e| anyhow::anyhow!("Failed to count ({}): {}", sql, e))?;
    Ok(value as usize)
}

fn compute(conn: &Connection) -> Result<StorageStats> {
    Ok(StorageStats {
        node_count: count(conn, "SELECT COUNT(*) FROM node")?,
        edge_count: count(conn, "SELECT COUNT(*) FROM edge")?,
        file_count: count(conn, "SELECT COUNT(*) FROM file")?,
        indexed_file_count: count(conn, "SELECT COUNT(*) FROM file WHERE indexed = 1")?,
        completed_file_count: count(conn, "SELECT COUNT(*) FROM file WHERE complete = 1")?,
        source_location_count: count(conn, "SELECT COUNT(*) FROM source_location")?,
        local_symbol_count: count(conn, "SELECT COUNT(*) FROM local_symbol")?,
        error_count: count(conn, "SELECT COUNT(*) FROM error")?,
        fatal_error_count: count(conn, "SELECT COUNT(*) FROM error WHERE fatal = 1")?,
        dropped_references: 0,
    })
}

impl GraphStorage {
    /// Counts for the committed graph, cached until the next write.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        if let Ok(cache) = self.stats_cache.read() {
            if let Some(stats) = cache.as_ref() {
                return Ok(stats.clone());
            }
        }

        let mut stats = compute(&*self.conn()?)?;
        stats.dropped_references = self.dropped_references;

        if let Ok(mut cache) = self.stats_cache.write() {
            *cache = Some(stats.clone());
        }
        Ok(stats)
    }

    pub fn node_count(&self) -> Result<usize> {
        Ok(self.storage_stats()?.node_count)
    }

    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.storage_stats()?.edge_count)
    }
}
