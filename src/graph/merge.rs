//! Merging one intermediate buffer into the persistent graph.
//!
//! # Behavior
//!
//! 1. Remember what `path` owned before (elements and occurrences), then
//!    forget that ownership.
//! 2. Remap every buffer record onto the stored dataset by its dedup key,
//!    nodes first so edges, locations and occurrences can be translated.
//!    Records whose references cannot be translated are dropped and reported.
//! 3. Stamp `path` as owner of everything the buffer produced, together with
//!    the node types and definition kinds it reported.
//! 4. Garbage-collect occurrences, then elements, that `path` owned before,
//!    did not produce again, and nobody else owns.
//! 5. Settle every touched node: its type is the most specific one any
//!    current owner reports, its definition kind the strongest one. A node no
//!    owner defines loses its `symbol` row.
//!
//! # Guarantees
//!
//! The caller runs this inside a savepoint: any error leaves the database
//! exactly as it was before the call.

use std::collections::BTreeSet;

use ahash::AHashMap;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::ops::{delete_element_cascade, delete_orphaned_locations};
use super::schema::ElementKind;
use super::MergeError;
use crate::diagnostics::{DiagnosticStage, IngestDiagnostic, RecordKind};
use crate::model::{DefinitionKind, Id, NameHierarchy, StorageFile};
use crate::storage::IntermediateStorage;

/// Outcome of a successful merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub path: String,
    pub nodes: usize,
    pub nodes_added: usize,
    pub edges: usize,
    pub edges_added: usize,
    pub local_symbols: usize,
    pub source_locations: usize,
    pub occurrences: usize,
    pub comment_locations: usize,
    pub errors: usize,
    pub files: usize,
    /// Elements removed by re-index garbage collection.
    pub removed_elements: usize,
    /// Records dropped because a reference could not be remapped.
    pub dropped: usize,
    pub diagnostics: Vec<IngestDiagnostic>,
}

struct Merger<'c> {
    conn: &'c Connection,
    path: &'c str,
    ids: AHashMap<Id, Id>,
    produced: BTreeSet<Id>,
    /// (element, location) pairs this merge bound.
    produced_occurrences: BTreeSet<(Id, Id)>,
    /// Node type bit reported for each produced node.
    node_types: AHashMap<Id, u32>,
    definitions: AHashMap<Id, DefinitionKind>,
    report: MergeReport,
}

/// What one owner held before its latest merge.
#[derive(Debug, Default)]
struct Ownership {
    elements: BTreeSet<Id>,
    nodes: BTreeSet<Id>,
    occurrences: BTreeSet<(Id, Id)>,
}

fn bool_to_i64(value: bool) -> i64 {
    i64::from(value)
}

fn insert_element(conn: &Connection, kind: ElementKind) -> rusqlite::Result<Id> {
    conn.prepare_cached("INSERT INTO element (kind) VALUES (?1)")?
        .execute(params![kind.to_i64()])?;
    Ok(conn.last_insert_rowid())
}

impl<'c> Merger<'c> {
    fn new(conn: &'c Connection, path: &'c str) -> Self {
        Self {
            conn,
            path,
            ids: AHashMap::new(),
            produced: BTreeSet::new(),
            produced_occurrences: BTreeSet::new(),
            node_types: AHashMap::new(),
            definitions: AHashMap::new(),
            report: MergeReport {
                path: path.to_string(),
                ..MergeReport::default()
            },
        }
    }

    fn translate(&self, buffer_id: Id) -> Option<Id> {
        self.ids.get(&buffer_id).copied()
    }

    fn drop_record(&mut self, record: RecordKind, missing_id: Id, detail: String) {
        let diagnostic =
            IngestDiagnostic::dropped(DiagnosticStage::Merge, record, missing_id, detail);
        tracing::warn!(code = diagnostic.code(), path = self.path, "{}", diagnostic);
        self.report.dropped += 1;
        self.report.diagnostics.push(diagnostic);
    }

    fn merge_nodes(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for node in buffer.nodes() {
            let key = node.data.name.serialize();
            let existing: Option<Id> = self
                .conn
                .prepare_cached("SELECT id FROM node WHERE serialized_name = ?1")?
                .query_row(params![key], |row| row.get(0))
                .optional()?;

            // The stored type of an existing node is settled after ownership
            // is stamped.
            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::Node)?;
                    self.conn
                        .prepare_cached(
                            "INSERT INTO node (id, type, serialized_name) VALUES (?1, ?2, ?3)",
                        )?
                        .execute(params![id, node.data.node_type.bit(), key])?;
                    self.report.nodes_added += 1;
                    id
                }
            };

            self.ids.insert(node.id, persistent_id);
            self.produced.insert(persistent_id);
            self.node_types
                .insert(persistent_id, node.data.node_type.bit());
            self.report.nodes += 1;
        }
        Ok(())
    }

    fn merge_files(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for file in buffer.files() {
            let Some(id) = self.translate(file.id) else {
                self.drop_record(RecordKind::File, file.id, file.path.clone());
                continue;
            };

            // Completeness is recomputed from this run only.
            let complete = file.complete && !buffer.has_fatal_errors_in(&file.path);
            let record = StorageFile {
                id,
                complete,
                ..file.clone()
            };

            if record.indexed {
                self.conn
                    .prepare_cached(
                        "INSERT INTO file (id, path, modification_time, indexed, complete) \
                         VALUES (?1, ?2, ?3, 1, ?4) \
                         ON CONFLICT(id) DO UPDATE SET \
                            path = excluded.path, \
                            modification_time = excluded.modification_time, \
                            indexed = 1, \
                            complete = excluded.complete",
                    )?
                    .execute(params![
                        record.id,
                        record.path,
                        record.modification_time,
                        bool_to_i64(record.complete)
                    ])?;
            } else {
                self.conn
                    .prepare_cached(
                        "INSERT OR IGNORE INTO file (id, path, modification_time, indexed, complete) \
                         VALUES (?1, ?2, ?3, 0, ?4)",
                    )?
                    .execute(params![
                        record.id,
                        record.path,
                        record.modification_time,
                        bool_to_i64(record.complete)
                    ])?;
            }
            self.report.files += 1;
        }
        Ok(())
    }

    fn merge_symbols(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for symbol in buffer.symbols() {
            let Some(id) = self.translate(symbol.id) else {
                self.drop_record(
                    RecordKind::Symbol,
                    symbol.id,
                    format!("{:?}", symbol.definition_kind),
                );
                continue;
            };
            let kind = self.definitions.entry(id).or_insert(symbol.definition_kind);
            *kind = (*kind).max(symbol.definition_kind);
        }

        for access in buffer.component_accesses() {
            let Some(id) = self.translate(access.node_id) else {
                self.drop_record(
                    RecordKind::ComponentAccess,
                    access.node_id,
                    format!("{:?}", access.access),
                );
                continue;
            };
            self.conn
                .prepare_cached("INSERT OR REPLACE INTO component_access (node_id, type) VALUES (?1, ?2)")?
                .execute(params![id, access.access.to_i64()])?;
        }
        Ok(())
    }

    fn merge_edges(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for edge in buffer.edges() {
            let data = edge.data;
            let (source, target) = match (
                self.translate(data.source_node_id),
                self.translate(data.target_node_id),
            ) {
                (Some(source), Some(target)) => (source, target),
                (source, _) => {
                    let missing = if source.is_none() {
                        data.source_node_id
                    } else {
                        data.target_node_id
                    };
                    self.drop_record(
                        RecordKind::Edge,
                        missing,
                        format!(
                            "{} {} -> {}",
                            data.edge_type, data.source_node_id, data.target_node_id
                        ),
                    );
                    continue;
                }
            };

            let existing: Option<Id> = self
                .conn
                .prepare_cached(
                    "SELECT id FROM edge WHERE type = ?1 AND source_node_id = ?2 AND target_node_id = ?3",
                )?
                .query_row(params![data.edge_type.bit(), source, target], |row| row.get(0))
                .optional()?;

            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::Edge)?;
                    self.conn
                        .prepare_cached(
                            "INSERT INTO edge (id, type, source_node_id, target_node_id) \
                             VALUES (?1, ?2, ?3, ?4)",
                        )?
                        .execute(params![id, data.edge_type.bit(), source, target])?;
                    self.report.edges_added += 1;
                    id
                }
            };

            self.ids.insert(edge.id, persistent_id);
            self.produced.insert(persistent_id);
            self.report.edges += 1;
        }
        Ok(())
    }

    fn merge_local_symbols(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for local in buffer.local_symbols() {
            let existing: Option<Id> = self
                .conn
                .prepare_cached("SELECT id FROM local_symbol WHERE name = ?1")?
                .query_row(params![local.data.name], |row| row.get(0))
                .optional()?;

            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::LocalSymbol)?;
                    self.conn
                        .prepare_cached("INSERT INTO local_symbol (id, name) VALUES (?1, ?2)")?
                        .execute(params![id, local.data.name])?;
                    id
                }
            };

            self.ids.insert(local.id, persistent_id);
            self.produced.insert(persistent_id);
            self.report.local_symbols += 1;
        }
        Ok(())
    }

    fn merge_locations(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for location in buffer.source_locations() {
            let data = location.data;
            let Some(file_id) = self.translate(data.file_node_id) else {
                self.drop_record(
                    RecordKind::SourceLocation,
                    data.file_node_id,
                    format!("{}:{}", data.start_line, data.start_column),
                );
                continue;
            };

            let existing: Option<Id> = self
                .conn
                .prepare_cached(
                    "SELECT id FROM source_location WHERE file_node_id = ?1 \
                     AND start_line = ?2 AND start_column = ?3 \
                     AND end_line = ?4 AND end_column = ?5 AND type = ?6",
                )?
                .query_row(
                    params![
                        file_id,
                        data.start_line,
                        data.start_column,
                        data.end_line,
                        data.end_column,
                        data.kind.to_i64()
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::SourceLocation)?;
                    self.conn
                        .prepare_cached(
                            "INSERT INTO source_location \
                             (id, file_node_id, start_line, start_column, end_line, end_column, type) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        )?
                        .execute(params![
                            id,
                            file_id,
                            data.start_line,
                            data.start_column,
                            data.end_line,
                            data.end_column,
                            data.kind.to_i64()
                        ])?;
                    id
                }
            };

            self.ids.insert(location.id, persistent_id);
            self.produced.insert(persistent_id);
            self.report.source_locations += 1;
        }

        for occurrence in buffer.occurrences() {
            let element = self.translate(occurrence.element_id);
            let location = self.translate(occurrence.source_location_id);
            let (Some(element), Some(location)) = (element, location) else {
                let missing = if element.is_none() {
                    occurrence.element_id
                } else {
                    occurrence.source_location_id
                };
                self.drop_record(
                    RecordKind::Occurrence,
                    missing,
                    format!(
                        "token {} at location {}",
                        occurrence.element_id, occurrence.source_location_id
                    ),
                );
                continue;
            };
            self.conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO occurrence (element_id, source_location_id) VALUES (?1, ?2)",
                )?
                .execute(params![element, location])?;
            self.produced_occurrences.insert((element, location));
            self.report.occurrences += 1;
        }

        for comment in buffer.comment_locations() {
            let data = comment.data;
            let Some(file_id) = self.translate(data.file_node_id) else {
                self.drop_record(
                    RecordKind::CommentLocation,
                    data.file_node_id,
                    format!("{}:{}", data.start_line, data.start_column),
                );
                continue;
            };

            let existing: Option<Id> = self
                .conn
                .prepare_cached(
                    "SELECT id FROM comment_location WHERE file_node_id = ?1 \
                     AND start_line = ?2 AND start_column = ?3 \
                     AND end_line = ?4 AND end_column = ?5",
                )?
                .query_row(
                    params![
                        file_id,
                        data.start_line,
                        data.start_column,
                        data.end_line,
                        data.end_column
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::CommentLocation)?;
                    self.conn
                        .prepare_cached(
                            "INSERT INTO comment_location \
                             (id, file_node_id, start_line, start_column, end_line, end_column) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        )?
                        .execute(params![
                            id,
                            file_id,
                            data.start_line,
                            data.start_column,
                            data.end_line,
                            data.end_column
                        ])?;
                    id
                }
            };
            self.produced.insert(persistent_id);
            self.report.comment_locations += 1;
        }
        Ok(())
    }

    fn merge_errors(&mut self, buffer: &IntermediateStorage) -> Result<(), MergeError> {
        for error in buffer.errors() {
            let data = &error.data;
            let existing: Option<Id> = self
                .conn
                .prepare_cached(
                    "SELECT id FROM error WHERE message = ?1 AND file_path = ?2 \
                     AND line = ?3 AND column_number = ?4 AND fatal = ?5",
                )?
                .query_row(
                    params![
                        data.message,
                        data.file_path,
                        data.line,
                        data.column,
                        bool_to_i64(data.fatal)
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            let persistent_id = match existing {
                Some(id) => id,
                None => {
                    let id = insert_element(self.conn, ElementKind::Error)?;
                    self.conn
                        .prepare_cached(
                            "INSERT INTO error \
                             (id, message, file_path, line, column_number, fatal, indexed, translation_unit) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        )?
                        .execute(params![
                            id,
                            data.message,
                            data.file_path,
                            data.line,
                            data.column,
                            bool_to_i64(data.fatal),
                            bool_to_i64(data.indexed),
                            data.translation_unit
                        ])?;
                    id
                }
            };
            self.ids.insert(error.id, persistent_id);
            self.produced.insert(persistent_id);
            self.report.errors += 1;
        }
        Ok(())
    }

    fn stamp_ownership(&self) -> Result<(), MergeError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO element_owner (element_id, owner, node_type, definition_kind) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for id in &self.produced {
            let definition = self.definitions.get(id).map(|kind| kind.to_i64());
            stmt.execute(params![id, self.path, self.node_types.get(id), definition])?;
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO occurrence_owner (element_id, source_location_id, owner) \
             VALUES (?1, ?2, ?3)",
        )?;
        for (element, location) in &self.produced_occurrences {
            stmt.execute(params![element, location, self.path])?;
        }
        Ok(())
    }

    /// Deletes occurrences `path` bound last time, did not bind now, and no
    /// other file binds, then the locations they leave empty.
    fn collect_stale_occurrences(&mut self, previous: &BTreeSet<(Id, Id)>) -> Result<(), MergeError> {
        let mut emptied = Vec::new();
        for pair in previous.difference(&self.produced_occurrences) {
            if forget_occurrence_if_unowned(self.conn, *pair)? {
                emptied.push(pair.1);
            }
        }
        self.report.removed_elements += delete_orphaned_locations(self.conn, &emptied)?;
        Ok(())
    }

    /// Deletes elements from `previously_owned` that this merge did not
    /// reproduce and that no other file owns. Ids are visited in ascending order.
    fn collect_garbage(&mut self, previously_owned: &BTreeSet<Id>) -> Result<(), MergeError> {
        for id in previously_owned.difference(&self.produced) {
            if !is_owned(self.conn, *id)? {
                self.report.removed_elements += delete_element_cascade(self.conn, *id)?;
            }
        }
        Ok(())
    }
}

fn is_owned(conn: &Connection, id: Id) -> rusqlite::Result<bool> {
    let owned: Option<i64> = conn
        .prepare_cached("SELECT 1 FROM element_owner WHERE element_id = ?1 LIMIT 1")?
        .query_row(params![id], |row| row.get(0))
        .optional()?;
    Ok(owned.is_some())
}

/// Removes the occurrence unless some file still binds it. Returns true when
/// it was removed.
fn forget_occurrence_if_unowned(conn: &Connection, (element, location): (Id, Id)) -> rusqlite::Result<bool> {
    let owned: Option<i64> = conn
        .prepare_cached(
            "SELECT 1 FROM occurrence_owner \
             WHERE element_id = ?1 AND source_location_id = ?2 LIMIT 1",
        )?
        .query_row(params![element, location], |row| row.get(0))
        .optional()?;
    if owned.is_some() {
        return Ok(false);
    }
    let removed = conn
        .prepare_cached("DELETE FROM occurrence WHERE element_id = ?1 AND source_location_id = ?2")?
        .execute(params![element, location])?;
    Ok(removed > 0)
}

/// Reads what `path` owns, then deletes that ownership.
fn take_ownership(conn: &Connection, path: &str) -> rusqlite::Result<Ownership> {
    let mut ownership = Ownership::default();

    let mut stmt = conn.prepare_cached(
        "SELECT element_id, node_type IS NOT NULL FROM element_owner WHERE owner = ?1",
    )?;
    let rows = stmt.query_map(params![path], |row| Ok((row.get::<_, Id>(0)?, row.get::<_, bool>(1)?)))?;
    for row in rows {
        let (id, is_node) = row?;
        ownership.elements.insert(id);
        if is_node {
            ownership.nodes.insert(id);
        }
    }

    let mut stmt = conn.prepare_cached(
        "SELECT element_id, source_location_id FROM occurrence_owner WHERE owner = ?1",
    )?;
    ownership.occurrences = stmt
        .query_map(params![path], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<BTreeSet<(Id, Id)>, _>>()?;

    conn.execute("DELETE FROM element_owner WHERE owner = ?1", params![path])?;
    conn.execute("DELETE FROM occurrence_owner WHERE owner = ?1", params![path])?;
    Ok(ownership)
}

/// Recomputes a node's type and `symbol` row from what its owners reported.
///
/// Nodes without any owner are left alone; they are either about to be
/// collected or were never stamped.
fn settle_node(conn: &Connection, id: Id) -> rusqlite::Result<()> {
    let (node_type, definition): (Option<u32>, Option<i64>) = conn
        .prepare_cached(
            "SELECT MAX(node_type), MAX(definition_kind) FROM element_owner \
             WHERE element_id = ?1 AND node_type IS NOT NULL",
        )?
        .query_row(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let Some(node_type) = node_type else {
        return Ok(());
    };
    conn.prepare_cached("UPDATE node SET type = ?1 WHERE id = ?2")?
        .execute(params![node_type, id])?;

    match definition {
        Some(kind) => {
            conn.prepare_cached(
                "INSERT INTO symbol (id, definition_kind) VALUES (?1, ?2) \
                 ON CONFLICT(id) DO UPDATE SET definition_kind = excluded.definition_kind",
            )?
            .execute(params![id, kind])?;
        }
        None => {
            conn.prepare_cached("DELETE FROM symbol WHERE id = ?1")?
                .execute(params![id])?;
        }
    }
    Ok(())
}

/// Merges `buffer` as the latest index result for `path`.
///
/// Must run inside a transaction or savepoint owned by the caller.
pub fn merge_buffer(
    conn: &Connection,
    path: &str,
    buffer: &IntermediateStorage,
) -> Result<MergeReport, MergeError> {
    let previous = take_ownership(conn, path)?;

    let mut merger = Merger::new(conn, path);
    merger.merge_nodes(buffer)?;
    merger.merge_files(buffer)?;
    merger.merge_symbols(buffer)?;
    merger.merge_edges(buffer)?;
    merger.merge_local_symbols(buffer)?;
    merger.merge_locations(buffer)?;
    merger.merge_errors(buffer)?;
    merger.stamp_ownership()?;
    merger.collect_stale_occurrences(&previous.occurrences)?;
    merger.collect_garbage(&previous.elements)?;

    for id in merger.node_types.keys().chain(previous.nodes.iter()) {
        settle_node(conn, *id)?;
    }

    Ok(merger.report)
}

/// Removes everything only `path` owns, then the file node itself.
pub fn clear_owner(conn: &Connection, path: &str) -> rusqlite::Result<usize> {
    let file_node_id: Option<Id> = conn
        .prepare_cached("SELECT id FROM node WHERE serialized_name = ?1")?
        .query_row(
            params![NameHierarchy::for_file(path).serialize()],
            |row| row.get(0),
        )
        .optional()?;

    let previous = take_ownership(conn, path)?;

    let mut removed = 0;
    let mut emptied = Vec::new();
    for pair in &previous.occurrences {
        if forget_occurrence_if_unowned(conn, *pair)? {
            emptied.push(pair.1);
        }
    }
    removed += delete_orphaned_locations(conn, &emptied)?;

    for id in &previous.elements {
        if !is_owned(conn, *id)? {
            removed += delete_element_cascade(conn, *id)?;
        }
    }
    if let Some(file_node_id) = file_node_id {
        removed += delete_element_cascade(conn, file_node_id)?;
    }
    for id in &previous.nodes {
        settle_node(conn, *id)?;
    }
    Ok(removed)
}
