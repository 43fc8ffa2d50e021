//! SQLite schema for the persistent graph.
//!
//! Every node, edge, location, comment and error is an `element`; the
//! `AUTOINCREMENT` key gives one global id space whose values are never reused,
//! even after deletion. Typed tables hang off `element` with `ON DELETE
//! CASCADE`. Edge endpoints and location files reference `node` without a
//! cascade, so an edge can never outlive or precede its endpoints.
//!
//! `element_owner` records which file paths last produced an element and what
//! each of them said about it (node type, definition kind); it drives re-index
//! garbage collection and lets a node's type fall back when the owner that
//! upgraded it stops doing so. Occurrences are not elements, so
//! `occurrence_owner` tracks them separately.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use super::MergeError;

/// Version of the table layout below. Bump on any incompatible change.
pub const SCHEMA_VERSION: i64 = 4;

/// Discriminator stored in `element.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node = 1,
    Edge = 2,
    SourceLocation = 3,
    CommentLocation = 4,
    Error = 5,
    LocalSymbol = 6,
}

impl ElementKind {
    pub fn to_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<ElementKind> {
        match value {
            1 => Some(ElementKind::Node),
            2 => Some(ElementKind::Edge),
            3 => Some(ElementKind::SourceLocation),
            4 => Some(ElementKind::CommentLocation),
            5 => Some(ElementKind::Error),
            6 => Some(ElementKind::LocalSymbol),
            _ => None,
        }
    }
}

const TABLES: &str = "
    CREATE TABLE IF NOT EXISTS element (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS node (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        type INTEGER NOT NULL,
        serialized_name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS edge (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        type INTEGER NOT NULL,
        source_node_id INTEGER NOT NULL REFERENCES node(id),
        target_node_id INTEGER NOT NULL REFERENCES node(id),
        UNIQUE (type, source_node_id, target_node_id)
    );
    CREATE INDEX IF NOT EXISTS edge_source_index ON edge(source_node_id);
    CREATE INDEX IF NOT EXISTS edge_target_index ON edge(target_node_id);

    CREATE TABLE IF NOT EXISTS symbol (
        id INTEGER PRIMARY KEY REFERENCES node(id) ON DELETE CASCADE,
        definition_kind INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS file (
        id INTEGER PRIMARY KEY REFERENCES node(id) ON DELETE CASCADE,
        path TEXT NOT NULL UNIQUE,
        modification_time INTEGER NOT NULL,
        indexed INTEGER NOT NULL,
        complete INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS local_symbol (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS source_location (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        file_node_id INTEGER NOT NULL REFERENCES node(id),
        start_line INTEGER NOT NULL,
        start_column INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        end_column INTEGER NOT NULL,
        type INTEGER NOT NULL,
        UNIQUE (file_node_id, start_line, start_column, end_line, end_column, type)
    );

    CREATE TABLE IF NOT EXISTS occurrence (
        element_id INTEGER NOT NULL REFERENCES element(id) ON DELETE CASCADE,
        source_location_id INTEGER NOT NULL REFERENCES source_location(id) ON DELETE CASCADE,
        PRIMARY KEY (element_id, source_location_id)
    );
    CREATE INDEX IF NOT EXISTS occurrence_location_index ON occurrence(source_location_id);

    CREATE TABLE IF NOT EXISTS occurrence_owner (
        element_id INTEGER NOT NULL,
        source_location_id INTEGER NOT NULL,
        owner TEXT NOT NULL,
        PRIMARY KEY (element_id, source_location_id, owner),
        FOREIGN KEY (element_id, source_location_id)
            REFERENCES occurrence(element_id, source_location_id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS occurrence_owner_owner_index ON occurrence_owner(owner);

    CREATE TABLE IF NOT EXISTS component_access (
        node_id INTEGER PRIMARY KEY REFERENCES node(id) ON DELETE CASCADE,
        type INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS comment_location (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        file_node_id INTEGER NOT NULL REFERENCES node(id),
        start_line INTEGER NOT NULL,
        start_column INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        end_column INTEGER NOT NULL,
        UNIQUE (file_node_id, start_line, start_column, end_line, end_column)
    );

    CREATE TABLE IF NOT EXISTS error (
        id INTEGER PRIMARY KEY REFERENCES element(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        file_path TEXT NOT NULL,
        line INTEGER NOT NULL,
        column_number INTEGER NOT NULL,
        fatal INTEGER NOT NULL,
        indexed INTEGER NOT NULL,
        translation_unit TEXT NOT NULL,
        UNIQUE (message, file_path, line, column_number, fatal)
    );

    CREATE TABLE IF NOT EXISTS element_owner (
        element_id INTEGER NOT NULL REFERENCES element(id) ON DELETE CASCADE,
        owner TEXT NOT NULL,
        node_type INTEGER,
        definition_kind INTEGER,
        PRIMARY KEY (element_id, owner)
    );
    CREATE INDEX IF NOT EXISTS element_owner_owner_index ON element_owner(owner);
";

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Enables foreign keys, creates missing tables and checks the schema version.
///
/// A database stamped with a different version is refused before any table
/// is touched.
pub fn ensure_schema(conn: &Connection) -> Result<(), MergeError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (\
            id INTEGER PRIMARY KEY CHECK (id = 1),\
            schema_version INTEGER NOT NULL,\
            created_at INTEGER NOT NULL\
        )",
        [],
    )?;

    let existing: Option<i64> = conn
        .query_row("SELECT schema_version FROM meta WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match existing {
        Some(found) if found != SCHEMA_VERSION => {
            return Err(MergeError::SchemaMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Some(_) => {}
        None => {
            conn.execute(
                "INSERT INTO meta (id, schema_version, created_at) VALUES (1, ?1, ?2)",
                params![SCHEMA_VERSION, now_secs()],
            )?;
        }
    }

    conn.execute_batch(TABLES)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT schema_version FROM meta WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(enabled, 1);

        conn.execute("INSERT INTO element (kind) VALUES (2)", []).unwrap();
        let id = conn.last_insert_rowid();
        let dangling = conn.execute(
            "INSERT INTO edge (id, type, source_node_id, target_node_id) VALUES (?1, 1, 999, 998)",
            params![id],
        );
        assert!(dangling.is_err());
    }

    #[test]
    fn test_version_mismatch_refused() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute("UPDATE meta SET schema_version = 99 WHERE id = 1", [])
            .unwrap();

        match ensure_schema(&conn) {
            Err(MergeError::SchemaMismatch { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, SCHEMA_VERSION);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_element_kind_round_trip() {
        for kind in [
            ElementKind::Node,
            ElementKind::Edge,
            ElementKind::SourceLocation,
            ElementKind::CommentLocation,
            ElementKind::Error,
            ElementKind::LocalSymbol,
        ] {
            assert_eq!(ElementKind::from_i64(kind.to_i64()), Some(kind));
        }
        assert_eq!(ElementKind::from_i64(0), None);
        assert_eq!(ElementKind::from_i64(7), None);
    }
}
