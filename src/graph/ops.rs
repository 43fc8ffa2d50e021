//! Cascading deletes.
//!
//! SQLite cascades take care of typed rows, occurrences and ownership once an
//! `element` row goes away. What they cannot do is remove the rows that point
//! *at* a node without a cascade (edges, locations inside a file node), or
//! locations left without any occurrence. Those are handled here, in the order
//! the foreign keys require.

use ahash::AHashSet;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::schema::ElementKind;
use crate::model::Id;

fn element_kind(conn: &Connection, id: Id) -> rusqlite::Result<Option<ElementKind>> {
    let kind: Option<i64> = conn
        .prepare_cached("SELECT kind FROM element WHERE id = ?1")?
        .query_row(params![id], |row| row.get(0))
        .optional()?;
    Ok(kind.and_then(ElementKind::from_i64))
}

fn collect_ids(conn: &Connection, sql: &str, id: Id) -> rusqlite::Result<Vec<Id>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<Result<Vec<Id>, _>>()?;
    Ok(ids)
}

/// Locations bound to any of `element_ids` through an occurrence.
fn locations_of(conn: &Connection, element_ids: &[Id]) -> rusqlite::Result<Vec<Id>> {
    if element_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut locations = Vec::new();
    for chunk in element_ids.chunks(500) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT source_location_id FROM occurrence WHERE element_id IN ({})",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, Id>(0))?;
        for row in rows {
            locations.push(row?);
        }
    }
    Ok(locations)
}

fn delete_element_row(conn: &Connection, id: Id) -> rusqlite::Result<usize> {
    conn.prepare_cached("DELETE FROM element WHERE id = ?1")?
        .execute(params![id])
}

/// Deletes candidate locations that no longer have any occurrence.
pub(super) fn delete_orphaned_locations(conn: &Connection, candidates: &[Id]) -> rusqlite::Result<usize> {
    let mut removed = 0;
    let unique: AHashSet<Id> = candidates.iter().copied().collect();
    let mut sorted: Vec<Id> = unique.into_iter().collect();
    sorted.sort_unstable();

    for location_id in sorted {
        let still_used: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM occurrence WHERE source_location_id = ?1 LIMIT 1")?
            .query_row(params![location_id], |row| row.get(0))
            .optional()?;
        if still_used.is_none() {
            removed += delete_element_row(conn, location_id)?;
        }
    }
    Ok(removed)
}

/// Deletes one element and everything that cannot exist without it.
///
/// - node: its edges, the locations and comments inside it (file nodes), its
///   occurrences, and locations left without occurrences
/// - edge, local symbol: its occurrences and locations left without occurrences
/// - location, comment, error: the row itself
///
/// Returns how many element rows were deleted. Unknown ids delete nothing.
pub fn delete_element_cascade(conn: &Connection, id: Id) -> rusqlite::Result<usize> {
    let Some(kind) = element_kind(conn, id)? else {
        return Ok(0);
    };

    let mut removed = 0;
    match kind {
        ElementKind::Node => {
            let edges = collect_ids(
                conn,
                "SELECT id FROM edge WHERE source_node_id = ?1 OR target_node_id = ?1",
                id,
            )?;
            let mut tokens = edges.clone();
            tokens.push(id);
            let candidates = locations_of(conn, &tokens)?;

            for edge_id in &edges {
                removed += delete_element_row(conn, *edge_id)?;
            }

            let contained = collect_ids(
                conn,
                "SELECT id FROM source_location WHERE file_node_id = ?1 \
                 UNION ALL SELECT id FROM comment_location WHERE file_node_id = ?1",
                id,
            )?;
            for location_id in contained {
                removed += delete_element_row(conn, location_id)?;
            }

            removed += delete_element_row(conn, id)?;
            removed += delete_orphaned_locations(conn, &candidates)?;
        }
        ElementKind::Edge | ElementKind::LocalSymbol => {
            let candidates = locations_of(conn, &[id])?;
            removed += delete_element_row(conn, id)?;
            removed += delete_orphaned_locations(conn, &candidates)?;
        }
        ElementKind::SourceLocation | ElementKind::CommentLocation | ElementKind::Error => {
            removed += delete_element_row(conn, id)?;
        }
    }

    Ok(removed)
}

/// Deletes every element, edges and locations before the nodes they reference.
///
/// The `AUTOINCREMENT` sequence survives, so ids stay unique across a clear.
pub fn delete_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM element WHERE kind != ?1",
        params![ElementKind::Node.to_i64()],
    )?;
    conn.execute("DELETE FROM element", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::ensure_schema;

    fn insert_element(conn: &Connection, kind: ElementKind) -> Id {
        conn.execute("INSERT INTO element (kind) VALUES (?1)", params![kind.to_i64()])
            .unwrap();
        conn.last_insert_rowid()
    }

    fn insert_node(conn: &Connection, name: &str) -> Id {
        let id = insert_element(conn, ElementKind::Node);
        conn.execute(
            "INSERT INTO node (id, type, serialized_name) VALUES (?1, 1, ?2)",
            params![id, name],
        )
        .unwrap();
        id
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_node_delete_removes_edges_and_orphaned_locations() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let file = insert_node(&conn, "file");
        let a = insert_node(&conn, "a");
        let b = insert_node(&conn, "b");
        let edge = insert_element(&conn, ElementKind::Edge);
        conn.execute(
            "INSERT INTO edge (id, type, source_node_id, target_node_id) VALUES (?1, 8, ?2, ?3)",
            params![edge, a, b],
        )
        .unwrap();
        let loc = insert_element(&conn, ElementKind::SourceLocation);
        conn.execute(
            "INSERT INTO source_location VALUES (?1, ?2, 1, 1, 1, 5, 0)",
            params![loc, file],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO occurrence VALUES (?1, ?2)",
            params![a, loc],
        )
        .unwrap();

        let removed = delete_element_cascade(&conn, a).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(count(&conn, "edge"), 0);
        assert_eq!(count(&conn, "source_location"), 0);
        assert_eq!(count(&conn, "occurrence"), 0);
        assert_eq!(count(&conn, "node"), 2);

        assert_eq!(delete_element_cascade(&conn, a).unwrap(), 0);
    }

    #[test]
    fn test_file_node_delete_removes_contained_locations() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let file = insert_node(&conn, "file");
        let comment = insert_element(&conn, ElementKind::CommentLocation);
        conn.execute(
            "INSERT INTO comment_location VALUES (?1, ?2, 1, 1, 2, 1)",
            params![comment, file],
        )
        .unwrap();

        assert_eq!(delete_element_cascade(&conn, file).unwrap(), 2);
        assert_eq!(count(&conn, "element"), 0);
    }

    #[test]
    fn test_local_symbol_delete_removes_orphaned_locations() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let file = insert_node(&conn, "file");
        let local = insert_element(&conn, ElementKind::LocalSymbol);
        conn.execute(
            "INSERT INTO local_symbol (id, name) VALUES (?1, 'file<2:3>')",
            params![local],
        )
        .unwrap();
        let loc = insert_element(&conn, ElementKind::SourceLocation);
        conn.execute(
            "INSERT INTO source_location VALUES (?1, ?2, 2, 3, 2, 4, 6)",
            params![loc, file],
        )
        .unwrap();
        conn.execute("INSERT INTO occurrence VALUES (?1, ?2)", params![local, loc])
            .unwrap();

        assert_eq!(delete_element_cascade(&conn, local).unwrap(), 2);
        assert_eq!(count(&conn, "local_symbol"), 0);
        assert_eq!(count(&conn, "source_location"), 0);
        assert_eq!(count(&conn, "node"), 1);
    }

    #[test]
    fn test_delete_all_keeps_id_sequence() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let first = insert_node(&conn, "a");
        delete_all(&conn).unwrap();
        let second = insert_node(&conn, "a");
        assert!(second > first);
    }
}
