//! Id-keyed fetchers over the committed graph.

use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::GraphStorage;
use crate::model::{
    DefinitionKind, Edge, EdgeType, Id, LocationKind, NameHierarchy, Node, NodeType, StorageError,
    StorageErrorData, StorageFile, StorageNode, StorageNodeData, StorageSourceLocation,
    StorageSourceLocationData, Token,
};

fn node_type_at(row: &Row<'_>, index: usize) -> rusqlite::Result<NodeType> {
    let bits: u32 = row.get(index)?;
    NodeType::from_bit(bits)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, i64::from(bits)))
}

fn edge_type_at(row: &Row<'_>, index: usize) -> rusqlite::Result<EdgeType> {
    let bits: u32 = row.get(index)?;
    EdgeType::from_bit(bits)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(index, i64::from(bits)))
}

fn name_at(row: &Row<'_>, index: usize) -> rusqlite::Result<NameHierarchy> {
    let serialized: String = row.get(index)?;
    NameHierarchy::deserialize(&serialized)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn location_kind_at(row: &Row<'_>, index: usize) -> rusqlite::Result<LocationKind> {
    let value: i64 = row.get(index)?;
    LocationKind::from_i64(value).ok_or(rusqlite::Error::IntegralValueOutOfRange(index, value))
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<StorageSourceLocation> {
    Ok(StorageSourceLocation {
        id: row.get(0)?,
        data: StorageSourceLocationData {
            file_node_id: row.get(1)?,
            start_line: row.get(2)?,
            start_column: row.get(3)?,
            end_line: row.get(4)?,
            end_column: row.get(5)?,
            kind: location_kind_at(row, 6)?,
        },
    })
}

fn error_from_row(row: &Row<'_>) -> rusqlite::Result<StorageError> {
    Ok(StorageError {
        id: row.get(0)?,
        data: StorageErrorData {
            message: row.get(1)?,
            file_path: row.get(2)?,
            line: row.get(3)?,
            column: row.get(4)?,
            fatal: row.get::<_, i64>(5)? != 0,
            indexed: row.get::<_, i64>(6)? != 0,
            translation_unit: row.get(7)?,
        },
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<StorageFile> {
    Ok(StorageFile {
        id: row.get(0)?,
        path: row.get(1)?,
        modification_time: row.get(2)?,
        indexed: row.get::<_, i64>(3)? != 0,
        complete: row.get::<_, i64>(4)? != 0,
    })
}

const LOCATION_COLUMNS: &str =
    "id, file_node_id, start_line, start_column, end_line, end_column, type";
const ERROR_COLUMNS: &str =
    "id, message, file_path, line, column_number, fatal, indexed, translation_unit";
const FILE_COLUMNS: &str = "id, path, modification_time, indexed, complete";

fn location_ids(conn: &Connection, element_id: Id) -> Result<Vec<Id>> {
    let mut stmt = conn.prepare_cached(
        "SELECT source_location_id FROM occurrence WHERE element_id = ?1 ORDER BY source_location_id",
    )?;
    let ids = stmt
        .query_map(params![element_id], |row| row.get(0))?
        .collect::<Result<Vec<Id>, _>>()?;
    Ok(ids)
}

fn edges_where(conn: &Connection, column: &str, node_id: Id) -> Result<Vec<Edge>> {
    let sql = format!(
        "SELECT id, type, source_node_id, target_node_id FROM edge WHERE {} = ?1 ORDER BY id",
        column
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params![node_id], |row| {
            Ok((
                row.get::<_, Id>(0)?,
                edge_type_at(row, 1)?,
                row.get::<_, Id>(2)?,
                row.get::<_, Id>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, edge_type, from, to)| {
            Ok(Edge {
                token: Token::new(id, location_ids(conn, id)?),
                edge_type,
                from,
                to,
            })
        })
        .collect()
}

impl GraphStorage {
    pub fn node(&self, id: Id) -> Result<Option<Node>> {
        let conn = self.conn()?;
        let row = conn
            .prepare_cached(
                "SELECT n.type, n.serialized_name, COALESCE(s.definition_kind, 0) \
                 FROM node n LEFT JOIN symbol s ON s.id = n.id WHERE n.id = ?1",
            )?
            .query_row(params![id], |row| {
                Ok((node_type_at(row, 0)?, name_at(row, 1)?, row.get::<_, i64>(2)?))
            })
            .optional()
            .map_err(|e| anyhow::anyhow!("Failed to load node {}: {}", id, e))?;

        let Some((node_type, name, definition_kind)) = row else {
            return Ok(None);
        };
        Ok(Some(Node {
            token: Token::new(id, location_ids(&conn, id)?),
            node_type,
            name,
            definition_kind: DefinitionKind::from_i64(definition_kind).unwrap_or_default(),
        }))
    }

    pub fn node_id_for_name(&self, name: &NameHierarchy) -> Result<Option<Id>> {
        let conn = self.conn()?;
        let id = conn
            .prepare_cached("SELECT id FROM node WHERE serialized_name = ?1")?
            .query_row(params![name.serialize()], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Every stored node in id order, for rebuilding the search index.
    pub fn all_nodes(&self) -> Result<Vec<StorageNode>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached("SELECT id, type, serialized_name FROM node ORDER BY id")?;
        let nodes = stmt
            .query_map([], |row| {
                Ok(StorageNode {
                    id: row.get(0)?,
                    data: StorageNodeData {
                        node_type: node_type_at(row, 1)?,
                        name: name_at(row, 2)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to load nodes: {}", e))?;
        Ok(nodes)
    }

    pub fn edge(&self, id: Id) -> Result<Option<Edge>> {
        let conn = self.conn()?;
        let row = conn
            .prepare_cached("SELECT type, source_node_id, target_node_id FROM edge WHERE id = ?1")?
            .query_row(params![id], |row| {
                Ok((edge_type_at(row, 0)?, row.get::<_, Id>(1)?, row.get::<_, Id>(2)?))
            })
            .optional()?;

        let Some((edge_type, from, to)) = row else {
            return Ok(None);
        };
        Ok(Some(Edge {
            token: Token::new(id, location_ids(&conn, id)?),
            edge_type,
            from,
            to,
        }))
    }

    pub fn edges_from(&self, node_id: Id) -> Result<Vec<Edge>> {
        edges_where(&*self.conn()?, "source_node_id", node_id)
    }

    pub fn edges_to(&self, node_id: Id) -> Result<Vec<Edge>> {
        edges_where(&*self.conn()?, "target_node_id", node_id)
    }

    pub fn source_location(&self, id: Id) -> Result<Option<StorageSourceLocation>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM source_location WHERE id = ?1", LOCATION_COLUMNS);
        let location = conn
            .prepare_cached(&sql)?
            .query_row(params![id], location_from_row)
            .optional()?;
        Ok(location)
    }

    pub fn local_symbol_id(&self, name: &str) -> Result<Option<Id>> {
        let conn = self.conn()?;
        let id = conn
            .prepare_cached("SELECT id FROM local_symbol WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Locations a node, edge or local symbol occurs at, in id order.
    pub fn locations_for_token(&self, token_id: Id) -> Result<Vec<StorageSourceLocation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM source_location WHERE id IN \
             (SELECT source_location_id FROM occurrence WHERE element_id = ?1) ORDER BY id",
            LOCATION_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let locations = stmt
            .query_map(params![token_id], location_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    pub fn error(&self, id: Id) -> Result<Option<StorageError>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM error WHERE id = ?1", ERROR_COLUMNS);
        let error = conn
            .prepare_cached(&sql)?
            .query_row(params![id], error_from_row)
            .optional()?;
        Ok(error)
    }

    pub fn errors(&self) -> Result<Vec<StorageError>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM error ORDER BY file_path, line, id", ERROR_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        let errors = stmt
            .query_map([], error_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(errors)
    }

    pub fn file(&self, path: &str) -> Result<Option<StorageFile>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM file WHERE path = ?1", FILE_COLUMNS);
        let file = conn
            .prepare_cached(&sql)?
            .query_row(params![path], file_from_row)
            .optional()?;
        Ok(file)
    }

    pub fn files(&self) -> Result<Vec<StorageFile>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM file ORDER BY path", FILE_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        let files = stmt
            .query_map([], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Indexed files whose latest run reported a fatal error.
    pub fn incomplete_files(&self) -> Result<Vec<StorageFile>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM file WHERE indexed = 1 AND complete = 0 ORDER BY path",
            FILE_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let files = stmt
            .query_map([], file_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// File paths that currently own an element.
    pub fn owners_of(&self, element_id: Id) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT owner FROM element_owner WHERE element_id = ?1 ORDER BY owner")?;
        let owners = stmt
            .query_map(params![element_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(owners)
    }
}
