//! Flat records exchanged between the ingest buffer and the persistent store.
//!
//! `*Data` types carry the identity fields that form a record's dedup key;
//! the id-carrying wrappers are what a buffer or the database hands back.

use serde::{Deserialize, Serialize};

use super::name::NameHierarchy;
use super::types::{AccessKind, DefinitionKind, EdgeType, LocationKind, NodeType};

/// Identifier of any graph element. Buffer ids are local; persistent ids are global.
pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNodeData {
    pub node_type: NodeType,
    pub name: NameHierarchy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNode {
    pub id: Id,
    pub data: StorageNodeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageEdgeData {
    pub edge_type: EdgeType,
    pub source_node_id: Id,
    pub target_node_id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEdge {
    pub id: Id,
    pub data: StorageEdgeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSymbol {
    pub id: Id,
    pub definition_kind: DefinitionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFile {
    /// Id of the file node this record describes.
    pub id: Id,
    pub path: String,
    /// Seconds since the Unix epoch, as reported by the front end.
    pub modification_time: i64,
    pub indexed: bool,
    pub complete: bool,
}

/// A half-open source range inside a file node. Lines are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageSourceLocationData {
    pub file_node_id: Id,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub kind: LocationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSourceLocation {
    pub id: Id,
    pub data: StorageSourceLocationData,
}

/// Binds a token (node, edge or local symbol) to a source location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageOccurrence {
    pub element_id: Id,
    pub source_location_id: Id,
}

/// A function-local variable. The name already carries whatever makes it
/// unique (file and position), so it is the whole dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocalSymbolData {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocalSymbol {
    pub id: Id,
    pub data: StorageLocalSymbolData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageComponentAccess {
    pub node_id: Id,
    pub access: AccessKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageCommentLocationData {
    pub file_node_id: Id,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCommentLocation {
    pub id: Id,
    pub data: StorageCommentLocationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageErrorData {
    pub message: String,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub fatal: bool,
    pub indexed: bool,
    pub translation_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageError {
    pub id: Id,
    pub data: StorageErrorData,
}
