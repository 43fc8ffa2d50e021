//! The callback surface language front ends drive while walking a file.
//!
//! A front end reports what it sees through [`ParserClient`]; it never touches
//! storage directly. [`StorageParserClient`] is the implementation that writes
//! into an [`IntermediateStorage`].
//!
//! # Ordering contract
//!
//! A node must be registered (`on_node` / `on_file_start`) before any edge,
//! location or access that uses its id. Violations are not fatal: the offending
//! record is dropped and surfaces as a diagnostic on the buffer.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::model::{
    AccessKind, DefinitionKind, EdgeType, Id, LocationKind, NameHierarchy, NodeType,
    StorageCommentLocationData, StorageComponentAccess, StorageEdgeData, StorageErrorData,
    StorageFile, StorageLocalSymbolData, StorageNodeData, StorageOccurrence,
    StorageSourceLocationData, StorageSymbol,
};
use crate::storage::IntermediateStorage;

/// A source range as reported by a front end. Lines are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseLocation {
    /// Id returned by [`ParserClient::on_file_start`] for the containing file.
    pub file_id: Id,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub kind: LocationKind,
}

impl ParseLocation {
    pub fn new(file_id: Id, start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            file_id,
            start_line,
            start_column,
            end_line,
            end_column,
            kind: LocationKind::Token,
        }
    }

    pub fn with_kind(mut self, kind: LocationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Single-point location, used for errors without a range.
    pub fn point(file_id: Id, line: u32, column: u32) -> Self {
        Self::new(file_id, line, column, line, column)
    }
}

pub trait ParserClient {
    /// Registers `path` as a file node and makes it the current file.
    ///
    /// Calls nest: a front end entering an included file calls this again and
    /// balances it with [`ParserClient::on_file_finish`].
    fn on_file_start(&mut self, path: &str, modification_time: i64) -> Id;

    /// Registers a node and every enclosing scope of its name.
    ///
    /// Enclosing scopes not seen before become `Symbol` nodes linked to their
    /// child by a `Member` edge. Returns `None` for an empty name.
    fn on_node(
        &mut self,
        name: &NameHierarchy,
        node_type: NodeType,
        definition_kind: DefinitionKind,
    ) -> Option<Id>;

    fn on_edge(&mut self, edge_type: EdgeType, from: Id, to: Id) -> Option<Id>;

    /// Stores the location and binds `token_id` to it. Returns the location id.
    fn on_source_location(&mut self, token_id: Id, location: &ParseLocation) -> Option<Id>;

    /// Registers a function-local variable and binds it to `location`.
    ///
    /// Local symbols are not nodes: they never appear in the name hierarchy
    /// and are keyed by `name` alone. The location is stored with
    /// [`LocationKind::LocalSymbol`] whatever kind `location` carries.
    fn on_local_symbol(&mut self, name: &str, location: &ParseLocation) -> Id;

    fn on_comment(&mut self, location: &ParseLocation) -> Option<Id>;

    fn on_error(&mut self, message: &str, location: &ParseLocation, fatal: bool) -> Id;

    fn on_access(&mut self, node_id: Id, access: AccessKind) -> bool;

    /// Records the current file's flags and leaves it.
    fn on_file_finish(&mut self, indexed: bool, complete: bool);

    /// Records that a front end gave up on `path` entirely.
    fn on_front_end_failure(&mut self, path: &str, message: &str) {
        let file_id = self.on_file_start(path, 0);
        self.on_error(message, &ParseLocation::point(file_id, 0, 0), true);
        self.on_file_finish(true, false);
    }
}

#[derive(Debug, Clone)]
struct OpenFile {
    id: Id,
    path: String,
    modification_time: i64,
}

/// [`ParserClient`] that fills an [`IntermediateStorage`].
pub struct StorageParserClient<'a> {
    storage: &'a mut IntermediateStorage,
    translation_unit: String,
    open_files: Vec<OpenFile>,
    file_paths: AHashMap<Id, String>,
}

impl<'a> StorageParserClient<'a> {
    /// Client for one job; `translation_unit` is stamped on every error it records.
    pub fn new(storage: &'a mut IntermediateStorage, translation_unit: impl Into<String>) -> Self {
        Self {
            storage,
            translation_unit: translation_unit.into(),
            open_files: Vec::new(),
            file_paths: AHashMap::new(),
        }
    }

    pub fn storage(&self) -> &IntermediateStorage {
        &*self.storage
    }

    /// Closes files the front end left open, marking them incomplete.
    ///
    /// Returns how many were closed.
    pub fn finish(&mut self) -> usize {
        let mut closed = 0;
        while !self.open_files.is_empty() {
            self.on_file_finish(true, false);
            closed += 1;
        }
        if closed > 0 {
            tracing::debug!(
                translation_unit = %self.translation_unit,
                closed,
                "closed files left open by front end"
            );
        }
        closed
    }

    fn location_data(location: &ParseLocation) -> StorageSourceLocationData {
        StorageSourceLocationData {
            file_node_id: location.file_id,
            start_line: location.start_line,
            start_column: location.start_column,
            end_line: location.end_line,
            end_column: location.end_column,
            kind: location.kind,
        }
    }
}

impl ParserClient for StorageParserClient<'_> {
    fn on_file_start(&mut self, path: &str, modification_time: i64) -> Id {
        let id = self.storage.add_node(StorageNodeData {
            node_type: NodeType::File,
            name: NameHierarchy::for_file(path),
        });
        self.file_paths.insert(id, path.to_string());
        self.open_files.push(OpenFile {
            id,
            path: path.to_string(),
            modification_time,
        });
        id
    }

    fn on_node(
        &mut self,
        name: &NameHierarchy,
        node_type: NodeType,
        definition_kind: DefinitionKind,
    ) -> Option<Id> {
        if name.is_empty() {
            return None;
        }

        let mut parent_id = None;
        for scope in name.ancestors() {
            let scope_id = self.storage.add_node(StorageNodeData {
                node_type: NodeType::Symbol,
                name: scope,
            });
            if let Some(parent) = parent_id {
                self.storage.add_edge(StorageEdgeData {
                    edge_type: EdgeType::Member,
                    source_node_id: parent,
                    target_node_id: scope_id,
                });
            }
            parent_id = Some(scope_id);
        }

        let id = self.storage.add_node(StorageNodeData {
            node_type,
            name: name.clone(),
        });
        if let Some(parent) = parent_id {
            self.storage.add_edge(StorageEdgeData {
                edge_type: EdgeType::Member,
                source_node_id: parent,
                target_node_id: id,
            });
        }
        if definition_kind != DefinitionKind::Unresolved {
            self.storage.add_symbol(StorageSymbol {
                id,
                definition_kind,
            });
        }
        Some(id)
    }

    fn on_edge(&mut self, edge_type: EdgeType, from: Id, to: Id) -> Option<Id> {
        self.storage.add_edge(StorageEdgeData {
            edge_type,
            source_node_id: from,
            target_node_id: to,
        })
    }

    fn on_source_location(&mut self, token_id: Id, location: &ParseLocation) -> Option<Id> {
        let location_id = self
            .storage
            .add_source_location(Self::location_data(location))?;
        self.storage.add_occurrence(StorageOccurrence {
            element_id: token_id,
            source_location_id: location_id,
        })?;
        Some(location_id)
    }

    fn on_local_symbol(&mut self, name: &str, location: &ParseLocation) -> Id {
        let id = self.storage.add_local_symbol(StorageLocalSymbolData {
            name: name.to_string(),
        });
        let location = location.with_kind(LocationKind::LocalSymbol);
        self.on_source_location(id, &location);
        id
    }

    fn on_comment(&mut self, location: &ParseLocation) -> Option<Id> {
        self.storage.add_comment_location(StorageCommentLocationData {
            file_node_id: location.file_id,
            start_line: location.start_line,
            start_column: location.start_column,
            end_line: location.end_line,
            end_column: location.end_column,
        })
    }

    fn on_error(&mut self, message: &str, location: &ParseLocation, fatal: bool) -> Id {
        let file_path = self
            .file_paths
            .get(&location.file_id)
            .cloned()
            .unwrap_or_default();
        tracing::debug!(
            file = %file_path,
            line = location.start_line,
            fatal,
            "front end reported error: {}",
            message
        );
        self.storage.add_error(StorageErrorData {
            message: message.to_string(),
            file_path,
            line: location.start_line,
            column: location.start_column,
            fatal,
            indexed: true,
            translation_unit: self.translation_unit.clone(),
        })
    }

    fn on_access(&mut self, node_id: Id, access: AccessKind) -> bool {
        self.storage
            .add_component_access(StorageComponentAccess { node_id, access })
    }

    fn on_file_finish(&mut self, indexed: bool, complete: bool) {
        let Some(file) = self.open_files.pop() else {
            tracing::warn!(
                translation_unit = %self.translation_unit,
                "on_file_finish without a matching on_file_start"
            );
            return;
        };

        let complete = complete && !self.storage.has_fatal_errors_in(&file.path);
        self.storage.add_file(StorageFile {
            id: file.id,
            path: file.path,
            modification_time: file.modification_time,
            indexed,
            complete,
        });
    }
}
