//! Per-job deduplicating buffer.
//!
//! One `IntermediateStorage` is filled by one worker while a front end walks a
//! single translation unit. Every record kind is kept in insertion order plus a
//! hash index on its identity fields, so re-submitting an identical record
//! returns the id issued the first time.
//!
//! # Guarantees
//!
//! - Ids come from one counter starting at 1 and are only meaningful inside
//!   this instance. Merging remaps them.
//! - A node's type only moves up the specificity order.
//! - Records referencing an id this buffer never issued are dropped and
//!   recorded as an [`IngestDiagnostic`]; they never abort the job.

use ahash::{AHashMap, AHashSet};
use std::mem::size_of;

use crate::diagnostics::{DiagnosticStage, IngestDiagnostic, RecordKind};
use crate::model::{
    Id, NodeType, StorageCommentLocation, StorageCommentLocationData, StorageComponentAccess,
    StorageEdge, StorageEdgeData, StorageError, StorageErrorData, StorageFile, StorageLocalSymbol,
    StorageLocalSymbolData, StorageNode, StorageNodeData, StorageOccurrence, StorageSourceLocation,
    StorageSourceLocationData, StorageSymbol,
};

#[derive(Debug, Clone)]
pub struct IntermediateStorage {
    next_id: Id,
    /// Job path this buffer was filled for; the merge records ownership under it.
    source_path: Option<String>,

    nodes: Vec<StorageNode>,
    node_by_name: AHashMap<String, usize>,
    node_by_id: AHashMap<Id, usize>,

    files: Vec<StorageFile>,
    file_by_id: AHashMap<Id, usize>,

    symbols: Vec<StorageSymbol>,
    symbol_by_id: AHashMap<Id, usize>,

    edges: Vec<StorageEdge>,
    edge_by_key: AHashMap<StorageEdgeData, usize>,
    edge_ids: AHashSet<Id>,

    local_symbols: Vec<StorageLocalSymbol>,
    local_symbol_by_name: AHashMap<String, usize>,
    local_symbol_ids: AHashSet<Id>,

    source_locations: Vec<StorageSourceLocation>,
    location_by_key: AHashMap<StorageSourceLocationData, usize>,
    location_ids: AHashSet<Id>,

    occurrences: Vec<StorageOccurrence>,
    occurrence_set: AHashSet<StorageOccurrence>,

    component_accesses: Vec<StorageComponentAccess>,
    access_set: AHashSet<StorageComponentAccess>,

    comment_locations: Vec<StorageCommentLocation>,
    comment_by_key: AHashMap<StorageCommentLocationData, usize>,

    errors: Vec<StorageError>,
    error_by_key: AHashMap<StorageErrorData, usize>,

    diagnostics: Vec<IngestDiagnostic>,
}

impl Default for IntermediateStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl IntermediateStorage {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            source_path: None,
            nodes: Vec::new(),
            node_by_name: AHashMap::new(),
            node_by_id: AHashMap::new(),
            files: Vec::new(),
            file_by_id: AHashMap::new(),
            symbols: Vec::new(),
            symbol_by_id: AHashMap::new(),
            edges: Vec::new(),
            edge_by_key: AHashMap::new(),
            edge_ids: AHashSet::new(),
            local_symbols: Vec::new(),
            local_symbol_by_name: AHashMap::new(),
            local_symbol_ids: AHashSet::new(),
            source_locations: Vec::new(),
            location_by_key: AHashMap::new(),
            location_ids: AHashSet::new(),
            occurrences: Vec::new(),
            occurrence_set: AHashSet::new(),
            component_accesses: Vec::new(),
            access_set: AHashSet::new(),
            comment_locations: Vec::new(),
            comment_by_key: AHashMap::new(),
            errors: Vec::new(),
            error_by_key: AHashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn drop_record(&mut self, record: RecordKind, missing_id: Id, detail: String) {
        let diagnostic =
            IngestDiagnostic::dropped(DiagnosticStage::Buffer, record, missing_id, detail);
        tracing::warn!(code = diagnostic.code(), "{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Registers a node keyed on its serialized name.
    ///
    /// A repeated name returns the existing id; its stored type is replaced
    /// only by a more specific one.
    pub fn add_node(&mut self, data: StorageNodeData) -> Id {
        let key = data.name.serialize();
        if let Some(&index) = self.node_by_name.get(&key) {
            let stored = &mut self.nodes[index];
            if data.node_type.is_more_specific_than(stored.data.node_type) {
                stored.data.node_type = data.node_type;
            }
            return stored.id;
        }

        let id = self.allocate_id();
        let index = self.nodes.len();
        self.nodes.push(StorageNode { id, data });
        self.node_by_name.insert(key, index);
        self.node_by_id.insert(id, index);
        id
    }

    /// Upgrades the type of an already registered node. Returns false for unknown ids.
    pub fn set_node_type(&mut self, id: Id, node_type: NodeType) -> bool {
        match self.node_by_id.get(&id) {
            Some(&index) => {
                let stored = &mut self.nodes[index];
                if node_type.is_more_specific_than(stored.data.node_type) {
                    stored.data.node_type = node_type;
                }
                true
            }
            None => false,
        }
    }

    pub fn node(&self, id: Id) -> Option<&StorageNode> {
        self.node_by_id.get(&id).map(|&index| &self.nodes[index])
    }

    pub fn node_id_for_serialized_name(&self, serialized: &str) -> Option<Id> {
        self.node_by_name
            .get(serialized)
            .map(|&index| self.nodes[index].id)
    }

    pub fn has_node(&self, id: Id) -> bool {
        self.node_by_id.contains_key(&id)
    }

    fn is_token(&self, id: Id) -> bool {
        self.node_by_id.contains_key(&id)
            || self.edge_ids.contains(&id)
            || self.local_symbol_ids.contains(&id)
    }

    // ------------------------------------------------------------------
    // Files and symbols
    // ------------------------------------------------------------------

    /// Records a file for an existing file node.
    ///
    /// Repeated submissions for the same node OR their `indexed`/`complete`
    /// flags and keep the newest modification time.
    pub fn add_file(&mut self, file: StorageFile) -> bool {
        if !self.has_node(file.id) {
            self.drop_record(RecordKind::File, file.id, file.path);
            return false;
        }

        if let Some(&index) = self.file_by_id.get(&file.id) {
            let stored = &mut self.files[index];
            stored.indexed |= file.indexed;
            stored.complete |= file.complete;
            stored.modification_time = stored.modification_time.max(file.modification_time);
            return true;
        }

        self.file_by_id.insert(file.id, self.files.len());
        self.files.push(file);
        true
    }

    pub fn file(&self, id: Id) -> Option<&StorageFile> {
        self.file_by_id.get(&id).map(|&index| &self.files[index])
    }

    /// Records a definition kind; a stronger kind replaces a weaker one.
    pub fn add_symbol(&mut self, symbol: StorageSymbol) -> bool {
        if !self.has_node(symbol.id) {
            self.drop_record(
                RecordKind::Symbol,
                symbol.id,
                format!("{:?}", symbol.definition_kind),
            );
            return false;
        }

        if let Some(&index) = self.symbol_by_id.get(&symbol.id) {
            let stored = &mut self.symbols[index];
            stored.definition_kind = stored.definition_kind.max(symbol.definition_kind);
            return true;
        }

        self.symbol_by_id.insert(symbol.id, self.symbols.len());
        self.symbols.push(symbol);
        true
    }

    pub fn add_component_access(&mut self, access: StorageComponentAccess) -> bool {
        if !self.has_node(access.node_id) {
            self.drop_record(
                RecordKind::ComponentAccess,
                access.node_id,
                format!("{:?}", access.access),
            );
            return false;
        }

        if self.access_set.insert(access) {
            self.component_accesses.push(access);
        }
        true
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Registers an edge keyed on (type, source, target).
    ///
    /// Returns `None` without storing anything when either endpoint is not a
    /// node of this buffer.
    pub fn add_edge(&mut self, data: StorageEdgeData) -> Option<Id> {
        if let Some(&index) = self.edge_by_key.get(&data) {
            return Some(self.edges[index].id);
        }

        for endpoint in [data.source_node_id, data.target_node_id] {
            if !self.has_node(endpoint) {
                self.drop_record(
                    RecordKind::Edge,
                    endpoint,
                    format!(
                        "{} {} -> {}",
                        data.edge_type, data.source_node_id, data.target_node_id
                    ),
                );
                return None;
            }
        }

        let id = self.allocate_id();
        self.edge_by_key.insert(data, self.edges.len());
        self.edge_ids.insert(id);
        self.edges.push(StorageEdge { id, data });
        Some(id)
    }

    // ------------------------------------------------------------------
    // Local symbols
    // ------------------------------------------------------------------

    /// Registers a local variable keyed on its name. Always succeeds.
    pub fn add_local_symbol(&mut self, data: StorageLocalSymbolData) -> Id {
        if let Some(&index) = self.local_symbol_by_name.get(&data.name) {
            return self.local_symbols[index].id;
        }

        let id = self.allocate_id();
        self.local_symbol_by_name
            .insert(data.name.clone(), self.local_symbols.len());
        self.local_symbol_ids.insert(id);
        self.local_symbols.push(StorageLocalSymbol { id, data });
        id
    }

    // ------------------------------------------------------------------
    // Locations and occurrences
    // ------------------------------------------------------------------

    /// Registers a source range inside a known file node.
    pub fn add_source_location(&mut self, data: StorageSourceLocationData) -> Option<Id> {
        if let Some(&index) = self.location_by_key.get(&data) {
            return Some(self.source_locations[index].id);
        }

        if !self.has_node(data.file_node_id) {
            self.drop_record(
                RecordKind::SourceLocation,
                data.file_node_id,
                format!(
                    "{}:{}-{}:{}",
                    data.start_line, data.start_column, data.end_line, data.end_column
                ),
            );
            return None;
        }

        let id = self.allocate_id();
        self.location_by_key.insert(data, self.source_locations.len());
        self.location_ids.insert(id);
        self.source_locations.push(StorageSourceLocation { id, data });
        Some(id)
    }

    /// Binds a token to a location. Returns the canonical record, or `None`
    /// when either side is unknown.
    pub fn add_occurrence(&mut self, occurrence: StorageOccurrence) -> Option<StorageOccurrence> {
        if self.occurrence_set.contains(&occurrence) {
            return Some(occurrence);
        }

        let missing = if !self.is_token(occurrence.element_id) {
            Some(occurrence.element_id)
        } else if !self.location_ids.contains(&occurrence.source_location_id) {
            Some(occurrence.source_location_id)
        } else {
            None
        };
        if let Some(missing_id) = missing {
            self.drop_record(
                RecordKind::Occurrence,
                missing_id,
                format!(
                    "token {} at location {}",
                    occurrence.element_id, occurrence.source_location_id
                ),
            );
            return None;
        }

        self.occurrence_set.insert(occurrence);
        self.occurrences.push(occurrence);
        Some(occurrence)
    }

    pub fn add_comment_location(&mut self, data: StorageCommentLocationData) -> Option<Id> {
        if let Some(&index) = self.comment_by_key.get(&data) {
            return Some(self.comment_locations[index].id);
        }

        if !self.has_node(data.file_node_id) {
            self.drop_record(
                RecordKind::CommentLocation,
                data.file_node_id,
                format!(
                    "{}:{}-{}:{}",
                    data.start_line, data.start_column, data.end_line, data.end_column
                ),
            );
            return None;
        }

        let id = self.allocate_id();
        self.comment_by_key.insert(data, self.comment_locations.len());
        self.comment_locations.push(StorageCommentLocation { id, data });
        Some(id)
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub fn add_error(&mut self, data: StorageErrorData) -> Id {
        if let Some(&index) = self.error_by_key.get(&data) {
            return self.errors[index].id;
        }

        let id = self.allocate_id();
        self.error_by_key.insert(data.clone(), self.errors.len());
        self.errors.push(StorageError { id, data });
        id
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| e.data.fatal)
    }

    /// True when a fatal error was recorded against `path`.
    pub fn has_fatal_errors_in(&self, path: &str) -> bool {
        self.errors
            .iter()
            .any(|e| e.data.fatal && e.data.file_path == path)
    }

    pub fn set_all_files_incomplete(&mut self) {
        for file in &mut self.files {
            file.complete = false;
        }
    }

    /// Clears `complete` on every file that has a fatal error in this buffer.
    pub fn set_files_with_errors_incomplete(&mut self) {
        let fatal_paths: AHashSet<&str> = self
            .errors
            .iter()
            .filter(|e| e.data.fatal)
            .map(|e| e.data.file_path.as_str())
            .collect();

        for file in &mut self.files {
            if fatal_paths.contains(file.path.as_str()) {
                file.complete = false;
            }
        }
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    /// Empties every map and restarts ids at 1.
    pub fn clear(&mut self) {
        self.next_id = 1;
        self.source_path = None;
        self.nodes.clear();
        self.node_by_name.clear();
        self.node_by_id.clear();
        self.files.clear();
        self.file_by_id.clear();
        self.symbols.clear();
        self.symbol_by_id.clear();
        self.edges.clear();
        self.edge_by_key.clear();
        self.edge_ids.clear();
        self.local_symbols.clear();
        self.local_symbol_by_name.clear();
        self.local_symbol_ids.clear();
        self.source_locations.clear();
        self.location_by_key.clear();
        self.location_ids.clear();
        self.occurrences.clear();
        self.occurrence_set.clear();
        self.component_accesses.clear();
        self.access_set.clear();
        self.comment_locations.clear();
        self.comment_by_key.clear();
        self.errors.clear();
        self.error_by_key.clear();
        self.diagnostics.clear();
    }

    pub fn set_source_path(&mut self, path: impl Into<String>) {
        self.source_path = Some(path.into());
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.errors.is_empty()
    }

    /// Estimated memory footprint of the buffered records.
    ///
    /// Counts record structs plus string payloads; index overhead is ignored.
    pub fn byte_size(&self) -> usize {
        let nodes: usize = self
            .nodes
            .iter()
            .map(|n| {
                size_of::<StorageNode>()
                    + n.data
                        .name
                        .elements()
                        .iter()
                        .map(|e| e.name.len() + e.prefix.len() + e.postfix.len())
                        .sum::<usize>()
            })
            .sum();
        let files: usize = self
            .files
            .iter()
            .map(|f| size_of::<StorageFile>() + f.path.len())
            .sum();
        let local_symbols: usize = self
            .local_symbols
            .iter()
            .map(|l| size_of::<StorageLocalSymbol>() + l.data.name.len())
            .sum();
        let errors: usize = self
            .errors
            .iter()
            .map(|e| {
                size_of::<StorageError>()
                    + e.data.message.len()
                    + e.data.file_path.len()
                    + e.data.translation_unit.len()
            })
            .sum();

        nodes
            + files
            + local_symbols
            + errors
            + self.symbols.len() * size_of::<StorageSymbol>()
            + self.edges.len() * size_of::<StorageEdge>()
            + self.source_locations.len() * size_of::<StorageSourceLocation>()
            + self.occurrences.len() * size_of::<StorageOccurrence>()
            + self.component_accesses.len() * size_of::<StorageComponentAccess>()
            + self.comment_locations.len() * size_of::<StorageCommentLocation>()
    }

    pub fn nodes(&self) -> &[StorageNode] {
        &self.nodes
    }

    pub fn files(&self) -> &[StorageFile] {
        &self.files
    }

    pub fn symbols(&self) -> &[StorageSymbol] {
        &self.symbols
    }

    pub fn edges(&self) -> &[StorageEdge] {
        &self.edges
    }

    pub fn local_symbols(&self) -> &[StorageLocalSymbol] {
        &self.local_symbols
    }

    pub fn source_locations(&self) -> &[StorageSourceLocation] {
        &self.source_locations
    }

    pub fn occurrences(&self) -> &[StorageOccurrence] {
        &self.occurrences
    }

    pub fn component_accesses(&self) -> &[StorageComponentAccess] {
        &self.component_accesses
    }

    pub fn comment_locations(&self) -> &[StorageCommentLocation] {
        &self.comment_locations
    }

    pub fn errors(&self) -> &[StorageError] {
        &self.errors
    }

    pub fn diagnostics(&self) -> &[IngestDiagnostic] {
        &self.diagnostics
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn source_location_count(&self) -> usize {
        self.source_locations.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AccessKind, DefinitionKind, EdgeType, LocationKind, NameHierarchy, DELIMITER_CXX,
    };

    fn node(name: &str, node_type: NodeType) -> StorageNodeData {
        StorageNodeData {
            node_type,
            name: NameHierarchy::parse(name, DELIMITER_CXX),
        }
    }

    fn file_node(storage: &mut IntermediateStorage, path: &str) -> Id {
        storage.add_node(StorageNodeData {
            node_type: NodeType::File,
            name: NameHierarchy::for_file(path),
        })
    }

    fn location(file_node_id: Id, line: u32) -> StorageSourceLocationData {
        StorageSourceLocationData {
            file_node_id,
            start_line: line,
            start_column: 1,
            end_line: line,
            end_column: 10,
            kind: LocationKind::Token,
        }
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut storage = IntermediateStorage::new();
        assert_eq!(storage.add_node(node("a", NodeType::Class)), 1);
        assert_eq!(storage.add_node(node("b", NodeType::Class)), 2);
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut storage = IntermediateStorage::new();
        let first = storage.add_node(node("ns::A", NodeType::Class));
        let second = storage.add_node(node("ns::A", NodeType::Class));
        assert_eq!(first, second);
        assert_eq!(storage.node_count(), 1);
    }

    #[test]
    fn test_node_type_upgrades_never_downgrades() {
        let mut storage = IntermediateStorage::new();
        let id = storage.add_node(node("A", NodeType::Symbol));
        storage.add_node(node("A", NodeType::Class));
        assert_eq!(storage.node(id).unwrap().data.node_type, NodeType::Class);

        let mut reversed = IntermediateStorage::new();
        let id = reversed.add_node(node("A", NodeType::Class));
        reversed.add_node(node("A", NodeType::Symbol));
        assert_eq!(reversed.node(id).unwrap().data.node_type, NodeType::Class);

        assert!(reversed.set_node_type(id, NodeType::Union));
        assert_eq!(reversed.node(id).unwrap().data.node_type, NodeType::Union);
        assert!(!reversed.set_node_type(99, NodeType::Union));
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut storage = IntermediateStorage::new();
        let a = storage.add_node(node("a", NodeType::Function));
        let b = storage.add_node(node("b", NodeType::Function));
        let data = StorageEdgeData {
            edge_type: EdgeType::Call,
            source_node_id: a,
            target_node_id: b,
        };
        assert_eq!(storage.add_edge(data), storage.add_edge(data));
        assert_eq!(storage.edge_count(), 1);
    }

    #[test]
    fn test_dangling_edge_is_dropped() {
        let mut storage = IntermediateStorage::new();
        let a = storage.add_node(node("a", NodeType::Function));
        let result = storage.add_edge(StorageEdgeData {
            edge_type: EdgeType::Call,
            source_node_id: a,
            target_node_id: 42,
        });

        assert_eq!(result, None);
        assert_eq!(storage.edge_count(), 0);
        assert_eq!(storage.diagnostics().len(), 1);
        assert_eq!(storage.diagnostics()[0].code(), "CT-ING-001");
    }

    #[test]
    fn test_locations_and_occurrences() {
        let mut storage = IntermediateStorage::new();
        let file = file_node(&mut storage, "a.cpp");
        let a = storage.add_node(node("a", NodeType::Function));

        let loc = storage.add_source_location(location(file, 3)).unwrap();
        assert_eq!(storage.add_source_location(location(file, 3)), Some(loc));

        let occ = StorageOccurrence {
            element_id: a,
            source_location_id: loc,
        };
        assert_eq!(storage.add_occurrence(occ), Some(occ));
        assert_eq!(storage.add_occurrence(occ), Some(occ));
        assert_eq!(storage.occurrences().len(), 1);

        assert_eq!(storage.add_source_location(location(77, 1)), None);
        let dangling = StorageOccurrence {
            element_id: 123,
            source_location_id: loc,
        };
        assert_eq!(storage.add_occurrence(dangling), None);
        assert_eq!(storage.diagnostics().len(), 2);
    }

    #[test]
    fn test_local_symbols_dedup_by_name_and_carry_occurrences() {
        let mut storage = IntermediateStorage::new();
        let file = file_node(&mut storage, "a.cpp");
        let counter = storage.add_local_symbol(StorageLocalSymbolData {
            name: "a.cpp<4:9>".to_string(),
        });
        let again = storage.add_local_symbol(StorageLocalSymbolData {
            name: "a.cpp<4:9>".to_string(),
        });
        let other = storage.add_local_symbol(StorageLocalSymbolData {
            name: "a.cpp<7:3>".to_string(),
        });
        assert_eq!(counter, again);
        assert_ne!(counter, other);
        assert_eq!(storage.local_symbols().len(), 2);

        let loc = storage.add_source_location(location(file, 4)).unwrap();
        let occ = StorageOccurrence {
            element_id: counter,
            source_location_id: loc,
        };
        assert_eq!(storage.add_occurrence(occ), Some(occ));
        assert!(storage.diagnostics().is_empty());

        let before = storage.byte_size();
        storage.clear();
        assert!(before > 0);
        assert!(storage.local_symbols().is_empty());
    }

    #[test]
    fn test_add_file_ors_flags() {
        let mut storage = IntermediateStorage::new();
        let id = file_node(&mut storage, "a.h");
        let mut file = StorageFile {
            id,
            path: "a.h".to_string(),
            modification_time: 10,
            indexed: false,
            complete: true,
        };
        assert!(storage.add_file(file.clone()));
        file.indexed = true;
        file.complete = false;
        file.modification_time = 5;
        assert!(storage.add_file(file));

        let stored = storage.file(id).unwrap();
        assert!(stored.indexed);
        assert!(stored.complete);
        assert_eq!(stored.modification_time, 10);
        assert_eq!(storage.files().len(), 1);
    }

    #[test]
    fn test_symbol_keeps_strongest_definition() {
        let mut storage = IntermediateStorage::new();
        let id = storage.add_node(node("f", NodeType::Function));
        storage.add_symbol(StorageSymbol {
            id,
            definition_kind: DefinitionKind::Explicit,
        });
        storage.add_symbol(StorageSymbol {
            id,
            definition_kind: DefinitionKind::Implicit,
        });
        assert_eq!(storage.symbols().len(), 1);
        assert_eq!(storage.symbols()[0].definition_kind, DefinitionKind::Explicit);
    }

    #[test]
    fn test_errors_and_completeness() {
        let mut storage = IntermediateStorage::new();
        let id = file_node(&mut storage, "a.cpp");
        storage.add_file(StorageFile {
            id,
            path: "a.cpp".to_string(),
            modification_time: 0,
            indexed: true,
            complete: true,
        });

        let error = StorageErrorData {
            message: "expected ';'".to_string(),
            file_path: "a.cpp".to_string(),
            line: 4,
            column: 2,
            fatal: true,
            indexed: true,
            translation_unit: "a.cpp".to_string(),
        };
        let first = storage.add_error(error.clone());
        assert_eq!(storage.add_error(error), first);
        assert!(storage.has_fatal_errors());
        assert!(storage.has_fatal_errors_in("a.cpp"));
        assert!(!storage.has_fatal_errors_in("b.cpp"));

        storage.set_files_with_errors_incomplete();
        assert!(!storage.file(id).unwrap().complete);
    }

    #[test]
    fn test_component_access_dedup() {
        let mut storage = IntermediateStorage::new();
        let id = storage.add_node(node("A::x", NodeType::Field));
        let access = StorageComponentAccess {
            node_id: id,
            access: AccessKind::Private,
        };
        assert!(storage.add_component_access(access));
        assert!(storage.add_component_access(access));
        assert_eq!(storage.component_accesses().len(), 1);
        assert!(!storage.add_component_access(StorageComponentAccess {
            node_id: 500,
            access: AccessKind::Public,
        }));
    }

    #[test]
    fn test_clear_resets_ids() {
        let mut storage = IntermediateStorage::new();
        storage.add_node(node("a", NodeType::Class));
        storage.add_node(node("b", NodeType::Class));
        assert!(storage.byte_size() > 0);

        storage.set_source_path("a.cpp");
        storage.clear();
        assert!(storage.is_empty());
        assert_eq!(storage.byte_size(), 0);
        assert_eq!(storage.source_path(), None);
        assert_eq!(storage.add_node(node("c", NodeType::Class)), 1);
    }

    #[test]
    fn test_set_all_files_incomplete() {
        let mut storage = IntermediateStorage::new();
        for path in ["a.cpp", "b.h"] {
            let id = file_node(&mut storage, path);
            storage.add_file(StorageFile {
                id,
                path: path.to_string(),
                modification_time: 1,
                indexed: true,
                complete: true,
            });
        }

        storage.set_all_files_incomplete();
        assert!(storage.files().iter().all(|f| !f.complete));
    }
}
