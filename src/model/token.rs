//! Read-side views assembled from persisted records.

use serde::{Deserialize, Serialize};

use super::name::NameHierarchy;
use super::records::Id;
use super::types::{DefinitionKind, EdgeType, NodeType};

/// Identity shared by nodes and edges: an id plus the locations it occurs at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    id: Id,
    location_ids: Vec<Id>,
}

impl Token {
    pub fn new(id: Id, mut location_ids: Vec<Id>) -> Self {
        location_ids.sort_unstable();
        location_ids.dedup();
        Self { id, location_ids }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn location_ids(&self) -> &[Id] {
        &self.location_ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub token: Token,
    pub node_type: NodeType,
    pub name: NameHierarchy,
    pub definition_kind: DefinitionKind,
}

impl Node {
    pub fn id(&self) -> Id {
        self.token.id()
    }

    pub fn is_defined(&self) -> bool {
        self.definition_kind != DefinitionKind::Unresolved
    }
}

/// A typed relationship. Endpoints are ids, never references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub token: Token,
    pub edge_type: EdgeType,
    pub from: Id,
    pub to: Id,
}

impl Edge {
    pub fn id(&self) -> Id {
        self.token.id()
    }
}
