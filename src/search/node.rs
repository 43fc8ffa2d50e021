//! Trie nodes of the search index.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::Id;

/// Index of a node inside a [`super::SearchIndex`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SearchNodeId(pub(crate) usize);

impl SearchNodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One name segment. The parent link is an arena index, never an owning reference.
#[derive(Debug, Clone, Default)]
pub struct SearchNode {
    pub(crate) name: String,
    pub(crate) parent: Option<SearchNodeId>,
    pub(crate) children: BTreeMap<String, SearchNodeId>,
    pub(crate) token_ids: BTreeSet<Id>,
}

impl SearchNode {
    pub(crate) fn new(name: &str, parent: Option<SearchNodeId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: BTreeMap::new(),
            token_ids: BTreeSet::new(),
        }
    }

    /// The segment this node adds to its parent's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SearchNodeId> {
        self.parent
    }

    pub fn child(&self, segment: &str) -> Option<SearchNodeId> {
        self.children.get(segment).copied()
    }

    pub fn children(&self) -> impl Iterator<Item = SearchNodeId> + '_ {
        self.children.values().copied()
    }

    pub fn token_ids(&self) -> &BTreeSet<Id> {
        &self.token_ids
    }
}
