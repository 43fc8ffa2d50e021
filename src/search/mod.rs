//! Fuzzy search over qualified symbol names.
//!
//! Names are stored as a trie of scope segments in an arena; each node keeps
//! the ids of the graph tokens whose name ends there. Share it between threads
//! as `Arc<RwLock<SearchIndex>>`: queries take the read lock, rebuilds the
//! write lock.

mod fuzzy;
mod node;

use std::cmp::Ordering;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::graph::GraphStorage;
use crate::model::{Id, NameHierarchy};

pub use fuzzy::{score, FuzzyScore};
pub use node::{SearchNode, SearchNodeId};

/// A trie node whose full name matched a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub node: SearchNodeId,
    pub name: String,
    pub token_ids: Vec<Id>,
    pub score: i64,
    /// Char indices of the matched characters within `name`.
    pub indices: Vec<usize>,
}

impl PartialOrd for SearchMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchMatch {
    /// Best first: higher score, then shorter name, then lexicographic name.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.name.chars().count().cmp(&other.name.chars().count()))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.node.cmp(&other.node))
    }
}

#[derive(Debug, Clone)]
pub struct SearchIndex {
    delimiter: String,
    nodes: Vec<SearchNode>,
}

impl SearchIndex {
    const ROOT: SearchNodeId = SearchNodeId(0);

    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            nodes: vec![SearchNode::new("", None)],
        }
    }

    /// Builds an index over every node name stored in `graph`.
    pub fn build(graph: &GraphStorage, delimiter: &str) -> Result<Self> {
        let mut index = Self::new(delimiter);
        for node in graph.all_nodes()? {
            index.add_name(&node.data.name, node.id);
        }
        tracing::debug!(nodes = index.len(), "built search index");
        Ok(index)
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// The unnamed root every full name hangs off.
    pub fn root(&self) -> SearchNodeId {
        Self::ROOT
    }

    /// Number of named nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for ids this index never issued, including ids kept across
    /// [`SearchIndex::clear`].
    pub fn node(&self, id: SearchNodeId) -> Option<&SearchNode> {
        self.nodes.get(id.0)
    }

    fn split<'n>(&self, full_name: &'n str) -> Vec<&'n str> {
        full_name
            .split(self.delimiter.as_str())
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// Inserts the segments of `full_name`, returning its node. Idempotent.
    pub fn add_node(&mut self, full_name: &str) -> SearchNodeId {
        let segments = self.split(full_name);
        self.add_segments(segments)
    }

    pub fn add_segments<'s, I>(&mut self, segments: I) -> SearchNodeId
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut current = Self::ROOT;
        for segment in segments {
            current = match self.nodes[current.0].child(segment) {
                Some(child) => child,
                None => {
                    let child = SearchNodeId(self.nodes.len());
                    self.nodes.push(SearchNode::new(segment, Some(current)));
                    self.nodes[current.0]
                        .children
                        .insert(segment.to_string(), child);
                    child
                }
            };
        }
        current
    }

    /// Inserts a graph node's name and attaches its token id.
    pub fn add_name(&mut self, name: &NameHierarchy, token_id: Id) -> SearchNodeId {
        let node = self.add_segments(name.segments());
        self.add_token_id(node, token_id);
        node
    }

    /// Returns false when `node` is unknown.
    pub fn add_token_id(&mut self, node: SearchNodeId, token_id: Id) -> bool {
        match self.nodes.get_mut(node.0) {
            Some(entry) => {
                entry.token_ids.insert(token_id);
                true
            }
            None => false,
        }
    }

    pub fn remove_token_id(&mut self, node: SearchNodeId, token_id: Id) -> bool {
        self.nodes
            .get_mut(node.0)
            .is_some_and(|entry| entry.token_ids.remove(&token_id))
    }

    /// Exact lookup by full name.
    pub fn get_node(&self, full_name: &str) -> Option<SearchNodeId> {
        let mut current = Self::ROOT;
        for segment in self.split(full_name) {
            current = self.nodes[current.0].child(segment)?;
        }
        Some(current)
    }

    /// Segments from the root to `node`, joined by the delimiter.
    pub fn full_name(&self, node: SearchNodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = self.nodes.get(id.0)?;
            if entry.parent.is_some() {
                segments.push(entry.name.as_str());
            }
            current = entry.parent;
        }
        segments.reverse();
        Some(segments.join(&self.delimiter))
    }

    /// Every named node whose full name aligns with `query`, best first.
    ///
    /// An empty query matches nothing. Results are not truncated.
    pub fn find_fuzzy_matches(&self, query: &str) -> Vec<SearchMatch> {
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches = Vec::new();
        let mut stack: Vec<(SearchNodeId, String)> = self
            .nodes[0]
            .children()
            .map(|child| (child, self.nodes[child.0].name.clone()))
            .collect();

        while let Some((id, name)) = stack.pop() {
            let entry = &self.nodes[id.0];
            for child in entry.children() {
                let child_name = format!("{}{}{}", name, self.delimiter, self.nodes[child.0].name);
                stack.push((child, child_name));
            }

            if let Some(found) = fuzzy::score(query, &name, &self.delimiter) {
                matches.push(SearchMatch {
                    node: id,
                    token_ids: entry.token_ids.iter().copied().collect(),
                    score: found.score,
                    indices: found.indices,
                    name,
                });
            }
        }

        matches.sort();
        matches
    }

    /// Drops every node but the root.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[0].children.clear();
        self.nodes[0].token_ids.clear();
    }
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new(crate::model::DELIMITER_CXX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(names: &[&str]) -> SearchIndex {
        let mut index = SearchIndex::new("::");
        for (i, name) in names.iter().enumerate() {
            let node = index.add_node(name);
            index.add_token_id(node, i as Id + 1);
        }
        index
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut index = SearchIndex::new("::");
        let first = index.add_node("std::vector");
        let second = index.add_node("std::vector");
        assert_eq!(first, second);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_get_node_reconstructs_full_name() {
        let mut index = SearchIndex::new("::");
        for name in ["a", "a::b", "a::b::c", "x::y"] {
            let node = index.add_node(name);
            assert_eq!(index.get_node(name), Some(node));
            assert_eq!(index.full_name(node).as_deref(), Some(name));
        }
        assert_eq!(index.get_node("a::c"), None);
        assert_eq!(index.node(index.get_node("a::b").unwrap()).unwrap().name(), "b");
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = index_with(&["main", "helper"]);
        assert!(index.find_fuzzy_matches("").is_empty());
    }

    #[test]
    fn test_exact_name_ranks_first() {
        let index = index_with(&["ns::map", "ns::map_impl", "ns::hashmap", "ns::m::a::p"]);
        let matches = index.find_fuzzy_matches("ns::map");
        assert_eq!(matches[0].name, "ns::map");
        assert_eq!(matches[0].token_ids, vec![1]);
    }

    #[test]
    fn test_ties_prefer_shorter_then_lexicographic() {
        let mut matches = vec![
            SearchMatch {
                node: SearchNodeId(2),
                name: "bb".to_string(),
                token_ids: vec![],
                score: 5,
                indices: vec![],
            },
            SearchMatch {
                node: SearchNodeId(1),
                name: "ab".to_string(),
                token_ids: vec![],
                score: 5,
                indices: vec![],
            },
            SearchMatch {
                node: SearchNodeId(3),
                name: "a".to_string(),
                token_ids: vec![],
                score: 5,
                indices: vec![],
            },
            SearchMatch {
                node: SearchNodeId(4),
                name: "zzzz".to_string(),
                token_ids: vec![],
                score: 9,
                indices: vec![],
            },
        ];
        matches.sort();
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["zzzz", "a", "ab", "bb"]);
    }

    #[test]
    fn test_intermediate_scopes_are_searchable() {
        let index = index_with(&["engine::render::draw"]);
        let matches = index.find_fuzzy_matches("render");
        let names: Vec<&str> = matches.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names[0], "engine::render");
        assert!(names.contains(&"engine::render::draw"));
        assert!(matches[0].token_ids.is_empty());
    }

    #[test]
    fn test_remove_token_and_clear() {
        let mut index = index_with(&["a::b"]);
        let node = index.get_node("a::b").unwrap();
        assert!(index.remove_token_id(node, 1));
        assert!(!index.remove_token_id(node, 1));

        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.get_node("a"), None);
        assert!(index.find_fuzzy_matches("a").is_empty());
    }

    #[test]
    fn test_ids_from_before_clear_are_rejected() {
        let mut index = index_with(&["a::b::c"]);
        let stale = index.get_node("a::b::c").unwrap();
        index.clear();

        assert!(index.node(stale).is_none());
        assert_eq!(index.full_name(stale), None);
        assert!(!index.add_token_id(stale, 7));
        assert!(!index.remove_token_id(stale, 1));
        assert!(index.node(index.root()).is_some());
        assert_eq!(index.full_name(index.root()).as_deref(), Some(""));
    }
}
