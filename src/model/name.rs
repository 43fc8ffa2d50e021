//! Qualified names and their canonical serialization.
//!
//! The serialized form is the node dedup key in both the ingest buffer and the
//! persistent store, so it must be stable across runs:
//!
//! ```text
//! <delimiter>\tm<name>\ts<prefix>\tp<postfix>[\tn<name>\ts<prefix>\tp<postfix>]...
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter used for scopes in C-family languages.
pub const DELIMITER_CXX: &str = "::";
/// Delimiter used for scopes in Java-like languages.
pub const DELIMITER_JAVA: &str = ".";
/// Delimiter used for file node names.
pub const DELIMITER_FILE: &str = "/";

const META_DELIMITER: &str = "\tm";
const NAME_DELIMITER: &str = "\tn";
const PREFIX_DELIMITER: &str = "\ts";
const POSTFIX_DELIMITER: &str = "\tp";

/// Errors produced when decoding a serialized name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("serialized name is missing the delimiter marker: {0:?}")]
    MissingDelimiter(String),

    #[error("name element {index} is malformed: {element:?}")]
    MalformedElement { index: usize, element: String },
}

/// One scope segment, optionally carrying a signature split into prefix and postfix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameElement {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub postfix: String,
}

impl NameElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            postfix: String::new(),
        }
    }

    pub fn with_signature(
        name: impl Into<String>,
        prefix: impl Into<String>,
        postfix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            postfix: postfix.into(),
        }
    }

    pub fn has_signature(&self) -> bool {
        !self.prefix.is_empty() || !self.postfix.is_empty()
    }
}

/// An ordered list of scope segments plus the delimiter that joins them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameHierarchy {
    delimiter: String,
    elements: Vec<NameElement>,
}

impl NameHierarchy {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            elements: Vec::new(),
        }
    }

    /// Builds a hierarchy from plain segment names.
    pub fn from_segments<I, S>(delimiter: &str, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delimiter: delimiter.to_string(),
            elements: segments.into_iter().map(NameElement::new).collect(),
        }
    }

    /// Splits a qualified name on `delimiter`. Empty segments are skipped.
    pub fn parse(qualified: &str, delimiter: &str) -> Self {
        Self::from_segments(
            delimiter,
            qualified.split(delimiter).filter(|s| !s.is_empty()),
        )
    }

    /// Single-element hierarchy naming a file node.
    pub fn for_file(path: &str) -> Self {
        let mut name = Self::new(DELIMITER_FILE);
        name.push(NameElement::new(path));
        name
    }

    pub fn push(&mut self, element: NameElement) {
        self.elements.push(element);
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn elements(&self) -> &[NameElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&NameElement> {
        self.elements.last()
    }

    /// Hierarchy of the enclosing scope, or `None` at the top level.
    pub fn parent(&self) -> Option<NameHierarchy> {
        if self.elements.len() < 2 {
            return None;
        }
        Some(Self {
            delimiter: self.delimiter.clone(),
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// Every proper prefix of this hierarchy, outermost first.
    pub fn ancestors(&self) -> Vec<NameHierarchy> {
        (1..self.elements.len())
            .map(|len| Self {
                delimiter: self.delimiter.clone(),
                elements: self.elements[..len].to_vec(),
            })
            .collect()
    }

    /// Element names joined by the delimiter, without signatures.
    pub fn qualified_name(&self) -> String {
        self.elements
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(&self.delimiter)
    }

    /// Segment names, used as search-trie edges.
    pub fn segments(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.delimiter.len() + 2 + self.elements.len() * 16);
        out.push_str(&self.delimiter);
        out.push_str(META_DELIMITER);
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push_str(NAME_DELIMITER);
            }
            out.push_str(&element.name);
            out.push_str(PREFIX_DELIMITER);
            out.push_str(&element.prefix);
            out.push_str(POSTFIX_DELIMITER);
            out.push_str(&element.postfix);
        }
        out
    }

    pub fn deserialize(serialized: &str) -> Result<NameHierarchy, NameError> {
        let (delimiter, rest) = serialized
            .split_once(META_DELIMITER)
            .ok_or_else(|| NameError::MissingDelimiter(serialized.to_string()))?;

        let mut name = NameHierarchy::new(delimiter);
        if rest.is_empty() {
            return Ok(name);
        }

        for (index, element) in rest.split(NAME_DELIMITER).enumerate() {
            let malformed = || NameError::MalformedElement {
                index,
                element: element.to_string(),
            };
            let (element_name, signature) =
                element.split_once(PREFIX_DELIMITER).ok_or_else(malformed)?;
            let (prefix, postfix) = signature
                .split_once(POSTFIX_DELIMITER)
                .ok_or_else(malformed)?;
            name.push(NameElement::with_signature(element_name, prefix, postfix));
        }
        Ok(name)
    }
}

impl fmt::Display for NameHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_inverse() {
        let mut name = NameHierarchy::new(DELIMITER_CXX);
        name.push(NameElement::new("ns"));
        name.push(NameElement::with_signature("run", "void", "(int) const"));

        let serialized = name.serialize();
        assert_eq!(serialized, "::\tmns\ts\tp\tnrun\tsvoid\tp(int) const");
        assert_eq!(NameHierarchy::deserialize(&serialized).unwrap(), name);
    }

    #[test]
    fn test_signature_changes_key() {
        let plain = NameHierarchy::from_segments(DELIMITER_CXX, ["a", "f"]);
        let mut overload = NameHierarchy::from_segments(DELIMITER_CXX, ["a"]);
        overload.push(NameElement::with_signature("f", "int", "(float)"));
        assert_ne!(plain.serialize(), overload.serialize());
        assert_eq!(plain.qualified_name(), overload.qualified_name());
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            NameHierarchy::deserialize("no marker"),
            Err(NameError::MissingDelimiter(_))
        ));
        assert!(matches!(
            NameHierarchy::deserialize("::\tmbroken"),
            Err(NameError::MalformedElement { index: 0, .. })
        ));
    }

    #[test]
    fn test_empty_hierarchy() {
        let name = NameHierarchy::new(DELIMITER_JAVA);
        let decoded = NameHierarchy::deserialize(&name.serialize()).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.delimiter(), ".");
    }

    #[test]
    fn test_parse_and_ancestors() {
        let name = NameHierarchy::parse("std::vector::push_back", DELIMITER_CXX);
        assert_eq!(name.segments(), vec!["std", "vector", "push_back"]);
        let ancestors: Vec<String> = name.ancestors().iter().map(|a| a.qualified_name()).collect();
        assert_eq!(ancestors, vec!["std", "std::vector"]);
        assert_eq!(name.parent().unwrap().qualified_name(), "std::vector");
    }

    #[test]
    fn test_file_name_keeps_path_whole() {
        let name = NameHierarchy::for_file("/src/main.cpp");
        assert_eq!(name.len(), 1);
        assert_eq!(name.qualified_name(), "/src/main.cpp");
    }
}
