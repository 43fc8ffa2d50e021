//! Kind enums shared by every layer of the pipeline.
//!
//! `NodeType` and `EdgeType` are bit values so sets of kinds can be expressed
//! as masks. `NodeType`'s declaration order is its specificity order: a stored
//! node type may only move towards the end of the list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a graph node, ordered by specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Symbol,
    Type,
    BuiltinType,
    Module,
    Namespace,
    Package,
    Struct,
    Class,
    Interface,
    Annotation,
    GlobalVariable,
    Field,
    Function,
    Method,
    Enum,
    EnumConstant,
    Typedef,
    TypeParameter,
    File,
    Macro,
    Union,
}

impl NodeType {
    pub const ALL: [NodeType; 21] = [
        NodeType::Symbol,
        NodeType::Type,
        NodeType::BuiltinType,
        NodeType::Module,
        NodeType::Namespace,
        NodeType::Package,
        NodeType::Struct,
        NodeType::Class,
        NodeType::Interface,
        NodeType::Annotation,
        NodeType::GlobalVariable,
        NodeType::Field,
        NodeType::Function,
        NodeType::Method,
        NodeType::Enum,
        NodeType::EnumConstant,
        NodeType::Typedef,
        NodeType::TypeParameter,
        NodeType::File,
        NodeType::Macro,
        NodeType::Union,
    ];

    /// Bit value persisted in the `node.type` column.
    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_bit(bit: u32) -> Option<NodeType> {
        Self::ALL.iter().copied().find(|t| t.bit() == bit)
    }

    /// True when `self` may replace `stored` without losing information.
    pub fn is_more_specific_than(self, stored: NodeType) -> bool {
        self > stored
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Symbol => "symbol",
            NodeType::Type => "type",
            NodeType::BuiltinType => "builtin_type",
            NodeType::Module => "module",
            NodeType::Namespace => "namespace",
            NodeType::Package => "package",
            NodeType::Struct => "struct",
            NodeType::Class => "class",
            NodeType::Interface => "interface",
            NodeType::Annotation => "annotation",
            NodeType::GlobalVariable => "global_variable",
            NodeType::Field => "field",
            NodeType::Function => "function",
            NodeType::Method => "method",
            NodeType::Enum => "enum",
            NodeType::EnumConstant => "enum_constant",
            NodeType::Typedef => "typedef",
            NodeType::TypeParameter => "type_parameter",
            NodeType::File => "file",
            NodeType::Macro => "macro",
            NodeType::Union => "union",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Member,
    TypeUsage,
    Usage,
    Call,
    Inheritance,
    Override,
    TypeArgument,
    TemplateSpecialization,
    Include,
    Import,
    Aggregation,
    MacroUsage,
    AnnotationUsage,
}

impl EdgeType {
    pub const ALL: [EdgeType; 13] = [
        EdgeType::Member,
        EdgeType::TypeUsage,
        EdgeType::Usage,
        EdgeType::Call,
        EdgeType::Inheritance,
        EdgeType::Override,
        EdgeType::TypeArgument,
        EdgeType::TemplateSpecialization,
        EdgeType::Include,
        EdgeType::Import,
        EdgeType::Aggregation,
        EdgeType::MacroUsage,
        EdgeType::AnnotationUsage,
    ];

    pub fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn from_bit(bit: u32) -> Option<EdgeType> {
        Self::ALL.iter().copied().find(|t| t.bit() == bit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Member => "member",
            EdgeType::TypeUsage => "type_usage",
            EdgeType::Usage => "usage",
            EdgeType::Call => "call",
            EdgeType::Inheritance => "inheritance",
            EdgeType::Override => "override",
            EdgeType::TypeArgument => "type_argument",
            EdgeType::TemplateSpecialization => "template_specialization",
            EdgeType::Include => "include",
            EdgeType::Import => "import",
            EdgeType::Aggregation => "aggregation",
            EdgeType::MacroUsage => "macro_usage",
            EdgeType::AnnotationUsage => "annotation_usage",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How firmly a node's definition is known. Stronger kinds win on merge.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    #[default]
    Unresolved,
    Implicit,
    Explicit,
}

impl DefinitionKind {
    pub fn to_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<DefinitionKind> {
        match value {
            0 => Some(DefinitionKind::Unresolved),
            1 => Some(DefinitionKind::Implicit),
            2 => Some(DefinitionKind::Explicit),
            _ => None,
        }
    }
}

/// Role a source range plays for the token it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Token,
    Scope,
    Qualifier,
    Signature,
    Comment,
    Error,
    LocalSymbol,
}

impl LocationKind {
    pub fn to_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<LocationKind> {
        match value {
            0 => Some(LocationKind::Token),
            1 => Some(LocationKind::Scope),
            2 => Some(LocationKind::Qualifier),
            3 => Some(LocationKind::Signature),
            4 => Some(LocationKind::Comment),
            5 => Some(LocationKind::Error),
            6 => Some(LocationKind::LocalSymbol),
            _ => None,
        }
    }
}

/// Visibility of a member, as reported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Public,
    Protected,
    Private,
    Default,
    TemplateParameter,
    TypeParameter,
}

impl AccessKind {
    pub fn to_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<AccessKind> {
        match value {
            0 => Some(AccessKind::Public),
            1 => Some(AccessKind::Protected),
            2 => Some(AccessKind::Private),
            3 => Some(AccessKind::Default),
            4 => Some(AccessKind::TemplateParameter),
            5 => Some(AccessKind::TypeParameter),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_bits_round_trip() {
        for t in NodeType::ALL {
            assert_eq!(NodeType::from_bit(t.bit()), Some(t));
        }
        assert_eq!(NodeType::from_bit(0), None);
        assert_eq!(NodeType::from_bit(3), None);
    }

    #[test]
    fn test_symbol_is_least_specific() {
        for t in NodeType::ALL.iter().skip(1) {
            assert!(t.is_more_specific_than(NodeType::Symbol));
        }
        assert!(!NodeType::Symbol.is_more_specific_than(NodeType::Class));
        assert!(!NodeType::Class.is_more_specific_than(NodeType::Class));
    }

    #[test]
    fn test_edge_bits_are_distinct() {
        let mask = EdgeType::ALL.iter().fold(0u32, |acc, t| {
            assert_eq!(acc & t.bit(), 0);
            acc | t.bit()
        });
        assert_eq!(mask.count_ones() as usize, EdgeType::ALL.len());
    }

    #[test]
    fn test_definition_kind_order() {
        assert!(DefinitionKind::Explicit > DefinitionKind::Implicit);
        assert!(DefinitionKind::Implicit > DefinitionKind::Unresolved);
        assert_eq!(DefinitionKind::from_i64(2), Some(DefinitionKind::Explicit));
        assert_eq!(DefinitionKind::from_i64(9), None);
    }
}
