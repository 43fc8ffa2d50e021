//! Graph entity model: tokens, nodes, edges, locations and the flat storage records.

pub mod name;
pub mod records;
pub mod token;
pub mod types;

pub use name::{NameElement, NameError, NameHierarchy, DELIMITER_CXX, DELIMITER_FILE, DELIMITER_JAVA};
pub use records::{
    Id, StorageCommentLocation, StorageCommentLocationData, StorageComponentAccess, StorageEdge,
    StorageEdgeData, StorageError, StorageErrorData, StorageFile, StorageLocalSymbol,
    StorageLocalSymbolData, StorageNode, StorageNodeData, StorageOccurrence, StorageSourceLocation,
    StorageSourceLocationData, StorageSymbol,
};
pub use token::{Edge, Node, Token};
pub use types::{AccessKind, DefinitionKind, EdgeType, LocationKind, NodeType};
