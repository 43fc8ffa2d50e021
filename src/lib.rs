//! Codetrail: the storage side of a source-code indexer.
//!
//! Language front ends report what they see through an
//! [`ingest::ParserClient`]. Each job fills one deduplicating
//! [`storage::IntermediateStorage`]; a [`storage::StorageTransport`] hands the
//! filled buffers to a single consumer that merges them into a SQLite-backed
//! [`graph::GraphStorage`], garbage-collecting whatever a re-indexed file no
//! longer produces. [`search::SearchIndex`] answers fuzzy queries over the
//! qualified names of everything stored.
//!
//! # Position Conventions
//!
//! Lines and columns are whatever the front end reports; the storage layer
//! never interprets them beyond using them as part of a location's identity.
//!
//! # Threading
//!
//! [`indexer::run_indexing`] runs a scoped worker pool for the front ends and
//! merges on the calling thread. Share the graph as `RwLock<GraphStorage>` and
//! the search index as `RwLock<SearchIndex>`.

pub mod diagnostics;
pub mod error_codes;
pub mod graph;
pub mod indexer;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod search;
pub mod storage;

pub use diagnostics::{DiagnosticStage, IngestDiagnostic, RecordKind};
pub use graph::{GraphStorage, MergeError, MergeReport, StorageStats};
pub use indexer::{
    rebuild_search_index, run_indexing, FrontEnd, IndexJob, IndexReport, IndexerConfig,
    ReplayFrontEnd,
};
pub use ingest::{IngestEvent, ParseLocation, ParserClient, StorageParserClient};
pub use logging::init_logging;
pub use model::{DefinitionKind, EdgeType, Id, NameHierarchy, NodeType};
pub use search::{SearchIndex, SearchMatch};
pub use storage::{IntermediateStorage, ProviderError, StorageProvider, StorageTransport};
