//! Ingestion surface for language front ends.
//!
//! Front ends call a [`ParserClient`] while walking a file; the storage-backed
//! client deduplicates everything into one `IntermediateStorage` per job.
//! [`IngestEvent`] is the same surface as data, for front ends that run out of
//! process.

pub mod client;
pub mod event;
pub mod scope;

pub use client::{ParseLocation, ParserClient, StorageParserClient};
pub use event::{parse_event_lines, replay, EventLocation, EventRef, IngestEvent};
pub use scope::ScopeStack;
