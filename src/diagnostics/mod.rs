//! Structured diagnostics for the ingest and merge pipeline.
//!
//! Diagnostics are non-fatal: every record they describe was dropped or every
//! file they name was skipped, and indexing carried on.

pub mod ingest_diagnostics;

pub use ingest_diagnostics::{DiagnosticStage, IngestDiagnostic, RecordKind};
