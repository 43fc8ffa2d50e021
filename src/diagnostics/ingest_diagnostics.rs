//! Diagnostics for records dropped during ingest or merge, and for files the
//! indexing run could not process.
//!
//! Same discipline as every other report in the crate:
//! - Deterministic ordering via sort_key()
//! - Stable error codes from [`crate::error_codes`]
//! - serde derives for JSON output

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error_codes;
use crate::model::Id;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagnosticStage {
    /// Front end filling an intermediate buffer
    Buffer,
    /// Buffer being merged into persistent storage
    Merge,
    /// Indexing run orchestration
    Index,
}

impl DiagnosticStage {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Buffer => 0,
            DiagnosticStage::Merge => 1,
            DiagnosticStage::Index => 2,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Buffer => "buffering",
            DiagnosticStage::Merge => "merging",
            DiagnosticStage::Index => "indexing",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for DiagnosticStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Kind of record a drop diagnostic refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Edge,
    SourceLocation,
    CommentLocation,
    Occurrence,
    File,
    Symbol,
    ComponentAccess,
}

impl RecordKind {
    pub fn description(&self) -> &'static str {
        match self {
            RecordKind::Edge => "edge",
            RecordKind::SourceLocation => "source location",
            RecordKind::CommentLocation => "comment location",
            RecordKind::Occurrence => "occurrence",
            RecordKind::File => "file",
            RecordKind::Symbol => "symbol",
            RecordKind::ComponentAccess => "component access",
        }
    }

    /// Error code used when a record of this kind is dropped while buffering.
    fn buffer_code(&self) -> &'static str {
        match self {
            RecordKind::Edge => error_codes::CT_ING_001_DANGLING_EDGE,
            RecordKind::SourceLocation | RecordKind::CommentLocation => {
                error_codes::CT_ING_002_DANGLING_LOCATION
            }
            RecordKind::Occurrence => error_codes::CT_ING_003_DANGLING_OCCURRENCE,
            RecordKind::File | RecordKind::Symbol | RecordKind::ComponentAccess => {
                error_codes::CT_ING_004_UNKNOWN_NODE
            }
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A non-fatal event from the ingest/merge pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngestDiagnostic {
    /// A record referenced an id that was never registered and was dropped
    Dropped {
        stage: DiagnosticStage,
        record: RecordKind,
        /// The id that could not be resolved
        missing_id: Id,
        detail: String,
    },
    /// A whole file could not be processed or merged
    FileFailed {
        stage: DiagnosticStage,
        path: String,
        code: String,
        message: String,
    },
}

impl IngestDiagnostic {
    pub fn dropped(
        stage: DiagnosticStage,
        record: RecordKind,
        missing_id: Id,
        detail: impl Into<String>,
    ) -> Self {
        IngestDiagnostic::Dropped {
            stage,
            record,
            missing_id,
            detail: detail.into(),
        }
    }

    pub fn file_failed(
        stage: DiagnosticStage,
        path: impl Into<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        IngestDiagnostic::FileFailed {
            stage,
            path: path.into(),
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Stable error code for this diagnostic.
    pub fn code(&self) -> &str {
        match self {
            IngestDiagnostic::Dropped {
                stage: DiagnosticStage::Buffer,
                record,
                ..
            } => record.buffer_code(),
            IngestDiagnostic::Dropped { .. } => error_codes::CT_MRG_002_UNRESOLVED_REFERENCE,
            IngestDiagnostic::FileFailed { code, .. } => code,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, IngestDiagnostic::Dropped { .. })
    }

    /// Primary: stage. Secondary: Dropped before FileFailed. Tertiary: code.
    pub fn sort_key(&self) -> (u8, u8, &str) {
        match self {
            IngestDiagnostic::Dropped { stage, .. } => (stage.sort_key(), 0, self.code()),
            IngestDiagnostic::FileFailed { stage, .. } => (stage.sort_key(), 1, self.code()),
        }
    }

    /// Examples:
    /// - "DROP CT-ING-001 buffering edge (missing id 4): call 3 -> 4"
    /// - "FAIL CT-MRG-001 merging src/a.cpp: disk I/O error"
    pub fn format_stderr(&self) -> String {
        match self {
            IngestDiagnostic::Dropped {
                stage,
                record,
                missing_id,
                detail,
            } => format!(
                "DROP {} {} {} (missing id {}): {}",
                self.code(),
                stage,
                record,
                missing_id,
                detail
            ),
            IngestDiagnostic::FileFailed {
                stage,
                path,
                message,
                ..
            } => format!("FAIL {} {} {}: {}", self.code(), stage, path, message),
        }
    }
}

impl fmt::Display for IngestDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_stderr())
    }
}

impl PartialOrd for IngestDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IngestDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.format_stderr().cmp(&other.format_stderr()))
    }
}
