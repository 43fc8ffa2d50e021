//! Stable error codes attached to diagnostics and failure reports
//!
//! Error codes follow the pattern: CT-{CATEGORY}-{3-digit number}
//!
//! Categories:
//! - ING: Ingest buffer consistency (records referencing unknown ids)
//! - MRG: Merge into persistent storage
//! - IDX: Indexing run (front ends, cancellation)
//!
//! Each error code is stable and should not be reused.

/// Edge references a node id the buffer never registered
pub const CT_ING_001_DANGLING_EDGE: &str = "CT-ING-001";

/// Source or comment location references an unknown file node
pub const CT_ING_002_DANGLING_LOCATION: &str = "CT-ING-002";

/// Occurrence references an unknown token or location
pub const CT_ING_003_DANGLING_OCCURRENCE: &str = "CT-ING-003";

/// File, symbol or access record references an unknown node
pub const CT_ING_004_UNKNOWN_NODE: &str = "CT-ING-004";

/// Merge transaction failed and was rolled back
pub const CT_MRG_001_MERGE_FAILED: &str = "CT-MRG-001";

/// Buffer record could not be remapped to a persistent id
pub const CT_MRG_002_UNRESOLVED_REFERENCE: &str = "CT-MRG-002";

/// Database was written with an incompatible schema version
pub const CT_MRG_003_SCHEMA_MISMATCH: &str = "CT-MRG-003";

/// Front end reported a failure for a file
pub const CT_IDX_001_FRONT_END_FAILED: &str = "CT-IDX-001";

/// Job finished after cancellation; its buffer was discarded
pub const CT_IDX_002_DISCARDED_AFTER_INTERRUPT: &str = "CT-IDX-002";

/// Error code documentation
///
/// # Ingest (CT-ING-*)
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | CT-ING-001 | Dangling edge | Front end must register both endpoints before the edge |
/// | CT-ING-002 | Dangling location | Call `on_file_start` before reporting ranges in that file |
/// | CT-ING-003 | Dangling occurrence | Register the token and its location first |
/// | CT-ING-004 | Unknown node | Register the node before its file/symbol/access record |
///
/// # Merge (CT-MRG-*)
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | CT-MRG-001 | Merge failed | Re-index the file; nothing from the failed run was kept |
/// | CT-MRG-002 | Unresolved reference | Usually follows a CT-ING-* diagnostic in the same buffer |
/// | CT-MRG-003 | Schema mismatch | Delete the database and re-index from scratch |
///
/// # Indexing (CT-IDX-*)
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | CT-IDX-001 | Front end failed | Check the file's recorded errors |
/// | CT-IDX-002 | Discarded after interrupt | Re-run indexing for the file |
pub fn describe(code: &str) -> Option<&'static str> {
    match code {
        CT_ING_001_DANGLING_EDGE => Some("edge references an unregistered node"),
        CT_ING_002_DANGLING_LOCATION => Some("location references an unknown file node"),
        CT_ING_003_DANGLING_OCCURRENCE => Some("occurrence references an unknown token or location"),
        CT_ING_004_UNKNOWN_NODE => Some("record references an unknown node"),
        CT_MRG_001_MERGE_FAILED => Some("merge failed and was rolled back"),
        CT_MRG_002_UNRESOLVED_REFERENCE => Some("buffer record could not be remapped"),
        CT_MRG_003_SCHEMA_MISMATCH => Some("incompatible schema version"),
        CT_IDX_001_FRONT_END_FAILED => Some("front end failed"),
        CT_IDX_002_DISCARDED_AFTER_INTERRUPT => Some("buffer discarded after interrupt"),
        _ => None,
    }
}
