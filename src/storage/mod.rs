//! In-memory side of the pipeline: per-job buffers and their hand-off queue.

pub mod intermediate;
pub mod provider;

pub use intermediate::IntermediateStorage;
pub use provider::{ProviderError, StorageProvider, StorageTransport};
