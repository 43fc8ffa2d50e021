//! Hand-off queue between indexing workers and the merge consumer.
//!
//! Workers pop an empty buffer, fill it, and push it back as an injection
//! source; the single consumer pops injection sources in FIFO order. One mutex
//! guards the pending queue and the recycle pool, so every pushed buffer is
//! observed by exactly one pop.
//!
//! [`StorageTransport`] is the contract; [`StorageProvider`] is the in-process
//! implementation. A multi-process setup would implement the same trait over
//! IPC and leave the merge side untouched.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::intermediate::IntermediateStorage;

/// Failures of the hand-off queue itself.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("storage provider lock poisoned by a panicked worker")]
    Poisoned,
}

pub trait StorageTransport: Send + Sync {
    /// An empty buffer for a new job.
    fn pop_indexer_target(&self) -> Result<IntermediateStorage, ProviderError>;

    /// Hands a filled buffer to the merge side.
    fn push_indexer_target(&self, storage: IntermediateStorage) -> Result<(), ProviderError>;

    /// Next filled buffer, or `None` when nothing is pending. Never blocks on an empty queue.
    fn pop_injection_source(&self) -> Result<Option<IntermediateStorage>, ProviderError>;

    /// Returns a consumed buffer for reuse.
    fn recycle(&self, storage: IntermediateStorage) -> Result<(), ProviderError>;

    /// Number of buffers waiting to be merged.
    fn pending_count(&self) -> Result<usize, ProviderError>;

    /// Sum of [`IntermediateStorage::byte_size`] over pending buffers.
    fn pending_byte_size(&self) -> Result<usize, ProviderError>;
}

#[derive(Debug, Default)]
struct ProviderState {
    pending: VecDeque<IntermediateStorage>,
    pending_bytes: usize,
    pool: Vec<IntermediateStorage>,
}

/// In-process [`StorageTransport`].
#[derive(Debug)]
pub struct StorageProvider {
    state: Mutex<ProviderState>,
    pool_limit: usize,
}

impl StorageProvider {
    /// Provider that keeps at most `pool_limit` recycled buffers around.
    pub fn new(pool_limit: usize) -> Self {
        Self {
            state: Mutex::new(ProviderState::default()),
            pool_limit,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProviderState>, ProviderError> {
        self.state.lock().map_err(|_| ProviderError::Poisoned)
    }
}

impl StorageTransport for StorageProvider {
    fn pop_indexer_target(&self) -> Result<IntermediateStorage, ProviderError> {
        let mut state = self.lock()?;
        Ok(state.pool.pop().unwrap_or_default())
    }

    fn push_indexer_target(&self, storage: IntermediateStorage) -> Result<(), ProviderError> {
        let bytes = storage.byte_size();
        let mut state = self.lock()?;
        state.pending_bytes += bytes;
        state.pending.push_back(storage);
        Ok(())
    }

    fn pop_injection_source(&self) -> Result<Option<IntermediateStorage>, ProviderError> {
        let mut state = self.lock()?;
        let storage = state.pending.pop_front();
        if let Some(storage) = &storage {
            state.pending_bytes = state.pending_bytes.saturating_sub(storage.byte_size());
        }
        Ok(storage)
    }

    fn recycle(&self, mut storage: IntermediateStorage) -> Result<(), ProviderError> {
        storage.clear();
        let mut state = self.lock()?;
        if state.pool.len() < self.pool_limit {
            state.pool.push(storage);
        }
        Ok(())
    }

    fn pending_count(&self) -> Result<usize, ProviderError> {
        Ok(self.lock()?.pending.len())
    }

    fn pending_byte_size(&self) -> Result<usize, ProviderError> {
        Ok(self.lock()?.pending_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NameHierarchy, NodeType, StorageNodeData, DELIMITER_CXX};
    use std::sync::Arc;
    use std::thread;

    fn buffer_named(name: &str) -> IntermediateStorage {
        let mut storage = IntermediateStorage::new();
        storage.add_node(StorageNodeData {
            node_type: NodeType::Class,
            name: NameHierarchy::parse(name, DELIMITER_CXX),
        });
        storage
    }

    #[test]
    fn test_empty_pop_returns_none() {
        let provider = StorageProvider::new(4);
        assert!(provider.pop_injection_source().unwrap().is_none());
        assert_eq!(provider.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_fifo_order_and_byte_accounting() {
        let provider = StorageProvider::new(4);
        let first = buffer_named("First");
        let bytes = first.byte_size();
        provider.push_indexer_target(first).unwrap();
        provider.push_indexer_target(buffer_named("Second")).unwrap();
        assert_eq!(provider.pending_count().unwrap(), 2);
        assert!(provider.pending_byte_size().unwrap() >= bytes);

        let popped = provider.pop_injection_source().unwrap().unwrap();
        assert_eq!(popped.nodes()[0].data.name.qualified_name(), "First");
        let popped = provider.pop_injection_source().unwrap().unwrap();
        assert_eq!(popped.nodes()[0].data.name.qualified_name(), "Second");
        assert_eq!(provider.pending_byte_size().unwrap(), 0);
    }

    #[test]
    fn test_recycled_buffers_come_back_empty() {
        let provider = StorageProvider::new(1);
        provider.recycle(buffer_named("Used")).unwrap();
        provider.recycle(buffer_named("Dropped")).unwrap();

        let target = provider.pop_indexer_target().unwrap();
        assert!(target.is_empty());
        let fresh = provider.pop_indexer_target().unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_concurrent_push_pop_delivers_exactly_once() {
        let provider = Arc::new(StorageProvider::new(8));
        let producers: Vec<_> = (0..4)
            .map(|worker| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    for job in 0..50 {
                        let mut storage = provider.pop_indexer_target().unwrap();
                        storage.add_node(StorageNodeData {
                            node_type: NodeType::Function,
                            name: NameHierarchy::parse(&format!("w{}::j{}", worker, job), "::"),
                        });
                        provider.push_indexer_target(storage).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = std::collections::BTreeSet::new();
        let mut received = 0;
        while received < 200 {
            match provider.pop_injection_source().unwrap() {
                Some(storage) => {
                    received += 1;
                    assert!(seen.insert(storage.nodes()[0].data.name.qualified_name()));
                    provider.recycle(storage).unwrap();
                }
                None => thread::yield_now(),
            }
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(seen.len(), 200);
        assert!(provider.pop_injection_source().unwrap().is_none());
    }
}
