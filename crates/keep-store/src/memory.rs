use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use keep_types::Locator;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. Blocks are keyed by their bare
/// `digest+size` address and held behind a `RwLock`. Every `get` call is
/// counted so callers can assert how often the backend was hit.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<Locator, Bytes>>,
    fetches: AtomicUsize,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.read_map().values().map(|b| b.len() as u64).sum()
    }

    /// Number of `get` calls served so far, including misses.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Remove a block. Returns `true` if it was present.
    pub fn remove(&self, locator: &Locator) -> bool {
        self.blocks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&locator.strip_hints())
            .is_some()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Locator, Bytes>> {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get(&self, locator: &Locator) -> StoreResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.read_map()
            .get(&locator.strip_hints())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(locator.clone()))
    }

    fn put(&self, data: &[u8]) -> StoreResult<Locator> {
        let locator = Locator::for_data(data);
        let mut map = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(locator.clone())
            .or_insert_with(|| Bytes::copy_from_slice(data));
        Ok(locator)
    }

    fn exists(&self, locator: &Locator) -> StoreResult<bool> {
        Ok(self.read_map().contains_key(&locator.strip_hints()))
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .field("fetches", &self.fetch_count())
            .finish()
    }
}
