use bytes::Bytes;
use keep_types::Locator;

use crate::error::StoreResult;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written. `put` of the same content always
///   returns the same locator.
/// - `get` ignores locator hints; digest and size identify the block.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Fetch a block by locator.
    ///
    /// Returns `Err(StoreError::NotFound)` if the block is not held.
    fn get(&self, locator: &Locator) -> StoreResult<Bytes>;

    /// Store a block and return its locator.
    ///
    /// If the block already exists, this is a no-op (idempotent).
    fn put(&self, data: &[u8]) -> StoreResult<Locator>;

    /// Check whether a block is held by the store.
    fn exists(&self, locator: &Locator) -> StoreResult<bool>;
}
