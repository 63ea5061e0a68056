use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use keep_types::Locator;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// Directory-backed block store.
///
/// Each block lives at `<root>/<first three digest chars>/<digest>`. Writes go
/// to a temporary file in the target directory and are renamed into place, so
/// a reader never observes a partial block. Reads re-hash the content and
/// report [`StoreError::HashMismatch`] if it no longer matches.
#[derive(Debug, Clone)]
pub struct FsBlockStore {
    root: PathBuf,
}

impl FsBlockStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk path of a block.
    pub fn block_path(&self, locator: &Locator) -> PathBuf {
        let digest = locator.digest();
        self.root.join(&digest[..3]).join(digest)
    }
}

impl BlockStore for FsBlockStore {
    fn get(&self, locator: &Locator) -> StoreResult<Bytes> {
        let path = self.block_path(locator);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(locator.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let computed = Locator::for_data(&data);
        if computed.digest() != locator.digest() || computed.size() != locator.size() {
            return Err(StoreError::HashMismatch {
                locator: locator.clone(),
                computed: computed.to_string(),
            });
        }

        tracing::trace!(%locator, path = %path.display(), "read block");
        Ok(Bytes::from(data))
    }

    fn put(&self, data: &[u8]) -> StoreResult<Locator> {
        let locator = Locator::for_data(data);
        let path = self.block_path(&locator);
        if path.exists() {
            return Ok(locator);
        }

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        tracing::debug!(%locator, path = %path.display(), "wrote block");
        Ok(locator)
    }

    fn exists(&self, locator: &Locator) -> StoreResult<bool> {
        Ok(self.block_path(locator).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::open(dir.path().join("blocks")).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get() {
        let (_dir, store) = store();
        let loc = store.put(b"0123456789").unwrap();
        assert_eq!(loc.to_string(), "781e5e245d69b566979b86e28d23f2c7+10");
        assert_eq!(&store.get(&loc).unwrap()[..], b"0123456789");
        assert!(store.exists(&loc).unwrap());
    }

    #[test]
    fn block_layout_uses_digest_prefix() {
        let (_dir, store) = store();
        let loc = store.put(b"foo").unwrap();
        let path = store.block_path(&loc);
        assert!(path.ends_with("acb/acbd18db4cc2f85cedef654fccc4a4d8"));
        assert!(path.is_file());
    }

    #[test]
    fn put_twice_is_harmless() {
        let (_dir, store) = store();
        let a = store.put(b"foo").unwrap();
        let b = store.put(b"foo").unwrap();
        assert_eq!(a, b);
        assert_eq!(&store.get(&a).unwrap()[..], b"foo");
    }

    #[test]
    fn empty_block_round_trips() {
        let (_dir, store) = store();
        let loc = store.put(b"").unwrap();
        assert_eq!(loc, Locator::empty());
        assert!(store.get(&loc).unwrap().is_empty());
    }

    #[test]
    fn missing_block_is_not_found() {
        let (_dir, store) = store();
        let loc = Locator::for_data(b"absent");
        assert!(matches!(store.get(&loc), Err(StoreError::NotFound(_))));
        assert!(!store.exists(&loc).unwrap());
    }

    #[test]
    fn corrupted_block_is_detected() {
        let (_dir, store) = store();
        let loc = store.put(b"foo").unwrap();
        fs::write(store.block_path(&loc), b"bar").unwrap();
        match store.get(&loc) {
            Err(StoreError::HashMismatch { computed, .. }) => {
                assert_eq!(computed, Locator::for_data(b"bar").to_string());
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        }
    }

    #[test]
    fn reopen_sees_existing_blocks() {
        let (dir, store) = store();
        let loc = store.put(b"persisted").unwrap();
        drop(store);
        let reopened = FsBlockStore::open(dir.path().join("blocks")).unwrap();
        assert_eq!(&reopened.get(&loc).unwrap()[..], b"persisted");
    }
}
