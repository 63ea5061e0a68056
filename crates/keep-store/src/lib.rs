//! Block storage for the Keep client.
//!
//! Keep holds immutable blocks addressed by their [`Locator`]: the MD5 of the
//! content plus its length. The client only ever asks two things of the
//! backend: fetch a block by locator, and store a block and learn its
//! locator. Everything else (streams, files, manifests) is built on top.
//!
//! # Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlockStore`] -- one file per block under a root directory
//!
//! # Retry
//!
//! Fetches and puts go through a [`RetryPolicy`]: a bounded number of
//! attempts with linear backoff. Only transient failures are retried.
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written; the same content always yields the
//!    same locator.
//! 2. Lookups ignore locator hints; a block is identified by digest and size.
//! 3. Every read from disk is verified against the digest.
//! 4. No background retries: once the budget is spent the error surfaces.
//!
//! [`Locator`]: keep_types::Locator

pub mod error;
pub mod fs;
pub mod memory;
pub mod retry;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlockStore;
pub use memory::InMemoryBlockStore;
pub use retry::RetryPolicy;
pub use traits::BlockStore;
