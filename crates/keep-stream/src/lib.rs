//! Streams, stream files and manifests for the Keep client.
//!
//! A manifest describes a collection as one line per stream. Each stream
//! line lists the blocks that make up the stream's address space, followed
//! by file segments laid over that space. Nothing is copied: a file is a
//! list of references into the stream, and the stream is a list of
//! references into immutable blocks.
//!
//! # Layers
//!
//! - [`Manifest`] -- all streams of a collection, parsed from and serialized
//!   back to manifest text
//! - [`Stream`] -- one block list plus its files, guarded by one mutex
//! - [`StreamFile`] -- a handle implementing [`Readable`] and, when opened
//!   for writing, [`Writable`]
//!
//! # Writes
//!
//! Written bytes land in an in-memory accumulator block appended to the
//! stream's block list, and the file's segment list is spliced to point at
//! them. Full accumulators are persisted right away; the rest wait for
//! [`Stream::flush`]. [`Stream::repack`] drops buffered bytes no file
//! references any more and coalesces segments. [`Stream::commit`] does both.
//!
//! # Design Rules
//!
//! 1. Index mutation happens only after the data is held, in an accumulator
//!    or in the store.
//! 2. Block fetches run without the stream lock.
//! 3. Normalized manifest text round-trips byte for byte.
//! 4. Manifest text is never produced while data is still buffered.

pub mod block;
mod buffer;
pub mod config;
pub mod error;
pub mod file;
mod format;
pub mod manifest;
pub mod read;
pub mod stream;

pub use block::{BlockRef, BufferBlockId};
pub use config::StreamConfig;
pub use error::{StreamError, StreamResult};
pub use file::{FileCore, OpenMode, ReadOnlyFile, Readable, StreamFile, Writable, WritableFile};
pub use format::FileEntry;
pub use manifest::Manifest;
pub use read::{ChunkReader, Chunks, Compression, Lines};
pub use stream::{Stream, StreamGuard};
