//! Foundation types for the Keep client.
//!
//! Every block held by the Keep backend is addressed by a [`Locator`]: the
//! MD5 digest of the block plus its length, optionally followed by hints
//! (permission signatures, placement). Manifests refer to blocks only
//! through locators, and to files and streams through escaped names.
//!
//! # Key Types
//!
//! - [`Locator`] -- Content-addressed block reference (`digest+size+hints`)
//! - [`escape_name`] / [`unescape_name`] -- Manifest name escaping (`\040`)
//! - [`split_path`] -- Split a collection path into stream and file name

pub mod error;
pub mod locator;
pub mod names;

pub use error::TypeError;
pub use locator::{Locator, EMPTY_BLOCK_LOCATOR, KEEP_BLOCK_SIZE};
pub use names::{escape_name, split_path, unescape_name};
