use std::path::Path;
use std::time::Duration;

use keep_store::RetryPolicy;
use keep_types::KEEP_BLOCK_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::StreamResult;

/// Tunables for a [`Stream`](crate::Stream).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// num_retries = 3
/// retry_backoff_ms = 250
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Extra attempts for a failed block fetch or put. Zero means no retry.
    pub num_retries: u32,
    /// Capacity of a write accumulator block.
    pub block_size: usize,
    /// Read size used by line-oriented reads.
    pub read_chunk_size: usize,
    /// Base delay between retry attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            num_retries: 0,
            block_size: KEEP_BLOCK_SIZE,
            read_chunk_size: 1 << 20,
            retry_backoff_ms: 0,
        }
    }
}

impl StreamConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> StreamResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> StreamResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The retry policy for block fetches and puts.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.num_retries, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn with_num_retries(mut self, num_retries: u32) -> Self {
        self.num_retries = num_retries;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }
}
