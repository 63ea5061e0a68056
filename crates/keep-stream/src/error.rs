use keep_ranges::RangeError;
use keep_store::StoreError;
use keep_types::Locator;

use crate::block::BufferBlockId;

/// Errors from stream, file and manifest operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A manifest token matches no recognized grammar.
    #[error("malformed manifest token {token:?}: {reason}")]
    Format { token: String, reason: String },

    /// A manifest line failed to parse.
    #[error("manifest line {line}: {source}")]
    Manifest {
        line: usize,
        #[source]
        source: Box<StreamError>,
    },

    /// No file with this name exists in the stream.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The file name cannot be stored in a stream.
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    /// An open mode string is not one of `r`, `r+`, `w`, `w+`, `a`, `a+`.
    #[error("invalid open mode {0:?}")]
    InvalidMode(String),

    /// A block fetch failed after the retry budget was spent.
    #[error("failed to fetch {size} bytes at offset {offset} of block {locator}: {source}")]
    Fetch {
        locator: Locator,
        offset: u64,
        size: u64,
        #[source]
        source: StoreError,
    },

    /// A fetched block is shorter than the index says it is.
    #[error("block {locator} holds {actual} bytes, needed {needed}")]
    ShortBlock {
        locator: Locator,
        actual: usize,
        needed: usize,
    },

    /// Block store failure outside a read (persisting buffered blocks).
    #[error("block store error: {0}")]
    Store(#[from] StoreError),

    /// The range index rejected a splice.
    #[error("range index error: {0}")]
    Range(#[from] RangeError),

    /// A write would leave a hole in the file.
    #[error("write at offset {offset} is past the end of {name} ({size} bytes)")]
    WriteBeyondEnd { name: String, offset: u64, size: u64 },

    /// Truncation can only shrink a file.
    #[error("cannot truncate {name} to {requested} bytes, file has {size}")]
    TruncateBeyondEnd {
        name: String,
        requested: u64,
        size: u64,
    },

    /// The block list points at an accumulator that is no longer held.
    #[error("block list references {0}, which holds no data")]
    MissingBuffer(BufferBlockId),

    /// The file handle was closed.
    #[error("file {0} is closed")]
    Closed(String),

    /// Manifest text was requested while written data is still buffered.
    #[error("stream {stream} has {count} uncommitted buffer block(s)")]
    UncommittedBuffers { stream: String, count: usize },

    /// I/O failure (configuration files, decompression).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for [`StreamConfig`](crate::StreamConfig).
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl StreamError {
    pub(crate) fn format(token: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<StreamError> for std::io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}

/// Result alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
