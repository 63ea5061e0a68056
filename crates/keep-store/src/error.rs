use keep_types::Locator;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block is not held by the store.
    #[error("block not found: {0}")]
    NotFound(Locator),

    /// A temporary backend failure; the operation may succeed if retried.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// Content read back does not match the locator (data corruption).
    #[error("hash mismatch for {locator}: computed {computed}")]
    HashMismatch { locator: Locator, computed: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every attempt allowed by the retry policy failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Io(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
