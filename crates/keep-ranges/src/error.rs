use thiserror::Error;

/// Errors from range index mutation.
///
/// Lookups never fail: a query outside the indexed address space simply
/// yields no data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// A splice started beyond the end of the indexed address space.
    #[error("range {start}+{size} starts outside index coverage (size {covered})")]
    OutOfCoverage { start: u64, size: u64, covered: u64 },
}

/// Result alias for range index operations.
pub type RangeResult<T> = Result<T, RangeError>;
