use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid locator {token:?}: {reason}")]
    InvalidLocator { token: String, reason: String },
}
