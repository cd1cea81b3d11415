//! Error type returned across the public VhdLite API.
//!
//! Module-level errors (for example the virtual disk layer's own error
//! enum) convert into [`VhdliteError`] at the crate boundary so callers only
//! have to match on one type.

use thiserror::Error;

/// Result alias used by every public VhdLite operation.
pub type VhdliteResult<T> = Result<T, VhdliteError>;

/// Errors surfaced by VhdLite.
#[derive(Debug, Error)]
pub enum VhdliteError {
    /// A native storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The caller passed an argument that cannot be sent to the native layer.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not available on this host.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Configuration could not be loaded or is malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for VhdliteError {
    fn from(err: std::io::Error) -> Self {
        VhdliteError::Internal(err.to_string())
    }
}
