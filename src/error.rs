//! Error types for the Sluice library.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Sluice operations.
///
/// A rejected admission is not an error; limiters report it as `Ok(false)`.
/// Errors are reserved for misconfiguration and for the distributed
/// variant's store connectivity.
#[derive(Error, Debug)]
pub enum SluiceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external counter store could not serve an admission decision
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Sluice operations.
pub type Result<T> = std::result::Result<T, SluiceError>;
