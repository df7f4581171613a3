//! Common error types for SBN

use thiserror::Error;

/// Common result type for SBN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SBN services
///
/// Numeric rule input has no variant here: the frequency engine clamps it.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cleanup requested without a resolvable playlist
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Request to the broadcast server failed or returned non-success status
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A cleanup for this playlist is already outstanding
    #[error("Cleanup already in progress for playlist {0}")]
    CleanupInProgress(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
