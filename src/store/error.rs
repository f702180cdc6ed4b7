//! Store error types
//!
//! Errors reported by a log store collaborator.

use thiserror::Error;

/// Error type for log store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store could not be reached (connection down, permission denied, ...)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Collection does not exist
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection already exists
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// Tailable iteration requested on a collection that is not capped
    #[error("collection is not tailable: {0}")]
    NotTailable(String),

    /// Appended value is not a document
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}
