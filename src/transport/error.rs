//! Transport error types

use std::io;

use thiserror::Error;

/// Error type for delivery to a subscriber connection
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection is closed
    #[error("connection closed")]
    Closed,

    /// A message could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
