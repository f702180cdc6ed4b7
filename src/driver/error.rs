//! Driver error types

use thiserror::Error;

/// Driver misuse, rejected before any driving starts
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisuseError {
    /// No handler was supplied
    #[error("a record handler is mandatory")]
    MissingHandler,

    /// The cursor is already closed
    #[error("cursor is closed")]
    CursorClosed,
}
