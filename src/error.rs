//! Crate-level error types

use std::io;

use thiserror::Error;

use crate::driver::MisuseError;
use crate::store::StoreError;
use crate::tail::{CursorError, EligibilityError};
use crate::transport::TransportError;

/// Exit status when the eligibility query fails
pub const EXIT_ELIGIBILITY_FAILED: i32 = 1;

/// Exit status when the target collection is not capped
pub const EXIT_NOT_CAPPED: i32 = 2;

/// Fatal startup condition; the process must not serve
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The store could not tell whether the collection is capped
    #[error("error when detecting capped collection: {0}")]
    Eligibility(#[from] EligibilityError),

    /// The collection exists but is not capped
    #[error("{0} is not a capped collection; tailable cursors need one")]
    NotCapped(String),
}

impl StartupError {
    /// Process exit status for this condition
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Eligibility(_) => EXIT_ELIGIBILITY_FAILED,
            StartupError::NotCapped(_) => EXIT_NOT_CAPPED,
        }
    }
}

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// Startup failed
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Store operation failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tail cursor failed
    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// Driver misuse
    #[error(transparent)]
    Misuse(#[from] MisuseError),

    /// Delivery failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for crate operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let unreachable = StartupError::Eligibility(EligibilityError::Query {
            collection: "messages".into(),
            source: StoreError::Unavailable("refused".into()),
        });
        let missing = StartupError::Eligibility(EligibilityError::MissingOptions("messages".into()));
        let not_capped = StartupError::NotCapped("messages".into());

        assert_eq!(unreachable.exit_code(), EXIT_ELIGIBILITY_FAILED);
        assert_eq!(missing.exit_code(), EXIT_ELIGIBILITY_FAILED);
        assert_eq!(not_capped.exit_code(), EXIT_NOT_CAPPED);
        assert_ne!(unreachable.exit_code(), not_capped.exit_code());
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = CursorError::Closed.into();
        assert!(matches!(err, Error::Cursor(CursorError::Closed)));

        let err: Error = MisuseError::MissingHandler.into();
        assert_eq!(err.to_string(), "a record handler is mandatory");
    }
}
