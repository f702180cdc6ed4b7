//! Tail error types

use thiserror::Error;

use crate::store::StoreError;

/// Error returned by a tail cursor fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// Fetch attempted on a closed cursor
    #[error("cursor is closed")]
    Closed,

    /// Opening the tailable cursor failed
    #[error("failed to open tailable cursor on {collection}: {source}")]
    Open {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// The store failed a fetch after the tail was opened
    #[error("fetch failed: {0}")]
    Fetch(#[source] StoreError),
}

/// Error returned by the capped-log eligibility check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    /// The options query itself failed
    #[error("options query failed for {collection}: {source}")]
    Query {
        collection: String,
        #[source]
        source: StoreError,
    },

    /// The store answered without an options document
    #[error("options document for {0} is missing")]
    MissingOptions(String),
}
