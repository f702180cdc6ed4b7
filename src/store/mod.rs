//! Log store collaborator
//!
//! The tailing engine consumes a store through two traits:
//!
//! - [`LogStore`] resolves collections, reports their options (the capability
//!   probe used by the eligibility check) and opens filtered, natural-ordered,
//!   tailable raw cursors.
//! - [`RawCursor`] fetches the next matching record, waiting at the tail for
//!   at most an await timeout.
//!
//! [`MemoryStore`] is an in-process implementation with capped collections.

use std::future::Future;
use std::time::Duration;

pub mod error;
pub mod filter;
pub mod memory;
pub mod record;

pub use error::StoreError;
pub use filter::RecordFilter;
pub use memory::{MemoryCursor, MemoryStore};
pub use record::{into_document, CollectionHandle, Document, Record};

/// Options document of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollectionOptions {
    /// Whether the collection is a capped log
    pub capped: bool,
    /// Maximum number of records retained (capped only)
    pub max_records: Option<usize>,
    /// Maximum total document size in bytes (capped only)
    pub max_bytes: Option<usize>,
}

impl CollectionOptions {
    /// Options for a capped collection bounded by record count
    pub fn capped(max_records: usize) -> Self {
        Self {
            capped: true,
            max_records: Some(max_records),
            max_bytes: None,
        }
    }

    /// Options for a plain, unbounded collection
    pub fn uncapped() -> Self {
        Self::default()
    }

    /// Also bound the collection by total document size
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

/// Outcome of a single raw fetch
#[derive(Debug, Clone, PartialEq)]
pub enum RawFetch {
    /// Next matching record in natural order
    Record(Record),
    /// Nothing new arrived within the await timeout
    TimedOut,
    /// Iteration has definitively ended
    Exhausted,
}

/// Forward-only tailable iterator provided by a store
pub trait RawCursor: Send + 'static {
    /// Fetch the next matching record, waiting up to `await_timeout` at the tail
    fn next_record(
        &mut self,
        await_timeout: Duration,
    ) -> impl Future<Output = Result<RawFetch, StoreError>> + Send;
}

/// Log store operations consumed by the tailing engine
pub trait LogStore: Send + Sync + 'static {
    /// Cursor type returned by [`open_tailable`](LogStore::open_tailable)
    type Cursor: RawCursor;

    /// Resolve a collection by name
    fn collection(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<CollectionHandle, StoreError>> + Send;

    /// Fetch the options document of a collection
    ///
    /// `Ok(None)` means the store answered without an options document.
    fn collection_options(
        &self,
        collection: &CollectionHandle,
    ) -> impl Future<Output = Result<Option<CollectionOptions>, StoreError>> + Send;

    /// Open a filtered, natural-ordered, tailable cursor
    fn open_tailable(
        &self,
        collection: &CollectionHandle,
        filter: &RecordFilter,
    ) -> impl Future<Output = Result<Self::Cursor, StoreError>> + Send;
}
