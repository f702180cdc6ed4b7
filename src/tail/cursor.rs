//! Tail cursor
//!
//! `TailCursor` wraps a store's raw tailable cursor with an explicit
//! OPEN/CLOSED state machine:
//!
//! ```text
//!   open() ──► Open ──fetch_next()──► Record | Pending   (stays Open)
//!               │
//!               ├── store exhausted ──► Closed (fetch returns Fetch::Closed once)
//!               └── store error ──────► Closed (fetch returns CursorError::Fetch)
//!
//!   Closed ──fetch_next()──► CursorError::Closed
//! ```

use crate::store::{CollectionHandle, LogStore, RawCursor, RawFetch, Record, RecordFilter};

use super::config::TailConfig;
use super::error::CursorError;

/// Cursor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Fetches are permitted
    Open,
    /// Iteration ended; no further fetches
    Closed,
}

/// Outcome of a successful fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    /// Next matching record in natural order
    Record(Record),
    /// No record available yet; the cursor stays open
    Pending,
    /// The store ended iteration; the cursor is now closed
    Closed,
}

/// Filtered, natural-ordered, tailable cursor over a capped log
pub struct TailCursor<C: RawCursor> {
    raw: C,
    state: CursorState,
    collection: CollectionHandle,
    filter: RecordFilter,
    config: TailConfig,
}

impl<C: RawCursor> TailCursor<C> {
    /// Open a tail cursor on a collection
    ///
    /// The filter is handed to the store, which skips non-matching records
    /// during iteration. Iteration starts at the oldest retained record.
    pub async fn open<S>(
        store: &S,
        collection: &CollectionHandle,
        filter: RecordFilter,
        config: TailConfig,
    ) -> Result<Self, CursorError>
    where
        S: LogStore<Cursor = C>,
    {
        let raw = store
            .open_tailable(collection, &filter)
            .await
            .map_err(|source| CursorError::Open {
                collection: collection.name().to_string(),
                source,
            })?;

        tracing::debug!(
            collection = %collection,
            filter = %filter,
            "Tail cursor opened"
        );

        Ok(Self::from_raw(raw, collection.clone(), filter, config))
    }

    /// Wrap an already opened raw cursor
    pub fn from_raw(
        raw: C,
        collection: CollectionHandle,
        filter: RecordFilter,
        config: TailConfig,
    ) -> Self {
        Self {
            raw,
            state: CursorState::Open,
            collection,
            filter,
            config,
        }
    }

    /// Fetch the next matching record
    ///
    /// Waits at the tail for up to the configured await timeout. Once the
    /// cursor is closed every call fails with [`CursorError::Closed`].
    pub async fn fetch_next(&mut self) -> Result<Fetch, CursorError> {
        if self.state == CursorState::Closed {
            return Err(CursorError::Closed);
        }

        match self.raw.next_record(self.config.await_timeout).await {
            Ok(RawFetch::Record(record)) => Ok(Fetch::Record(record)),
            Ok(RawFetch::TimedOut) => Ok(Fetch::Pending),
            Ok(RawFetch::Exhausted) => {
                self.state = CursorState::Closed;
                tracing::debug!(collection = %self.collection, "Tail cursor exhausted");
                Ok(Fetch::Closed)
            }
            Err(e) => {
                self.state = CursorState::Closed;
                Err(CursorError::Fetch(e))
            }
        }
    }

    /// Close the cursor
    pub fn close(&mut self) {
        self.state = CursorState::Closed;
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Check if the cursor is closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Collection being tailed
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Filter applied by the store
    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    /// Cursor configuration
    pub fn config(&self) -> &TailConfig {
        &self.config
    }
}
