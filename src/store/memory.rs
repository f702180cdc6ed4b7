//! In-memory log store
//!
//! Named collections held in process memory. Capped collections evict their
//! oldest records once `max_records` or `max_bytes` is exceeded and support
//! tailable cursors; uncapped collections only report their options.
//!
//! Appends wake waiting cursors through a `watch` channel per collection.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use super::error::StoreError;
use super::filter::RecordFilter;
use super::record::{into_document, CollectionHandle, Document, Record};
use super::{CollectionOptions, LogStore, RawCursor, RawFetch};

/// Change notification published on every append and on shutdown
#[derive(Debug, Clone, Copy, Default)]
struct TailSignal {
    closed: bool,
}

/// Result of scanning the log from a position
enum Scan {
    /// First matching record at or after the position
    Found(Record),
    /// The position was evicted; resume from the oldest retained record
    Lost { oldest: u64 },
    /// No match up to the end; resume from here
    Caught(u64),
}

/// Records of one collection, oldest first
#[derive(Debug, Default)]
struct CappedLog {
    /// Records with their encoded size
    records: VecDeque<(Record, usize)>,
    /// Position assigned to the next append
    next_position: u64,
    /// Sum of encoded record sizes
    total_bytes: usize,
}

impl CappedLog {
    fn oldest_position(&self) -> u64 {
        self.records
            .front()
            .map(|(record, _)| record.position())
            .unwrap_or(self.next_position)
    }

    fn push(&mut self, document: Document, options: &CollectionOptions) -> Record {
        let size = serde_json::to_vec(&document).map(|v| v.len()).unwrap_or(0);
        let record = Record::new(self.next_position, document);
        self.next_position += 1;
        self.total_bytes += size;
        self.records.push_back((record.clone(), size));

        if options.capped {
            self.evict(options);
        }

        record
    }

    /// Drop the oldest records until within capacity; the newest always stays
    fn evict(&mut self, options: &CollectionOptions) {
        while self.records.len() > 1 {
            let over_count = options
                .max_records
                .is_some_and(|max| self.records.len() > max);
            let over_bytes = options.max_bytes.is_some_and(|max| self.total_bytes > max);

            if !over_count && !over_bytes {
                break;
            }

            if let Some((_, size)) = self.records.pop_front() {
                self.total_bytes -= size;
            }
        }
    }

    fn scan(&self, from: u64, filter: &RecordFilter) -> Scan {
        let oldest = self.oldest_position();
        if from < oldest {
            return Scan::Lost { oldest };
        }

        let start = (from - oldest) as usize;
        if start < self.records.len() {
            for (record, _) in self.records.range(start..) {
                if filter.matches(record.document()) {
                    return Scan::Found(record.clone());
                }
            }
        }

        Scan::Caught(self.next_position.max(from))
    }
}

/// A single named collection
struct Collection {
    name: String,
    options: CollectionOptions,
    log: Mutex<CappedLog>,
    tail: watch::Sender<TailSignal>,
}

impl Collection {
    fn new(name: String, options: CollectionOptions) -> Self {
        let (tail, _) = watch::channel(TailSignal::default());
        Self {
            name,
            options,
            log: Mutex::new(CappedLog::default()),
            tail,
        }
    }
}

/// In-memory store with capped collections
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    reachable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a collection
    pub fn create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<CollectionHandle, StoreError> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        collections.insert(
            name.to_string(),
            Arc::new(Collection::new(name.to_string(), options)),
        );

        tracing::debug!(
            collection = name,
            capped = options.capped,
            max_records = ?options.max_records,
            max_bytes = ?options.max_bytes,
            "Collection created"
        );

        Ok(CollectionHandle::new(name))
    }

    /// Append a document, returning the stored record
    pub fn append(&self, collection: &CollectionHandle, value: Value) -> Result<Record, StoreError> {
        self.check_reachable()?;

        let entry = self.lookup(collection)?;
        let document = into_document(value).ok_or_else(|| {
            StoreError::InvalidDocument(format!("{} expects an object", entry.name))
        })?;

        let record = entry.log.lock().push(document, &entry.options);

        // Wake every waiting cursor
        entry.tail.send_modify(|_| {});

        tracing::trace!(
            collection = %collection,
            position = record.position(),
            "Record appended"
        );

        Ok(record)
    }

    /// Number of records currently retained
    pub fn record_count(&self, collection: &CollectionHandle) -> Option<usize> {
        self.collections
            .read()
            .get(collection.name())
            .map(|entry| entry.log.lock().records.len())
    }

    /// Simulate losing (or regaining) the store connection
    ///
    /// While unreachable every store operation fails with
    /// [`StoreError::Unavailable`], including fetches on open cursors.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// End iteration on every open cursor
    ///
    /// Waiting and future fetches report [`RawFetch::Exhausted`].
    pub fn shutdown(&self) {
        for entry in self.collections.read().values() {
            entry.tail.send_modify(|signal| signal.closed = true);
        }
        tracing::info!("Memory store shut down");
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.reachable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store connection lost".into()))
        }
    }

    fn lookup(&self, collection: &CollectionHandle) -> Result<Arc<Collection>, StoreError> {
        self.collections
            .read()
            .get(collection.name())
            .cloned()
            .ok_or_else(|| StoreError::CollectionNotFound(collection.name().to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore for MemoryStore {
    type Cursor = MemoryCursor;

    async fn collection(&self, name: &str) -> Result<CollectionHandle, StoreError> {
        self.check_reachable()?;
        Ok(CollectionHandle::new(name))
    }

    async fn collection_options(
        &self,
        collection: &CollectionHandle,
    ) -> Result<Option<CollectionOptions>, StoreError> {
        self.check_reachable()?;
        Ok(self
            .collections
            .read()
            .get(collection.name())
            .map(|entry| entry.options))
    }

    async fn open_tailable(
        &self,
        collection: &CollectionHandle,
        filter: &RecordFilter,
    ) -> Result<MemoryCursor, StoreError> {
        self.check_reachable()?;

        let entry = self.lookup(collection)?;
        if !entry.options.capped {
            return Err(StoreError::NotTailable(collection.name().to_string()));
        }

        let position = entry.log.lock().oldest_position();
        let tail = entry.tail.subscribe();

        Ok(MemoryCursor {
            collection: entry,
            filter: filter.clone(),
            position,
            tail,
            reachable: Arc::clone(&self.reachable),
        })
    }
}

/// Tailable cursor over a [`MemoryStore`] collection
pub struct MemoryCursor {
    collection: Arc<Collection>,
    filter: RecordFilter,
    /// Next position to examine
    position: u64,
    tail: watch::Receiver<TailSignal>,
    reachable: Arc<AtomicBool>,
}

impl MemoryCursor {
    /// Next position this cursor will examine
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl RawCursor for MemoryCursor {
    async fn next_record(&mut self, await_timeout: Duration) -> Result<RawFetch, StoreError> {
        let deadline = Instant::now() + await_timeout;

        loop {
            if !self.reachable.load(Ordering::Acquire) {
                return Err(StoreError::Unavailable("store connection lost".into()));
            }

            // Mark the current signal seen before scanning so an append that
            // lands after the scan still wakes the wait below.
            if self.tail.borrow_and_update().closed {
                return Ok(RawFetch::Exhausted);
            }

            let scan = self.collection.log.lock().scan(self.position, &self.filter);
            match scan {
                Scan::Found(record) => {
                    self.position = record.position() + 1;
                    return Ok(RawFetch::Record(record));
                }
                Scan::Lost { oldest } => {
                    tracing::warn!(
                        collection = %self.collection.name,
                        position = self.position,
                        oldest = oldest,
                        skipped = oldest - self.position,
                        "Cursor fell behind eviction, skipping ahead"
                    );
                    self.position = oldest;
                    continue;
                }
                Scan::Caught(next) => self.position = next,
            }

            match tokio::time::timeout_at(deadline, self.tail.changed()).await {
                Err(_) => return Ok(RawFetch::TimedOut),
                Ok(Err(_)) => return Ok(RawFetch::Exhausted),
                Ok(Ok(())) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    fn record_of(fetch: RawFetch) -> Record {
        match fetch {
            RawFetch::Record(record) => record,
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_collection_twice() {
        let store = MemoryStore::new();
        store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        let result = store.create_collection("messages", CollectionOptions::uncapped());
        assert!(matches!(result, Err(StoreError::CollectionExists(_))));
    }

    #[tokio::test]
    async fn test_collection_options() {
        let store = MemoryStore::new();
        let capped = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();
        let plain = store
            .create_collection("plain", CollectionOptions::uncapped())
            .unwrap();
        let missing = store.collection("missing").await.unwrap();

        let options = store.collection_options(&capped).await.unwrap().unwrap();
        assert!(options.capped);
        assert_eq!(options.max_records, Some(10));

        let options = store.collection_options(&plain).await.unwrap().unwrap();
        assert!(!options.capped);

        assert_eq!(store.collection_options(&missing).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        store.set_reachable(false);
        assert!(matches!(
            store.collection_options(&handle).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.collection("messages").await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_reachable(true);
        assert!(store.collection_options(&handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_append_rejects_non_object() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        let result = store.append(&handle, json!(["not", "a", "document"]));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_eviction_by_count() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(3))
            .unwrap();

        for n in 0..5 {
            store.append(&handle, json!({ "n": n })).unwrap();
        }

        assert_eq!(store.record_count(&handle), Some(3));

        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();
        let first = record_of(cursor.next_record(WAIT).await.unwrap());
        assert_eq!(first.position(), 2);
        assert_eq!(first.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_eviction_by_bytes_keeps_newest() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection(
                "messages",
                CollectionOptions::capped(100).max_bytes(1),
            )
            .unwrap();

        store.append(&handle, json!({"n": 1})).unwrap();
        store.append(&handle, json!({"n": 2})).unwrap();

        assert_eq!(store.record_count(&handle), Some(1));
    }

    #[tokio::test]
    async fn test_uncapped_not_tailable() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("plain", CollectionOptions::uncapped())
            .unwrap();

        for _ in 0..5 {
            store.append(&handle, json!({})).unwrap();
        }
        assert_eq!(store.record_count(&handle), Some(5));

        let result = store.open_tailable(&handle, &RecordFilter::new()).await;
        assert!(matches!(result, Err(StoreError::NotTailable(_))));
    }

    #[tokio::test]
    async fn test_open_missing_collection() {
        let store = MemoryStore::new();
        let handle = store.collection("missing").await.unwrap();

        let result = store.open_tailable(&handle, &RecordFilter::new()).await;
        assert!(matches!(result, Err(StoreError::CollectionNotFound(_))));
    }

    #[tokio::test]
    async fn test_cursor_reads_in_natural_order_with_filter() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        store.append(&handle, json!({"messagetype": "basic", "n": 0})).unwrap();
        store.append(&handle, json!({"messagetype": "complex", "n": 1})).unwrap();
        store.append(&handle, json!({"messagetype": "basic", "n": 2})).unwrap();
        store.append(&handle, json!({"messagetype": "complex", "n": 3})).unwrap();

        let filter = RecordFilter::new().field_eq("messagetype", "complex");
        let mut cursor = store.open_tailable(&handle, &filter).await.unwrap();

        let first = record_of(cursor.next_record(WAIT).await.unwrap());
        let second = record_of(cursor.next_record(WAIT).await.unwrap());
        assert_eq!(first.get("n"), Some(&json!(1)));
        assert_eq!(second.get("n"), Some(&json!(3)));
        assert_eq!(cursor.position(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_log_times_out() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();

        let started = Instant::now();
        let fetch = cursor.next_record(Duration::from_millis(250)).await.unwrap();
        assert_eq!(fetch, RawFetch::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_wakes_on_append() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();

        let mut fetch = tokio_test::task::spawn(cursor.next_record(WAIT));
        assert_pending!(fetch.poll());

        store.append(&handle, json!({"n": 1})).unwrap();
        assert!(fetch.is_woken());

        let record = record_of(assert_ready!(fetch.poll()).unwrap());
        assert_eq!(record.position(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_matching_append_keeps_waiting() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();

        let filter = RecordFilter::new().field_eq("messagetype", "complex");
        let mut cursor = store.open_tailable(&handle, &filter).await.unwrap();

        let mut fetch = tokio_test::task::spawn(cursor.next_record(WAIT));
        assert_pending!(fetch.poll());

        store.append(&handle, json!({"messagetype": "basic"})).unwrap();
        assert_pending!(fetch.poll());

        store.append(&handle, json!({"messagetype": "complex"})).unwrap();
        let record = record_of(assert_ready!(fetch.poll()).unwrap());
        assert_eq!(record.position(), 1);
    }

    #[tokio::test]
    async fn test_lagging_reader_skips_evicted_records() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(2))
            .unwrap();

        store.append(&handle, json!({"n": 0})).unwrap();
        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();

        for n in 1..4 {
            store.append(&handle, json!({ "n": n })).unwrap();
        }

        // Positions 0 and 1 were evicted before the first read
        let record = record_of(cursor.next_record(WAIT).await.unwrap());
        assert_eq!(record.position(), 2);
        let record = record_of(cursor.next_record(WAIT).await.unwrap());
        assert_eq!(record.position(), 3);
        assert_eq!(cursor.position(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_opened_on_full_log_survives_eviction() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(3))
            .unwrap();
        for n in 0..3 {
            store.append(&handle, json!({ "n": n })).unwrap();
        }

        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();
        store.append(&handle, json!({"n": 3})).unwrap();

        let positions = [
            record_of(cursor.next_record(WAIT).await.unwrap()).position(),
            record_of(cursor.next_record(WAIT).await.unwrap()).position(),
            record_of(cursor.next_record(WAIT).await.unwrap()).position(),
        ];
        assert_eq!(positions, [1, 2, 3]);
        assert_eq!(cursor.next_record(WAIT).await, Ok(RawFetch::TimedOut));
    }

    #[tokio::test]
    async fn test_shutdown_exhausts_cursor() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();
        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();

        let mut fetch = tokio_test::task::spawn(cursor.next_record(WAIT));
        assert_pending!(fetch.poll());

        store.shutdown();
        assert_eq!(assert_ready!(fetch.poll()), Ok(RawFetch::Exhausted));
    }

    #[tokio::test]
    async fn test_open_cursor_fails_when_unreachable() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("messages", CollectionOptions::capped(10))
            .unwrap();
        let mut cursor = store
            .open_tailable(&handle, &RecordFilter::new())
            .await
            .unwrap();

        store.set_reachable(false);
        assert!(matches!(
            cursor.next_record(WAIT).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
