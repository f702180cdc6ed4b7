//! Tail service
//!
//! `TailService` owns the process-wide store handle. It is initialised once:
//! the target collection is resolved and checked for capped-ness before the
//! multiplexer is armed, and it is never reinitialised afterwards. Transports
//! share it behind an `Arc` and call [`TailService::connect`] for every new
//! subscriber connection.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::StartupError;
use crate::mux::{ConnectionSubscriptions, SubscriptionMux, SubscriptionTemplate};
use crate::store::{CollectionHandle, LogStore};
use crate::tail::{is_capped, EligibilityError, TailConfig};
use crate::transport::{ConnectionHandle, LabeledMessage};

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capped collection to tail
    pub collection: String,

    /// One subscription per template for every connection
    pub templates: Vec<SubscriptionTemplate>,

    /// Tailable cursor settings
    pub tail: TailConfig,

    /// Outbound queue capacity per connection (messages)
    pub outbound_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            collection: "messages".to_string(),
            templates: SubscriptionTemplate::baseline(),
            tail: TailConfig::default(),
            outbound_capacity: 256,
        }
    }
}

impl ServiceConfig {
    /// Set the collection name
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }

    /// Replace the template set
    pub fn templates(mut self, templates: Vec<SubscriptionTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Set the tailable cursor settings
    pub fn tail(mut self, tail: TailConfig) -> Self {
        self.tail = tail;
        self
    }

    /// Set the outbound queue capacity per connection
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }
}

/// Top-level service owning the store handle
pub struct TailService<S: LogStore> {
    store: Arc<S>,
    collection: CollectionHandle,
    config: ServiceConfig,
    mux: SubscriptionMux<S>,
}

impl<S: LogStore> TailService<S> {
    /// Resolve and check the collection, then arm the multiplexer
    ///
    /// Fails with a [`StartupError`] when the store cannot answer or the
    /// collection is not capped; no connection may be served in that case.
    pub async fn initialize(store: Arc<S>, config: ServiceConfig) -> Result<Self, StartupError> {
        let collection = store
            .collection(&config.collection)
            .await
            .map_err(|source| EligibilityError::Query {
                collection: config.collection.clone(),
                source,
            })?;

        tracing::info!(collection = %collection, "Checking collection");

        let capped = match is_capped(&*store, &collection).await {
            Ok(capped) => capped,
            Err(e) => {
                tracing::error!(
                    collection = %collection,
                    error = %e,
                    "Error when detecting capped collection"
                );
                return Err(e.into());
            }
        };

        if !capped {
            tracing::error!(collection = %collection, "Collection is not capped");
            return Err(StartupError::NotCapped(collection.name().to_string()));
        }

        let mux = SubscriptionMux::new(
            Arc::clone(&store),
            collection.clone(),
            config.templates.clone(),
            config.tail.clone(),
        );

        tracing::info!(
            collection = %collection,
            templates = config.templates.len(),
            "Tail service ready"
        );

        Ok(Self {
            store,
            collection,
            config,
            mux,
        })
    }

    /// Start the subscriptions of a new connection
    pub async fn connect(&self, connection: ConnectionHandle) -> ConnectionSubscriptions {
        self.mux.attach(connection).await
    }

    /// Create a connection handle sized by the service configuration
    pub fn connection_handle(&self, id: u64) -> (ConnectionHandle, mpsc::Receiver<LabeledMessage>) {
        ConnectionHandle::new(id, self.config.outbound_capacity)
    }

    /// Shared store handle
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Tailed collection
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Service configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Subscription multiplexer
    pub fn multiplexer(&self) -> &SubscriptionMux<S> {
        &self.mux
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::{EXIT_ELIGIBILITY_FAILED, EXIT_NOT_CAPPED};
    use crate::store::{CollectionOptions, MemoryStore};

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();

        assert_eq!(config.collection, "messages");
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.outbound_capacity, 256);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ServiceConfig::default()
            .collection("events")
            .templates(vec![SubscriptionTemplate::all_updates()])
            .tail(TailConfig::default().await_timeout(Duration::from_millis(50)))
            .outbound_capacity(8);

        assert_eq!(config.collection, "events");
        assert_eq!(config.templates.len(), 1);
        assert_eq!(config.tail.await_timeout, Duration::from_millis(50));
        assert_eq!(config.outbound_capacity, 8);
    }

    #[tokio::test]
    async fn test_initialize_capped() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_collection("messages", CollectionOptions::capped(100))
            .unwrap();

        let service = TailService::initialize(store, ServiceConfig::default())
            .await
            .unwrap();
        assert_eq!(service.collection().name(), "messages");
        assert_eq!(service.multiplexer().templates().len(), 2);
    }

    #[tokio::test]
    async fn test_initialize_not_capped() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_collection("messages", CollectionOptions::uncapped())
            .unwrap();

        let err = TailService::initialize(store, ServiceConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err, StartupError::NotCapped("messages".into()));
        assert_eq!(err.exit_code(), EXIT_NOT_CAPPED);
    }

    #[tokio::test]
    async fn test_initialize_unreachable() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_collection("messages", CollectionOptions::capped(100))
            .unwrap();
        store.set_reachable(false);

        let err = TailService::initialize(store, ServiceConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StartupError::Eligibility(EligibilityError::Query { .. })
        ));
        assert_eq!(err.exit_code(), EXIT_ELIGIBILITY_FAILED);
    }

    #[tokio::test]
    async fn test_initialize_missing_options() {
        let store = Arc::new(MemoryStore::new());

        let err = TailService::initialize(store, ServiceConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            StartupError::Eligibility(EligibilityError::MissingOptions("messages".into()))
        );
        assert_eq!(err.exit_code(), EXIT_ELIGIBILITY_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_streams_records() {
        let store = Arc::new(MemoryStore::new());
        let handle = store
            .create_collection("messages", CollectionOptions::capped(100))
            .unwrap();
        store.append(&handle, json!({"messagetype": "complex"})).unwrap();

        let service = TailService::initialize(Arc::clone(&store), ServiceConfig::default())
            .await
            .unwrap();

        let (connection, mut rx) = service.connection_handle(1);
        let _subscriptions = service.connect(connection).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        // "all" is paced at 300ms, "complex" at 900ms
        assert_eq!(&*first.label, "all");
        assert_eq!(&*second.label, "complex");
        assert_eq!(first.record.position(), 0);
        assert_eq!(second.record.position(), 0);
    }
}
