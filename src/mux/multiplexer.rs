//! Subscription channel multiplexer
//!
//! For each new connection, opens one tail cursor and one throttled driver
//! per template and routes every record to the connection under the
//! template's label.
//!
//! ```text
//!                      SubscriptionMux
//!                 (Arc<store>, templates)
//!                            │ attach(connection)
//!            ┌───────────────┼───────────────┐
//!            ▼               ▼               ▼
//!      TailCursor+Driver TailCursor+Driver  ...
//!       "all" / 300ms    "complex" / 900ms
//!            │               │
//!            └──► LabelRouter ──► ConnectionHandle::deliver() ──► transport
//! ```
//!
//! All drivers of a connection share one cancellation token. It is a child
//! of the connection's closed token and is cancelled when the returned
//! [`ConnectionSubscriptions`] is cancelled or dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::driver::{DriveEvent, DriveSummary, Flow, HandlerFuture, RecordHandler, ThrottledDriver};
use crate::store::{CollectionHandle, LogStore};
use crate::tail::{TailConfig, TailCursor};
use crate::transport::ConnectionHandle;

use super::template::SubscriptionTemplate;

/// Routes driver events to a connection under one label
struct LabelRouter {
    label: Arc<str>,
    connection: ConnectionHandle,
}

impl RecordHandler for LabelRouter {
    fn on_event(&mut self, event: DriveEvent) -> HandlerFuture<'_> {
        Box::pin(async move {
            match event {
                DriveEvent::Record(record) => {
                    match self.connection.deliver(&self.label, record).await {
                        Ok(()) => Flow::Continue,
                        Err(e) => {
                            tracing::debug!(
                                connection_id = self.connection.id(),
                                label = %self.label,
                                error = %e,
                                "Delivery stopped"
                            );
                            Flow::Stop
                        }
                    }
                }
                DriveEvent::Pending => Flow::Continue,
                DriveEvent::Closed => {
                    tracing::debug!(
                        connection_id = self.connection.id(),
                        label = %self.label,
                        "Tail closed"
                    );
                    Flow::Stop
                }
                DriveEvent::Fault(e) => {
                    tracing::warn!(
                        connection_id = self.connection.id(),
                        label = %self.label,
                        error = %e,
                        "Subscription faulted"
                    );
                    Flow::Stop
                }
            }
        })
    }
}

/// Opens per-connection subscriptions from a fixed template set
pub struct SubscriptionMux<S: LogStore> {
    store: Arc<S>,
    collection: CollectionHandle,
    templates: Arc<[SubscriptionTemplate]>,
    tail: TailConfig,
}

impl<S: LogStore> SubscriptionMux<S> {
    /// Create a multiplexer over a shared store handle
    pub fn new(
        store: Arc<S>,
        collection: CollectionHandle,
        templates: Vec<SubscriptionTemplate>,
        tail: TailConfig,
    ) -> Self {
        Self {
            store,
            collection,
            templates: templates.into(),
            tail,
        }
    }

    /// Template set
    pub fn templates(&self) -> &[SubscriptionTemplate] {
        &self.templates
    }

    /// Collection being tailed
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Start one subscription per template for `connection`
    ///
    /// A template whose cursor cannot be opened is logged and skipped; the
    /// remaining templates are still started.
    pub async fn attach(&self, connection: ConnectionHandle) -> ConnectionSubscriptions {
        let cancel = connection.closed_token().child_token();
        let mut drivers = Vec::with_capacity(self.templates.len());
        let mut skipped = Vec::new();

        for template in self.templates.iter() {
            match self.start(template, &connection, &cancel).await {
                Ok(handle) => drivers.push((Arc::clone(&template.label), handle)),
                Err(e) => {
                    tracing::warn!(
                        connection_id = connection.id(),
                        label = %template.label,
                        error = %e,
                        "Subscription not started"
                    );
                    skipped.push(Arc::clone(&template.label));
                }
            }
        }

        tracing::debug!(
            connection_id = connection.id(),
            subscriptions = drivers.len(),
            skipped = skipped.len(),
            "Connection attached"
        );

        ConnectionSubscriptions {
            connection_id: connection.id(),
            cancel,
            drivers,
            skipped,
        }
    }

    async fn start(
        &self,
        template: &SubscriptionTemplate,
        connection: &ConnectionHandle,
        cancel: &CancellationToken,
    ) -> crate::error::Result<JoinHandle<DriveSummary>> {
        let cursor = TailCursor::open(
            &*self.store,
            &self.collection,
            template.filter.clone(),
            self.tail.clone(),
        )
        .await?;

        let router = LabelRouter {
            label: Arc::clone(&template.label),
            connection: connection.clone(),
        };

        let handle = ThrottledDriver::new(cursor, template.interval)
            .handler(router)
            .cancellation(cancel.clone())
            .name(format!("{}/{}", connection.id(), template.label))
            .spawn()?;

        Ok(handle)
    }
}

/// Running subscriptions of one connection
///
/// Dropping this value cancels every driver it owns.
pub struct ConnectionSubscriptions {
    connection_id: u64,
    cancel: CancellationToken,
    drivers: Vec<(Arc<str>, JoinHandle<DriveSummary>)>,
    skipped: Vec<Arc<str>>,
}

impl ConnectionSubscriptions {
    /// Connection these subscriptions belong to
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Labels of the running subscriptions
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(|(label, _)| &**label)
    }

    /// Labels of templates that could not be started
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.skipped.iter().map(|label| &**label)
    }

    /// Number of running subscriptions
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Check if no subscription was started
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Cancel every driver
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared by every driver of this connection
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for every driver to stop and collect their summaries
    pub async fn join(mut self) -> Vec<(Arc<str>, DriveSummary)> {
        let drivers = std::mem::take(&mut self.drivers);
        let mut summaries = Vec::with_capacity(drivers.len());

        for (label, handle) in drivers {
            match handle.await {
                Ok(summary) => summaries.push((label, summary)),
                Err(e) => {
                    tracing::error!(
                        connection_id = self.connection_id,
                        label = %label,
                        error = %e,
                        "Driver task failed"
                    );
                }
            }
        }

        summaries
    }
}

impl Drop for ConnectionSubscriptions {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
