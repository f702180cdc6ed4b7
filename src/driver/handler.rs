//! Driver callbacks
//!
//! A driver reports every fetch outcome to a [`RecordHandler`]. Plain
//! closures returning a [`Flow`] are handlers; types that need to await
//! (e.g. delivery onto a bounded connection queue) implement the trait
//! directly.

use std::future::Future;
use std::pin::Pin;

use crate::store::Record;
use crate::tail::CursorError;

/// Event passed to a driver's handler
#[derive(Debug, Clone, PartialEq)]
pub enum DriveEvent {
    /// A record was fetched
    Record(Record),
    /// No record was available (only when pending notification is enabled)
    Pending,
    /// The cursor closed; driving stops after this event
    Closed,
    /// A fetch failed; driving stops after this event
    Fault(CursorError),
}

/// Handler's decision after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep driving
    Continue,
    /// Stop driving
    Stop,
}

/// Boxed future returned by [`RecordHandler::on_event`]
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Flow> + Send + 'a>>;

/// Per-record callback of a driver
pub trait RecordHandler: Send + 'static {
    /// Handle one event
    fn on_event(&mut self, event: DriveEvent) -> HandlerFuture<'_>;
}

impl<F> RecordHandler for F
where
    F: FnMut(DriveEvent) -> Flow + Send + 'static,
{
    fn on_event(&mut self, event: DriveEvent) -> HandlerFuture<'_> {
        let flow = self(event);
        Box::pin(std::future::ready(flow))
    }
}
