//! Interval-throttled driver
//!
//! Drives a [`TailCursor`] one record at a time, waiting at least `interval`
//! between the handler finishing with one fetch and the start of the next. Each fetch
//! is one turn of a loop inside a single task, so stack usage stays flat no
//! matter how long a subscription lives.
//!
//! ```text
//!   ┌──────────────► sleep until next fetch ◄─── cancelled? ──► stop
//!   │                        │
//!   │                  fetch_next()        ◄─── cancelled? ──► stop
//!   │                        │
//!   │      Record ───► handler ──Stop──► stop
//!   │      Pending ──► handler (optional)
//!   │      Closed ───► handler ──► stop
//!   │      Fault ────► handler ──► stop
//!   │                        │
//!   └──── next = now + interval
//! ```

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::store::RawCursor;
use crate::tail::{Fetch, TailCursor};

use super::error::MisuseError;
use super::handler::{DriveEvent, Flow, RecordHandler};

/// Why a driver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cursor closed
    Closed,
    /// A fetch failed
    Faulted,
    /// The cancellation token fired
    Cancelled,
    /// The handler asked to stop
    HandlerStopped,
}

/// Summary reported when a driver stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSummary {
    /// Why driving stopped
    pub reason: StopReason,
    /// Records handed to the handler
    pub delivered: u64,
    /// Fetches issued against the cursor
    pub fetches: u64,
}

/// Result of waiting on a suspension point
enum Step<T> {
    Ready(T),
    Cancelled,
}

/// Throttled driver for a tail cursor
///
/// # Example
///
/// ```ignore
/// let handle = ThrottledDriver::new(cursor, Duration::from_millis(300))
///     .handler(|event| {
///         println!("{:?}", event);
///         Flow::Continue
///     })
///     .spawn()?;
/// ```
pub struct ThrottledDriver<C: RawCursor> {
    cursor: TailCursor<C>,
    interval: Duration,
    handler: Option<Box<dyn RecordHandler>>,
    notify_pending: bool,
    cancel: CancellationToken,
    name: String,
}

impl<C: RawCursor> ThrottledDriver<C> {
    /// Create a driver for `cursor` with a minimum inter-fetch delay
    pub fn new(cursor: TailCursor<C>, interval: Duration) -> Self {
        let notify_pending = cursor.config().notify_pending;
        let name = cursor.collection().to_string();

        Self {
            cursor,
            interval,
            handler: None,
            notify_pending,
            cancel: CancellationToken::new(),
            name,
        }
    }

    /// Set the per-record handler
    pub fn handler(mut self, handler: impl RecordHandler) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Report "none yet" fetches to the handler
    pub fn notify_pending(mut self, notify: bool) -> Self {
        self.notify_pending = notify;
        self
    }

    /// Stop driving when `token` is cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Name used in log events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Minimum delay between fetches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Validate and spawn the driving loop as a task
    pub fn spawn(self) -> Result<JoinHandle<DriveSummary>, MisuseError> {
        let driving = self.prepare()?;
        Ok(tokio::spawn(driving.run()))
    }

    /// Validate and drive on the current task until driving stops
    pub async fn run(self) -> Result<DriveSummary, MisuseError> {
        let driving = self.prepare()?;
        Ok(driving.run().await)
    }

    fn prepare(self) -> Result<Driving<C>, MisuseError> {
        let handler = self.handler.ok_or(MisuseError::MissingHandler)?;
        if self.cursor.is_closed() {
            return Err(MisuseError::CursorClosed);
        }

        Ok(Driving {
            cursor: self.cursor,
            interval: self.interval,
            handler,
            notify_pending: self.notify_pending,
            cancel: self.cancel,
            name: self.name,
        })
    }
}

/// A validated driver
struct Driving<C: RawCursor> {
    cursor: TailCursor<C>,
    interval: Duration,
    handler: Box<dyn RecordHandler>,
    notify_pending: bool,
    cancel: CancellationToken,
    name: String,
}

impl<C: RawCursor> Driving<C> {
    async fn run(mut self) -> DriveSummary {
        tracing::debug!(
            name = %self.name,
            interval_ms = self.interval.as_millis() as u64,
            filter = %self.cursor.filter(),
            "Driver started"
        );

        let mut delivered = 0u64;
        let mut fetches = 0u64;
        let mut next_fetch_at = Instant::now() + self.interval;

        let reason = loop {
            if let Step::Cancelled = self.wait_until(next_fetch_at).await {
                break StopReason::Cancelled;
            }

            let fetched = match self.fetch().await {
                Step::Ready(fetched) => fetched,
                Step::Cancelled => break StopReason::Cancelled,
            };
            fetches += 1;

            let (event, terminal) = match fetched {
                Ok(Fetch::Record(record)) => {
                    delivered += 1;
                    tracing::trace!(
                        name = %self.name,
                        position = record.position(),
                        "Record fetched"
                    );
                    (DriveEvent::Record(record), None)
                }
                Ok(Fetch::Pending) if self.notify_pending => (DriveEvent::Pending, None),
                Ok(Fetch::Pending) => {
                    next_fetch_at = Instant::now() + self.interval;
                    continue;
                }
                Ok(Fetch::Closed) => (DriveEvent::Closed, Some(StopReason::Closed)),
                Err(e) => {
                    tracing::warn!(name = %self.name, error = %e, "Tail fetch failed");
                    (DriveEvent::Fault(e), Some(StopReason::Faulted))
                }
            };

            let flow = match self.deliver(event).await {
                Step::Ready(flow) => flow,
                Step::Cancelled => break StopReason::Cancelled,
            };
            // Delivery may have waited on a full connection queue
            next_fetch_at = Instant::now() + self.interval;

            if let Some(reason) = terminal {
                break reason;
            }
            if flow == Flow::Stop {
                break StopReason::HandlerStopped;
            }
        };

        tracing::debug!(
            name = %self.name,
            reason = ?reason,
            delivered,
            fetches,
            "Driver stopped"
        );

        DriveSummary {
            reason,
            delivered,
            fetches,
        }
    }

    async fn wait_until(&mut self, deadline: Instant) -> Step<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Step::Cancelled,
            _ = tokio::time::sleep_until(deadline) => Step::Ready(()),
        }
    }

    async fn fetch(&mut self) -> Step<Result<Fetch, crate::tail::CursorError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Step::Cancelled,
            fetched = self.cursor.fetch_next() => Step::Ready(fetched),
        }
    }

    async fn deliver(&mut self, event: DriveEvent) -> Step<Flow> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Step::Cancelled,
            flow = self.handler.on_event(event) => Step::Ready(flow),
        }
    }
}
