//! Connection handle
//!
//! A `ConnectionHandle` is what the multiplexer sees of a subscriber
//! connection: an id, a bounded outbound queue of labeled messages and a
//! closed signal. The transport owns the receiving end of the queue and
//! writes messages to the wire in whatever framing it uses.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::store::{Document, Record};

use super::error::TransportError;

/// A record routed to a connection under a channel label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMessage {
    /// Channel label (e.g. "all", "complex")
    pub label: Arc<str>,
    /// Record payload
    pub record: Record,
}

/// Wire shape of a labeled message
#[derive(Serialize)]
struct Frame<'a> {
    label: &'a str,
    position: u64,
    record: &'a Document,
}

impl LabeledMessage {
    /// Create a labeled message
    pub fn new(label: Arc<str>, record: Record) -> Self {
        Self { label, record }
    }

    /// Encode as one newline-terminated JSON object
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        let frame = Frame {
            label: &self.label,
            position: self.record.position(),
            record: self.record.document(),
        };

        let mut buf = BytesMut::with_capacity(128).writer();
        serde_json::to_writer(&mut buf, &frame)?;

        let mut buf = buf.into_inner();
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }
}

/// Multiplexer-facing handle of a subscriber connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    tx: mpsc::Sender<LabeledMessage>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle with an outbound queue of `capacity` messages
    ///
    /// Returns the handle and the receiving end for the transport.
    pub fn new(id: u64, capacity: usize) -> (Self, mpsc::Receiver<LabeledMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            tx,
            closed: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Connection id
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a labeled record for delivery
    ///
    /// Waits while the outbound queue is full. Fails once the connection is
    /// closed or the transport dropped the receiving end.
    pub async fn deliver(&self, label: &Arc<str>, record: Record) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let message = LabeledMessage::new(Arc::clone(label), record);
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportError::Closed),
            sent = self.tx.send(message) => sent.map_err(|_| TransportError::Closed),
        }
    }

    /// Mark the connection closed
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Check if the connection is closed
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Token cancelled when the connection closes
    pub fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }
}
