//! Subscriber transport collaborator
//!
//! The core only needs "deliver a labeled message on a connection". The
//! [`ConnectionHandle`] provides that over a bounded queue; a transport such
//! as [`PushServer`](crate::server::PushServer) drains the queue to the wire.

pub mod connection;
pub mod error;

pub use connection::{ConnectionHandle, LabeledMessage};
pub use error::TransportError;
