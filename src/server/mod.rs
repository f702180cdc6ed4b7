//! TCP push server
//!
//! Reference transport: one JSON line per labeled record.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::PushServer;
