//! # tailpush
//!
//! Push records appended to a capped log to live subscribers.
//!
//! Every subscriber connection gets one tail stream per subscription
//! template. Each stream reads the log in natural order through a filtered
//! tailable cursor, is paced by its own fixed interval and is delivered
//! under its template's label.
//!
//! ## Architecture
//!
//! ```text
//!  store ──► tail::is_capped        startup gate (exit 1 / exit 2)
//!    │
//!    └────► tail::TailCursor         natural order, waits at the tail
//!               │
//!               ▼
//!           driver::ThrottledDriver  one fetch per interval, one task
//!               │
//!               ▼
//!           mux::SubscriptionMux     label routing per connection
//!               │
//!               ▼
//!           transport::ConnectionHandle ──► server::PushServer (NDJSON/TCP)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tailpush::store::{CollectionOptions, MemoryStore};
//! use tailpush::{PushServer, ServerConfig, ServiceConfig, TailService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.create_collection("messages", CollectionOptions::capped(1000))?;
//!
//!     let service = TailService::initialize(store, ServiceConfig::default()).await?;
//!     let server = PushServer::new(ServerConfig::default(), Arc::new(service));
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod mux;
pub mod server;
pub mod service;
pub mod store;
pub mod tail;
pub mod transport;

pub use error::{Error, Result, StartupError};
pub use server::{PushServer, ServerConfig};
pub use service::{ServiceConfig, TailService};
