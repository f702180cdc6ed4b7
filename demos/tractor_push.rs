//! Tail push demo
//!
//! Run with: cargo run --example tractor_push
//!
//! Environment:
//!   PORT                 listen port (default 2000)
//!   TAILPUSH_COLLECTION  capped collection to tail (default "messages")
//!   TAILPUSH_CAPPED      set to 0 to create a plain collection and watch
//!                        startup refuse it (exit status 2)
//!
//! A synthetic producer appends a `basic` message every 200ms and a
//! `complex` one every fifth tick. Watch the stream with:
//!
//!   nc localhost 2000
//!
//! Every line is `{"label": ..., "position": ..., "record": {...}}`. The
//! `all` subscription is paced at 300ms and the `complex` one at 900ms.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::EnvFilter;

use tailpush::server::config::DEFAULT_PORT;
use tailpush::store::{CollectionHandle, CollectionOptions, MemoryStore};
use tailpush::{PushServer, ServerConfig, ServiceConfig, TailService};

const RETAINED_RECORDS: usize = 1000;
const PRODUCE_EVERY: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let collection =
        std::env::var("TAILPUSH_COLLECTION").unwrap_or_else(|_| "messages".to_string());
    let capped = std::env::var("TAILPUSH_CAPPED").map_or(true, |value| value != "0");

    let options = if capped {
        CollectionOptions::capped(RETAINED_RECORDS)
    } else {
        CollectionOptions::uncapped()
    };

    let store = Arc::new(MemoryStore::new());
    let handle = store.create_collection(&collection, options)?;

    let service = match TailService::initialize(
        Arc::clone(&store),
        ServiceConfig::default().collection(collection),
    )
    .await
    {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to serve");
            std::process::exit(e.exit_code());
        }
    };

    tokio::spawn(produce(Arc::clone(&store), handle));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = PushServer::new(ServerConfig::with_addr(addr), Arc::new(service));

    println!("Tail push server listening on {}", addr);
    println!("Press Ctrl+C to stop");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    store.shutdown();
    Ok(())
}

/// Append synthetic messages until the store refuses them
async fn produce(store: Arc<MemoryStore>, collection: CollectionHandle) {
    let mut ticker = tokio::time::interval(PRODUCE_EVERY);

    for tick in 0u64.. {
        ticker.tick().await;

        let document = if tick % 5 == 4 {
            json!({
                "messagetype": "complex",
                "tick": tick,
                "payload": {"engine_rpm": 1800 + tick % 400, "gear": tick % 6},
            })
        } else {
            json!({"messagetype": "basic", "tick": tick})
        };

        if let Err(e) = store.append(&collection, document) {
            tracing::warn!(error = %e, "Producer stopped");
            return;
        }
    }
}
