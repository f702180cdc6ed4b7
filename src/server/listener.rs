//! Push server listener
//!
//! Handles the TCP accept loop and spawns one task per subscriber
//! connection. Each task attaches the connection to the tail service, writes
//! every labeled record as one JSON line and releases the subscriptions when
//! the peer goes away.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::service::TailService;
use crate::store::LogStore;
use crate::transport::{LabeledMessage, TransportError};

/// TCP push server
pub struct PushServer<S: LogStore> {
    config: ServerConfig,
    service: Arc<TailService<S>>,
    next_connection_id: AtomicU64,
    active_connections: Arc<AtomicUsize>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<S: LogStore> PushServer<S> {
    /// Create a new server over an initialised tail service
    pub fn new(config: ServerConfig, service: Arc<TailService<S>>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            service,
            next_connection_id: AtomicU64::new(1),
            active_connections: Arc::new(AtomicUsize::new(0)),
            connection_semaphore,
        }
    }

    /// Get a reference to the tail service
    pub fn service(&self) -> &Arc<TailService<S>> {
        &self.service
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(
            addr = %listener.local_addr()?,
            collection = %self.service.collection(),
            "Push server listening"
        );

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let service = Arc::clone(&self.service);
        let active = Arc::clone(&self.active_connections);
        let read_buffer_size = self.config.read_buffer_size;

        tokio::spawn(async move {
            active.fetch_add(1, Ordering::Relaxed);

            if let Err(e) =
                serve_connection(service, socket, connection_id, read_buffer_size, permit).await
            {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            active.fetch_sub(1, Ordering::Relaxed);
            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Pump labeled records to one socket until either side goes away
async fn serve_connection<S: LogStore>(
    service: Arc<TailService<S>>,
    socket: TcpStream,
    connection_id: u64,
    read_buffer_size: usize,
    _permit: Option<OwnedSemaphorePermit>,
) -> std::result::Result<(), TransportError> {
    let (connection, mut outbound) = service.connection_handle(connection_id);
    let subscriptions = service.connect(connection.clone()).await;

    let (mut reader, mut writer) = socket.into_split();
    let mut buf = vec![0u8; read_buffer_size.max(1)];

    let result = loop {
        tokio::select! {
            message = outbound.recv() => {
                let Some(message) = message else {
                    break Ok(());
                };
                if let Err(e) = write_message(&mut writer, &message).await {
                    break Err(e);
                }
            }
            // Inbound bytes carry nothing; only EOF matters
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e.into()),
            },
        }
    };

    connection.close();
    let summaries = subscriptions.join().await;
    let delivered: u64 = summaries.iter().map(|(_, summary)| summary.delivered).sum();

    tracing::debug!(
        connection_id = connection_id,
        subscriptions = summaries.len(),
        delivered = delivered,
        "Subscriptions released"
    );

    result
}

async fn write_message(
    writer: &mut OwnedWriteHalf,
    message: &LabeledMessage,
) -> std::result::Result<(), TransportError> {
    let frame = message.encode()?;
    writer.write_all(&frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, BufReader};

    use super::*;
    use crate::service::ServiceConfig;
    use crate::store::{CollectionOptions, MemoryStore};
    use crate::tail::TailConfig;

    async fn start_server() -> (Arc<MemoryStore>, Arc<PushServer<MemoryStore>>, SocketAddr) {
        let store = Arc::new(MemoryStore::new());
        let handle = store
            .create_collection("messages", CollectionOptions::capped(100))
            .unwrap();
        store
            .append(&handle, json!({"messagetype": "complex", "n": 0}))
            .unwrap();

        let config = ServiceConfig::default()
            .tail(TailConfig::default().await_timeout(Duration::from_millis(50)));
        let service = TailService::initialize(Arc::clone(&store), config)
            .await
            .unwrap();

        let server = Arc::new(PushServer::new(ServerConfig::default(), Arc::new(service)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = Arc::clone(&server);
        tokio::spawn(async move { serving.serve(listener).await });

        (store, server, addr)
    }

    async fn wait_for(server: &PushServer<MemoryStore>, active: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while server.active_connections() != active {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_streams_labeled_lines() {
        let (_store, _server, addr) = start_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();

        let mut frames = Vec::new();
        for _ in 0..2 {
            let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            frames.push(serde_json::from_str::<Value>(&line).unwrap());
        }

        assert_eq!(frames[0]["label"], json!("all"));
        assert_eq!(frames[1]["label"], json!("complex"));
        for frame in &frames {
            assert_eq!(frame["position"], json!(0));
            assert_eq!(frame["record"]["messagetype"], json!("complex"));
        }
    }

    #[tokio::test]
    async fn test_disconnect_releases_connection() {
        let (_store, server, addr) = start_server().await;

        let stream = TcpStream::connect(addr).await.unwrap();
        wait_for(&server, 1).await;

        drop(stream);
        wait_for(&server, 0).await;
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_collection("messages", CollectionOptions::capped(100))
            .unwrap();
        let service = TailService::initialize(Arc::clone(&store), ServiceConfig::default())
            .await
            .unwrap();

        let server = Arc::new(PushServer::new(
            ServerConfig::default().max_connections(1),
            Arc::new(service),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = Arc::clone(&server);
        tokio::spawn(async move { serving.serve(listener).await });

        let _first = TcpStream::connect(addr).await.unwrap();
        wait_for(&server, 1).await;

        // The second socket is accepted then dropped by the server
        let second = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(second).lines();
        let next = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert!(next.is_none());
        assert_eq!(server.active_connections(), 1);
    }
}
