//! `PlazaServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → presence, with the
//! connection handler in between.

use std::sync::Arc;
use std::time::Instant;

use plaza_presence::PresenceStore;
use plaza_protocol::{Codec, JsonCodec, ServerEvent};
use plaza_transport::{ConnectionId, Transport, WebSocketTransport};
use serde::Serialize;
use tokio::sync::{Mutex, watch};

use crate::handler::handle_connection;
use crate::peers::{Frame, PeerRegistry};
use crate::{PlazaError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// `presence` is the single serialization point for every presence
/// operation. Broadcasts that follow a mutation are queued while that lock
/// is still held, so all peers see mutations in the order they were
/// applied. Lock order is always `presence` then `peers`.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) presence: Mutex<PresenceStore>,
    pub(crate) peers: PeerRegistry,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    started_at: Instant,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(config: ServerConfig, codec: C) -> Self {
        Self {
            presence: Mutex::new(PresenceStore::new(config.presence.clone())),
            peers: PeerRegistry::new(config.outbound_queue_capacity),
            codec,
            config,
            started_at: Instant::now(),
        }
    }

    /// Encodes an event once for any number of recipients. Encoding our
    /// own event types cannot realistically fail; if it does, the event is
    /// dropped and logged.
    pub(crate) fn encode(&self, event: &ServerEvent) -> Option<Frame> {
        match self.codec.encode(event) {
            Ok(bytes) => Some(Arc::from(bytes)),
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "encode failed");
                None
            }
        }
    }

    pub(crate) async fn send_to(
        &self,
        connection: ConnectionId,
        event: &ServerEvent,
    ) {
        if let Some(frame) = self.encode(event) {
            self.peers.send_to(connection, frame).await;
        }
    }

    /// Sends `event` to every connection except `except` (if given).
    pub(crate) async fn broadcast(
        &self,
        event: &ServerEvent,
        except: Option<ConnectionId>,
    ) {
        if let Some(frame) = self.encode(event) {
            self.peers.broadcast(frame, except).await;
        }
    }

    pub(crate) async fn health(&self) -> HealthReport {
        let players = self.presence.lock().await.count();
        HealthReport {
            players,
            connections: self.peers.len().await,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Liveness snapshot: what a health endpoint or periodic log reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Joined players.
    pub players: usize,
    /// Open connections, joined or not.
    pub connections: usize,
    pub uptime_secs: u64,
}

/// Reads [`HealthReport`]s from a running server. Cheap to clone.
pub struct HealthHandle<C: Codec = JsonCodec> {
    state: Arc<ServerState<C>>,
}

impl<C: Codec> HealthHandle<C> {
    pub async fn report(&self) -> HealthReport {
        self.state.health().await
    }
}

impl<C: Codec> Clone for HealthHandle<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

/// Stops a running server. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks the server to stop accepting and close every connection.
    /// Calling it more than once is harmless.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Builder for configuring and starting a Plaza server.
///
/// # Example
///
/// ```rust,ignore
/// let server = PlazaServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PlazaServerBuilder {
    config: ServerConfig,
}

impl PlazaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and builds the server with [`JsonCodec`].
    pub async fn build(self) -> Result<PlazaServer<JsonCodec>, PlazaError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(PlazaServer {
            transport,
            state: Arc::new(ServerState::new(self.config, JsonCodec)),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Plaza server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlazaServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl PlazaServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PlazaServerBuilder {
        PlazaServerBuilder::new()
    }
}

impl<C: Codec> PlazaServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns a handle that stops [`run()`](Self::run).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Current player count, connection count, and uptime.
    pub async fn health(&self) -> HealthReport {
        self.state.health().await
    }

    /// Returns a handle that keeps reporting health after
    /// [`run()`](Self::run) has taken the server.
    pub fn health_handle(&self) -> HealthHandle<C> {
        HealthHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop until the shutdown handle fires.
    ///
    /// Each accepted connection gets its own handler task. On shutdown the
    /// listener stops accepting and every open connection is closed; their
    /// handlers then remove their players as on any other disconnect.
    pub async fn run(mut self) -> Result<(), PlazaError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Plaza server running");

        let health_task = self.state.config.health_log_interval().map(|every| {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let report = state.health().await;
                    tracing::info!(
                        players = report.players,
                        connections = report.connections,
                        uptime_secs = report.uptime_secs,
                        "health"
                    );
                }
            })
        });

        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        if let Some(task) = health_task {
            task.abort();
        }
        self.transport.shutdown().await?;
        let closed = self.state.peers.disconnect_all().await;
        tracing::info!(closed, "Plaza server stopped");
        Ok(())
    }
}
