//! Outbound delivery: one bounded queue and one writer task per connection.
//!
//! Handlers never write to a socket directly. They push encoded frames
//! into the target's queue with `try_send` and move on; the target's writer
//! task does the actual I/O. A slow or stalled peer fills only its own
//! queue, and once that is full further frames for it are dropped.
//!
//! Closing a peer means dropping its sender: the writer flushes whatever
//! is still queued, then closes the socket.

use std::collections::HashMap;
use std::sync::Arc;

use plaza_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};

/// An encoded frame, shared between every recipient of a broadcast.
pub(crate) type Frame = Arc<[u8]>;

/// Queue depth used when none is configured.
pub(crate) const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Every live connection's outbound queue.
pub(crate) struct PeerRegistry {
    peers: Mutex<HashMap<ConnectionId, mpsc::Sender<Frame>>>,
    capacity: usize,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl PeerRegistry {
    /// `capacity` is the per-connection queue depth; 0 is treated as 1.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Adds a connection and returns the receiving end of its queue, to
    /// be drained by [`write_loop`].
    pub(crate) async fn register(
        &self,
        connection: ConnectionId,
    ) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.peers.lock().await.insert(connection, tx);
        rx
    }

    pub(crate) async fn contains(&self, connection: ConnectionId) -> bool {
        self.peers.lock().await.contains_key(&connection)
    }

    pub(crate) async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Queues `frame` for one connection. Unknown, closed, or full peers
    /// are skipped.
    pub(crate) async fn send_to(&self, connection: ConnectionId, frame: Frame) {
        if let Some(tx) = self.peers.lock().await.get(&connection) {
            enqueue(connection, tx, frame);
        }
    }

    /// Queues `frame` for every connection, or every connection but
    /// `except`.
    pub(crate) async fn broadcast(
        &self,
        frame: Frame,
        except: Option<ConnectionId>,
    ) {
        let peers = self.peers.lock().await;
        for (connection, tx) in peers.iter() {
            if Some(*connection) == except {
                continue;
            }
            enqueue(*connection, tx, Arc::clone(&frame));
        }
    }

    /// Drops `connection` from the registry, optionally queueing one last
    /// frame. Its writer sends what is left and then closes the socket.
    ///
    /// Returns `false` if the connection was already gone. After this
    /// returns, no broadcast reaches the connection.
    pub(crate) async fn disconnect(
        &self,
        connection: ConnectionId,
        farewell: Option<Frame>,
    ) -> bool {
        let Some(tx) = self.peers.lock().await.remove(&connection) else {
            return false;
        };
        if let Some(frame) = farewell {
            enqueue(connection, &tx, frame);
        }
        true
    }

    /// Closes every connection. Used on shutdown.
    pub(crate) async fn disconnect_all(&self) -> usize {
        let peers = std::mem::take(&mut *self.peers.lock().await);
        peers.len()
    }
}

fn enqueue(connection: ConnectionId, tx: &mpsc::Sender<Frame>, frame: Frame) {
    match tx.try_send(frame) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(_)) => {
            tracing::debug!(%connection, "outbound queue full, frame dropped");
        }
    }
}

/// Drains one connection's queue into its socket.
///
/// When the registry drops the sender, the remaining frames are flushed
/// and the socket is closed. A failed send ends the loop early; the reader
/// side notices the dead socket and runs cleanup.
pub(crate) async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::Receiver<Frame>,
) {
    let connection = conn.id();
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%connection, error = %e, "send failed");
            return;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%connection, error = %e, "close failed");
    }
}
