//! Per-connection handler: decode events, call the presence store, emit
//! the resulting events.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`] plus a writer task draining its outbound queue.
//! The flow for one connection is:
//!   1. Register an outbound queue → the connection starts receiving
//!      broadcasts, joined or not
//!   2. Loop: receive frame → decode → dispatch join / move / quest / ping
//!   3. On exit (for any reason) the drop guard removes the player and
//!      announces the departure
//!
//! Events from one connection are handled strictly in arrival order.

use std::sync::Arc;

use plaza_protocol::{
    ClientEvent, Codec, InboundFrame, JoinPayload, MovePayload, PlayerMoved,
    ProtocolError, QuestCompleted, QuestPayload, ServerEvent,
};
use plaza_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::PlazaError;
use crate::peers::write_loop;
use crate::server::ServerState;

/// Reason sent with `kicked` to a connection that lost its team.
const KICKED_REASON: &str = "another connection joined with your team";

/// Drop guard that removes a connection's player when its handler exits.
///
/// Runs on clean close, explicit `disconnect`, idle timeout, recv error,
/// and panic alike. `Drop` is synchronous, so the async cleanup is spawned
/// as its own task and always runs to completion.
struct PresenceGuard<C: Codec> {
    connection: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for PresenceGuard<C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            leave(&state, connection).await;
        });
    }
}

/// Handles a single connection from accept to close.
///
/// # Errors
/// A failed socket read ends the connection with
/// [`PlazaError::Transport`]; cleanup runs as for any other exit.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PlazaError> {
    let conn = Arc::new(conn);
    let connection = conn.id();
    tracing::debug!(%connection, "handling new connection");

    let outbound = state.peers.register(connection).await;
    tokio::spawn(write_loop(Arc::clone(&conn), outbound));
    let _guard = PresenceGuard {
        connection,
        state: Arc::clone(&state),
    };

    let idle_timeout = state.config.idle_timeout();

    loop {
        let data = match tokio::time::timeout(idle_timeout, conn.recv()).await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%connection, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::info!(%connection, "connection idle, closing");
                break;
            }
        };

        // An evicted connection is already out of the registry. Anything
        // it still sends is dropped, and the handler winds down.
        if !state.peers.contains(connection).await {
            tracing::debug!(%connection, "connection evicted, stopping");
            break;
        }

        let event = match decode_event(&state.codec, &data) {
            Ok(event) => event,
            Err(e) => {
                reject(&state, connection, e).await;
                continue;
            }
        };

        tracing::trace!(%connection, event = event.name(), "event received");

        match event {
            ClientEvent::Join(payload) => {
                on_join(&state, connection, payload).await;
            }
            ClientEvent::Move(payload) => {
                on_move(&state, connection, payload).await;
            }
            ClientEvent::QuestComplete(payload) => {
                on_quest(&state, connection, payload).await;
            }
            ClientEvent::Ping => {
                state.send_to(connection, &ServerEvent::Pong).await;
            }
            ClientEvent::Disconnect => {
                tracing::info!(%connection, "client disconnected");
                break;
            }
        }
    }

    // _guard drops here (and on the early return above) → player
    // removed, departure broadcast.
    Ok(())
}

fn decode_event<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<ClientEvent, ProtocolError> {
    let frame: InboundFrame = codec.decode(data)?;
    ClientEvent::from_frame(frame)
}

/// Decides what, if anything, the sender hears about a bad frame.
///
/// Only a malformed `join` is reported: the client is waiting on it.
/// Moves and quest completions are high-frequency and best-effort, and
/// unknown or undecodable frames are noise.
async fn reject<C: Codec>(
    state: &ServerState<C>,
    connection: ConnectionId,
    error: ProtocolError,
) {
    match error {
        ProtocolError::InvalidPayload { event: "join", .. } => {
            tracing::debug!(%connection, error = %error, "rejected join");
            let message = error.to_string();
            state
                .send_to(connection, &ServerEvent::Error { message })
                .await;
        }
        _ => {
            tracing::debug!(%connection, error = %error, "ignored frame");
        }
    }
}

/// Whether `connection` is still a live peer. Must be called with the
/// presence lock held: an eviction that landed after the read loop's own
/// check is only visible from here, and acting on a stale connection would
/// hand its team back and kick the holder that replaced it.
async fn still_registered<C: Codec>(
    state: &ServerState<C>,
    connection: ConnectionId,
) -> bool {
    let live = state.peers.contains(connection).await;
    if !live {
        tracing::debug!(%connection, "event from evicted connection dropped");
    }
    live
}

/// Join: validate, evict the team's previous holder, store the player,
/// then tell the joiner who is here and everyone else who arrived.
///
/// The whole sequence runs under one presence lock, so two joins for the
/// same team can never both see it as free.
async fn on_join<C: Codec>(
    state: &ServerState<C>,
    connection: ConnectionId,
    payload: JoinPayload,
) {
    let mut presence = state.presence.lock().await;
    if !still_registered(state, connection).await {
        return;
    }

    let outcome = match presence.join_with_eviction(connection, &payload) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::debug!(%connection, error = %e, "join refused");
            drop(presence);
            state
                .send_to(
                    connection,
                    &ServerEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            return;
        }
    };

    if let Some(evicted) = outcome.evicted {
        let kicked = state.encode(&ServerEvent::Kicked {
            reason: KICKED_REASON.to_string(),
        });
        state.peers.disconnect(evicted.connection, kicked).await;

        if let Some(player) = evicted.player {
            state
                .broadcast(
                    &ServerEvent::PlayerLeft {
                        user_id: player.user_id,
                    },
                    None,
                )
                .await;
        }
    }

    state
        .send_to(connection, &ServerEvent::PlayersList(outcome.others))
        .await;
    state
        .broadcast(&ServerEvent::PlayerJoined(outcome.player), Some(connection))
        .await;
}

/// Move: apply if admitted, then tell everyone else. Rejections are silent.
///
/// The broadcast names the player by the identity stored at join, not the
/// `userId` in the move payload, so one connection cannot move another
/// player's avatar on other screens.
async fn on_move<C: Codec>(
    state: &ServerState<C>,
    connection: ConnectionId,
    payload: MovePayload,
) {
    let MovePayload { x, y, .. } = payload;
    let mut presence = state.presence.lock().await;
    if !still_registered(state, connection).await {
        return;
    }

    if !presence.update_position(connection, x, y) {
        return;
    }
    let Some(user_id) = presence.player(connection).map(|p| p.user_id.clone())
    else {
        return;
    };

    state
        .broadcast(
            &ServerEvent::PlayerMoved(PlayerMoved { user_id, x, y }),
            Some(connection),
        )
        .await;
}

/// Quest completion: record it, then tell everyone, sender included.
/// Repeats are announced again; the stored set stays deduplicated.
async fn on_quest<C: Codec>(
    state: &ServerState<C>,
    connection: ConnectionId,
    payload: QuestPayload,
) {
    let mut presence = state.presence.lock().await;
    if !still_registered(state, connection).await {
        return;
    }

    if !presence.complete_quest(connection, &payload.quest_id) {
        return;
    }
    let Some(user_id) = presence.player(connection).map(|p| p.user_id.clone())
    else {
        return;
    };

    state
        .broadcast(
            &ServerEvent::QuestCompleted(QuestCompleted {
                user_id,
                quest_id: payload.quest_id,
            }),
            None,
        )
        .await;
}

/// Removes `connection` everywhere and announces the departure to whoever
/// remains. Safe to run more than once for the same connection; only the
/// first run that finds a player broadcasts.
async fn leave<C: Codec>(state: &ServerState<C>, connection: ConnectionId) {
    let mut presence = state.presence.lock().await;

    state.peers.disconnect(connection, None).await;
    let Some(player) = presence.remove(connection) else {
        return;
    };

    state
        .broadcast(
            &ServerEvent::PlayerLeft {
                user_id: player.user_id,
            },
            None,
        )
        .await;
}
