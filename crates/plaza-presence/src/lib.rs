//! Live presence state for Plaza.
//!
//! This crate owns the answer to "who is on the canvas right now, where,
//! and what have they completed":
//!
//! 1. **Players** — one [`Player`] per live connection, keyed by
//!    [`ConnectionId`](plaza_transport::ConnectionId).
//! 2. **Team exclusivity** — each [`Team`](plaza_protocol::Team) is held by
//!    at most one connection. A newer join for a held team evicts the
//!    holder ([`PresenceStore::join_with_eviction`]).
//! 3. **Move admission** — position updates must stay on the canvas and
//!    arrive no faster than the configured interval.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← serializes every call behind one lock, emits events
//!     ↕
//! Presence (this crate)  ← pure state, no I/O, no locking
//!     ↕
//! Protocol / Transport (below)  ← Team, Shape, PlayerView, ConnectionId
//! ```
//!
//! # Trust
//!
//! The `userId` a client sends is taken at face value. Nothing here ties
//! it to the connection beyond storing it; authentication belongs in
//! front of this crate, not inside it.

mod config;
mod error;
mod player;
mod store;

pub use config::PresenceConfig;
pub use error::ValidationError;
pub use player::{JoinInput, Player, Position};
pub use store::{Eviction, JoinOutcome, PresenceStore};
