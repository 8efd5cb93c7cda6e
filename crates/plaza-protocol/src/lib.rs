//! Wire protocol for Plaza.
//!
//! This crate defines what travels over a connection:
//!
//! - **Vocabulary** ([`Team`], [`Shape`], [`PlayerView`]) — the values
//!   clients and server agree on.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`InboundFrame`]) — the
//!   named messages in each direction and their payload shapes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames become bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong on the way.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Presence (player state)
//! ```
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Inbound frames are decoded in two steps: first the envelope, then
//! [`ClientEvent::from_frame`] checks `data` against the payload shape the
//! event name calls for. That split lets the server tell "garbage bytes"
//! apart from "a `join` with the wrong fields" and react differently.

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{
    ClientEvent, InboundFrame, JoinPayload, MovePayload, PlayerMoved,
    QuestCompleted, QuestPayload, ServerEvent,
};
pub use types::{PlayerView, Shape, Team, UnknownVariant};
