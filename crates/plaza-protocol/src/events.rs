//! Inbound and outbound events.
//!
//! Clients send [`InboundFrame`]s, which the server turns into
//! [`ClientEvent`]s. The server answers with [`ServerEvent`]s. Both
//! directions share the same `{"event", "data"}` framing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{PlayerView, ProtocolError};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded but not yet interpreted inbound frame.
///
/// `data` is kept as a raw JSON value so the payload shape can be checked
/// per event name. A missing `data` becomes `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of `join`.
///
/// Team and shape arrive as raw strings. Whether they name a real team or
/// shape is a domain rule, checked by the presence store together with
/// the other join rules so the first failing rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub user_id: String,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub shape: String,
    pub team: String,
}

/// Payload of `move`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
}

/// Payload of `questComplete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestPayload {
    pub user_id: String,
    pub quest_id: String,
}

/// A shape-checked inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join(JoinPayload),
    Move(MovePayload),
    QuestComplete(QuestPayload),
    Ping,
    Disconnect,
}

impl ClientEvent {
    /// Interprets a frame: picks the payload type by event name and checks
    /// `data` against it.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownEvent`] for an event name the server
    ///   does not handle.
    /// - [`ProtocolError::InvalidPayload`] when `data` is missing fields,
    ///   has fields of the wrong JSON type, or (for `questComplete`) has an
    ///   empty `userId` or `questId`.
    pub fn from_frame(frame: InboundFrame) -> Result<Self, ProtocolError> {
        match frame.event.as_str() {
            "join" => Ok(Self::Join(payload("join", frame.data)?)),
            "move" => Ok(Self::Move(payload("move", frame.data)?)),
            "questComplete" => {
                let quest: QuestPayload =
                    payload("questComplete", frame.data)?;
                if quest.user_id.is_empty() || quest.quest_id.is_empty() {
                    return Err(ProtocolError::InvalidPayload {
                        event: "questComplete",
                        reason: "userId and questId must be non-empty".into(),
                    });
                }
                Ok(Self::QuestComplete(quest))
            }
            "ping" => Ok(Self::Ping),
            "disconnect" => Ok(Self::Disconnect),
            _ => Err(ProtocolError::UnknownEvent(frame.event)),
        }
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Move(_) => "move",
            Self::QuestComplete(_) => "questComplete",
            Self::Ping => "ping",
            Self::Disconnect => "disconnect",
        }
    }
}

fn payload<T: DeserializeOwned>(
    event: &'static str,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event,
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Body of `player:moved`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMoved {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
}

/// Body of `quest:completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestCompleted {
    pub user_id: String,
    pub quest_id: String,
}

/// Everything the server can send to a client.
///
/// Adjacently tagged, so `ServerEvent::Pong` is `{"event":"pong"}` and
/// `ServerEvent::PlayerLeft` is
/// `{"event":"player:left","data":{"userId":"u1"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Sent once to a newly joined connection: everyone already present.
    #[serde(rename = "players:list")]
    PlayersList(Vec<PlayerView>),

    /// Someone joined (sent to every other connection).
    #[serde(rename = "player:joined")]
    PlayerJoined(PlayerView),

    /// Someone's position changed (sent to every other connection).
    #[serde(rename = "player:moved")]
    PlayerMoved(PlayerMoved),

    /// Someone left or was evicted (sent to every connection).
    #[serde(rename = "player:left")]
    PlayerLeft {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Someone completed a quest (sent to every connection, sender
    /// included).
    #[serde(rename = "quest:completed")]
    QuestCompleted(QuestCompleted),

    /// The sender's last request was rejected.
    #[serde(rename = "error")]
    Error { message: String },

    /// This connection lost its team to a newer one and is about to be
    /// closed.
    #[serde(rename = "kicked")]
    Kicked { reason: String },

    /// Reply to `ping`.
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayersList(_) => "players:list",
            Self::PlayerJoined(_) => "player:joined",
            Self::PlayerMoved(_) => "player:moved",
            Self::PlayerLeft { .. } => "player:left",
            Self::QuestCompleted(_) => "quest:completed",
            Self::Error { .. } => "error",
            Self::Kicked { .. } => "kicked",
            Self::Pong => "pong",
        }
    }
}
