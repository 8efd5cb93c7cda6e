//! Player records: what the store keeps for each live connection.

use std::collections::BTreeSet;
use std::time::SystemTime;

use plaza_protocol::{JoinPayload, PlayerView, Shape, Team};

use crate::{PresenceConfig, ValidationError};

/// Join input as it arrives from a client: raw strings and numbers,
/// shape-checked but not yet validated.
pub type JoinInput = JoinPayload;

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A player on the canvas. Exactly one exists per joined connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Client-asserted identity. Not the storage key; two connections may
    /// in principle claim the same `user_id`.
    pub user_id: String,
    pub username: String,
    pub position: Position,
    pub shape: Shape,
    pub team: Team,
    /// Grows monotonically for the life of the connection. A set, so
    /// completing the same quest twice is a no-op.
    pub completed_quests: BTreeSet<String>,
    pub connected_at: SystemTime,
}

impl Player {
    /// Validates `input` and builds a fresh player from it.
    ///
    /// # Errors
    /// The first failing rule, in this order: empty `userId`, empty
    /// `username`, position off the canvas or non-finite, unknown shape,
    /// unknown team.
    pub(crate) fn from_input(
        input: &JoinInput,
        config: &PresenceConfig,
    ) -> Result<Self, ValidationError> {
        if input.user_id.is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        if input.username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if !config.contains(input.x, input.y) {
            return Err(ValidationError::InvalidPosition {
                x: input.x,
                y: input.y,
            });
        }
        let shape: Shape = input
            .shape
            .parse()
            .map_err(|_| ValidationError::UnknownShape(input.shape.clone()))?;
        let team: Team = input
            .team
            .parse()
            .map_err(|_| ValidationError::UnknownTeam(input.team.clone()))?;

        Ok(Self {
            user_id: input.user_id.clone(),
            username: input.username.clone(),
            position: Position {
                x: input.x,
                y: input.y,
            },
            shape,
            team,
            completed_quests: BTreeSet::new(),
            connected_at: SystemTime::now(),
        })
    }

    /// The projection other clients see.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            x: self.position.x,
            y: self.position.y,
            shape: self.shape,
            team: self.team,
            completed_quests: self.completed_quests.clone(),
        }
    }
}
