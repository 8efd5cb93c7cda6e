//! Error types for the presence layer.

/// Why a join was refused.
///
/// Rules are checked in declaration order and the first failure wins, so
/// a join with both an empty `userId` and an unknown team reports
/// [`EmptyUserId`](Self::EmptyUserId). A refused join never changes any
/// state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("userId must be a non-empty string")]
    EmptyUserId,

    #[error("username must be a non-empty string")]
    EmptyUsername,

    /// The starting position is non-finite or off the canvas.
    #[error("position ({x}, {y}) is outside the canvas")]
    InvalidPosition { x: f64, y: f64 },

    #[error("unknown shape {0:?}")]
    UnknownShape(String),

    #[error("unknown team {0:?}")]
    UnknownTeam(String),
}
