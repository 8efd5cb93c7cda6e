//! Shared vocabulary: the closed sets of teams and shapes, and the player
//! projection every client sees.
//!
//! These are wire types. They are also what the presence store validates
//! join input against, so the set of legal values lives in exactly one
//! place.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Returned by `FromStr` for [`Team`] and [`Shape`] when the input is not
/// one of the known tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// `"team"` or `"shape"`.
    pub kind: &'static str,
    /// The rejected input, verbatim.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// A team, identified on the wire by its color token.
///
/// The set is closed: a join naming any other color is rejected. At most
/// one live connection may hold each team at a time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
pub enum Team {
    #[serde(rename = "#ef4444")]
    Red,
    #[serde(rename = "#f97316")]
    Orange,
    #[serde(rename = "#eab308")]
    Yellow,
    #[serde(rename = "#22c55e")]
    Green,
    #[serde(rename = "#14b8a6")]
    Teal,
    #[serde(rename = "#3b82f6")]
    Blue,
    #[serde(rename = "#6366f1")]
    Indigo,
    #[serde(rename = "#a855f7")]
    Purple,
    #[serde(rename = "#ec4899")]
    Pink,
}

impl Team {
    /// Every team, in palette order.
    pub const ALL: [Team; 9] = [
        Team::Red,
        Team::Orange,
        Team::Yellow,
        Team::Green,
        Team::Teal,
        Team::Blue,
        Team::Indigo,
        Team::Purple,
        Team::Pink,
    ];

    /// The color token used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Red => "#ef4444",
            Team::Orange => "#f97316",
            Team::Yellow => "#eab308",
            Team::Green => "#22c55e",
            Team::Teal => "#14b8a6",
            Team::Blue => "#3b82f6",
            Team::Indigo => "#6366f1",
            Team::Purple => "#a855f7",
            Team::Pink => "#ec4899",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = UnknownVariant;

    /// Matches the color token exactly. `"#EF4444"` is not `"#ef4444"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Team::ALL
            .into_iter()
            .find(|team| team.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "team",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// The avatar outline a player draws with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Star,
    Hexagon,
    Diamond,
}

impl Shape {
    pub const ALL: [Shape; 6] = [
        Shape::Circle,
        Shape::Square,
        Shape::Triangle,
        Shape::Star,
        Shape::Hexagon,
        Shape::Diamond,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Square => "square",
            Shape::Triangle => "triangle",
            Shape::Star => "star",
            Shape::Hexagon => "hexagon",
            Shape::Diamond => "diamond",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shape::ALL
            .into_iter()
            .find(|shape| shape.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "shape",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// PlayerView
// ---------------------------------------------------------------------------

/// What other clients get to see of a player.
///
/// Connection handles and join timestamps are server-side bookkeeping and
/// are deliberately absent. `completedQuests` serializes as a sorted JSON
/// array with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: String,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub shape: Shape,
    pub team: Team,
    pub completed_quests: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_from_str_accepts_every_token() {
        for team in Team::ALL {
            assert_eq!(team.as_str().parse::<Team>(), Ok(team));
        }
    }

    #[test]
    fn test_team_from_str_is_case_sensitive() {
        let err = "#EF4444".parse::<Team>().unwrap_err();
        assert_eq!(err.kind, "team");
        assert_eq!(err.value, "#EF4444");
    }

    #[test]
    fn test_team_serde_matches_as_str() {
        for team in Team::ALL {
            let json = serde_json::to_string(&team).unwrap();
            assert_eq!(json, format!("\"{}\"", team.as_str()));
        }
    }

    #[test]
    fn test_team_tokens_are_distinct() {
        let tokens: BTreeSet<_> = Team::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(tokens.len(), 9);
    }

    #[test]
    fn test_shape_from_str_rejects_unknown() {
        assert_eq!("star".parse::<Shape>(), Ok(Shape::Star));
        let err = "blob".parse::<Shape>().unwrap_err();
        assert_eq!(err.to_string(), "unknown shape: \"blob\"");
    }

    #[test]
    fn test_player_view_json_uses_camel_case() {
        let view = PlayerView {
            user_id: "u1".into(),
            username: "Ann".into(),
            x: 10.0,
            y: 20.5,
            shape: Shape::Circle,
            team: Team::Red,
            completed_quests: ["q2".to_string(), "q1".to_string()]
                .into_iter()
                .collect(),
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["team"], "#ef4444");
        assert_eq!(value["shape"], "circle");
        assert_eq!(value["completedQuests"], serde_json::json!(["q1", "q2"]));
        assert!(value.get("connectedAt").is_none());
    }
}
