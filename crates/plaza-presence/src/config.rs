//! Presence tuning knobs.

use std::time::Duration;

use serde::Deserialize;

/// Canvas bounds and move rate limit.
///
/// Deserializes from the `[presence]` table of the server config; any
/// omitted field keeps its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Side length of the square canvas. Positions are valid in
    /// `[0, canvas_size]` on both axes, edges included.
    ///
    /// Default: 2000, the canvas every client draws. Any other value moves
    /// the bounds away from what clients expect, so only change it
    /// together with the client. The server config loader rejects
    /// non-finite and non-positive sizes.
    pub canvas_size: f64,

    /// Minimum time between two accepted moves from one connection,
    /// in milliseconds. Measured from the last *accepted* move, so a
    /// rejected attempt does not push the window back.
    ///
    /// Default: 50. Set to 0 to disable rate limiting.
    pub move_interval_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            canvas_size: 2000.0,
            move_interval_ms: 50,
        }
    }
}

impl PresenceConfig {
    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval_ms)
    }

    /// Whether `(x, y)` is a finite point on the canvas.
    ///
    /// NaN fails every comparison, so the range check alone would already
    /// reject it; the explicit `is_finite` keeps infinities out even if
    /// `canvas_size` is configured as infinite.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let axis = 0.0..=self.canvas_size;
        x.is_finite() && y.is_finite() && axis.contains(&x) && axis.contains(&y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_edges_inclusive() {
        let config = PresenceConfig::default();
        assert!(config.contains(0.0, 0.0));
        assert!(config.contains(2000.0, 2000.0));
        assert!(!config.contains(2000.1, 0.0));
        assert!(!config.contains(0.0, -0.1));
    }

    #[test]
    fn test_contains_rejects_non_finite() {
        let config = PresenceConfig {
            canvas_size: f64::INFINITY,
            ..PresenceConfig::default()
        };
        assert!(!config.contains(f64::NAN, 1.0));
        assert!(!config.contains(1.0, f64::INFINITY));
        assert!(config.contains(1e9, 1.0));
    }

    #[test]
    fn test_move_interval_default_is_50ms() {
        assert_eq!(
            PresenceConfig::default().move_interval(),
            Duration::from_millis(50)
        );
    }
}
