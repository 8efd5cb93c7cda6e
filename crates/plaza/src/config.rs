//! Server configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working local server:
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! idle_timeout_secs = 60
//! health_log_interval_secs = 30
//! outbound_queue_capacity = 256
//!
//! [presence]
//! canvas_size = 2000.0
//! move_interval_ms = 50
//! ```

use std::path::Path;
use std::time::Duration;

use plaza_presence::PresenceConfig;
use serde::Deserialize;

use crate::PlazaError;
use crate::peers::DEFAULT_QUEUE_CAPACITY;

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// A connection that sends nothing for this long is closed and its
    /// player removed. Clients keep themselves alive with `ping`.
    pub idle_timeout_secs: u64,

    /// How often the binary logs a health report. 0 disables it.
    pub health_log_interval_secs: u64,

    /// Frames that may wait for one slow peer before further frames to
    /// it are dropped.
    pub outbound_queue_capacity: usize,

    /// Canvas bounds and move rate limit.
    pub presence: PresenceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 60,
            health_log_interval_secs: 30,
            outbound_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            presence: PresenceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses a TOML config file.
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    /// [`PlazaError::Io`] if the file exists but cannot be read,
    /// [`PlazaError::Config`] if it is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlazaError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_toml_str(&text)?;
                tracing::info!(path = %path.display(), "loaded config");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "config file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    /// [`PlazaError::Config`] for malformed TOML, [`PlazaError::InvalidConfig`]
    /// for a canvas size that is not a positive finite number.
    pub fn from_toml_str(text: &str) -> Result<Self, PlazaError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PlazaError> {
        let size = self.presence.canvas_size;
        if !(size.is_finite() && size > 0.0) {
            return Err(PlazaError::InvalidConfig(format!(
                "presence.canvas_size must be a positive finite number, got {size}"
            )));
        }
        if size != PresenceConfig::default().canvas_size {
            tracing::warn!(
                canvas_size = size,
                "non-default canvas size; clients must draw the same canvas"
            );
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn health_log_interval(&self) -> Option<Duration> {
        (self.health_log_interval_secs > 0)
            .then(|| Duration::from_secs(self.health_log_interval_secs))
    }
}
