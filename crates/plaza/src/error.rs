//! Unified error type for the Plaza server.

use plaza_transport::TransportError;

/// Errors that stop the server, its config load, or one connection.
///
/// Bad frames and refused joins are not here: they are answered on the
/// wire (or dropped) and the connection carries on.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// A transport-level error (bind, accept, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The config parsed but holds a value the server cannot run with.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Reading the config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let plaza_err: PlazaError = err.into();
        assert!(matches!(plaza_err, PlazaError::Transport(_)));
        assert!(plaza_err.to_string().contains("gone"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = PlazaError::InvalidConfig("canvas".into());
        assert_eq!(err.to_string(), "invalid config: canvas");
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<crate::ServerConfig>("bind_addr = 5")
            .unwrap_err();
        let plaza_err: PlazaError = err.into();
        assert!(plaza_err.to_string().starts_with("invalid config"));
    }
}
