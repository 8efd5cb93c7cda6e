//! # Plaza
//!
//! Real-time presence server for a shared multiplayer canvas.
//!
//! Clients connect over WebSocket, join with an identity, a shape, and a
//! team color, then stream position updates and quest completions. Plaza
//! keeps the authoritative list of who is on the canvas and fans every
//! change out to everyone else:
//!
//! - at most one connection per team; a newer join evicts the holder
//! - moves are bounded to the canvas and rate-limited per connection
//! - quest completions are recorded once and announced every time
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plaza::prelude::*;
//!
//! # async fn start() -> Result<(), PlazaError> {
//! let server = PlazaServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod peers;
mod server;

pub use config::ServerConfig;
pub use error::PlazaError;
pub use server::{
    HealthHandle, HealthReport, PlazaServer, PlazaServerBuilder, ShutdownHandle,
};

pub mod prelude {
    //! Everything needed to run a server or speak its protocol.

    pub use crate::{
        HealthHandle, HealthReport, PlazaError, PlazaServer, PlazaServerBuilder,
        ServerConfig, ShutdownHandle,
    };
    pub use plaza_presence::{PresenceConfig, ValidationError};
    pub use plaza_protocol::{
        ClientEvent, Codec, JsonCodec, PlayerView, ProtocolError,
        ServerEvent, Shape, Team,
    };
    pub use plaza_transport::ConnectionId;
}
