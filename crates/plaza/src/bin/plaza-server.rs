//! Runs a Plaza server.
//!
//! Config path: first argument, else `PLAZA_CONFIG`, else `plaza.toml`.
//! Log level comes from `RUST_LOG` (default `info`).

use plaza::{PlazaError, PlazaServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PlazaError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PLAZA_CONFIG").ok())
        .unwrap_or_else(|| "plaza.toml".to_string());
    let config = ServerConfig::load(&path)?;

    let server = PlazaServer::builder().config(config).build().await?;
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await
}
