//! Quote Server Entry Point
//!
//! Loads configuration, binds the listener and serves until SIGINT/SIGTERM.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::sync::Arc;

use platform::{config, signal::shutdown_signal, telemetry::init_tracing};
use pow::{EmbeddedQuotes, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: ServerConfig = config::load()?;

    init_tracing("server", &config.logger);

    let verifier = Arc::new(config.pow.hashcash()?);
    let quotes = Arc::new(EmbeddedQuotes::new());
    tracing::info!(quotes = quotes.len(), "Loaded quote corpus");

    let server = Arc::new(Server::bind(config, verifier, quotes).await?);

    let running = Arc::clone(&server);
    let mut run = tokio::spawn(async move { running.run().await });

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Graceful shutdown...");
            server.stop().await;
            run.await??;
        }
        result = &mut run => {
            // The accept loop only returns on its own when something is badly wrong.
            server.stop().await;
            result??;
        }
    }

    Ok(())
}
