//! Quote Client Entry Point
//!
//! Requests `CLIENT_REQUEST_COUNT` quotes one after another, solving a
//! proof-of-work challenge for each. Ctrl-C stops before the next request.

use std::sync::Arc;

use platform::{config, signal::shutdown_signal, telemetry::init_tracing};
use pow::{Client, ClientConfig};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: ClientConfig = config::load()?;

    init_tracing("client", &config.logger);

    let solver = Arc::new(config.pow.hashcash()?);
    let count = config.request_count;
    tracing::info!(
        server = %config.server_addr,
        count,
        ceiling = config.pow.difficulty_bits,
        "Starting client"
    );

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown requested");
        stop.send_replace(true);
    });

    let summary = Client::new(config, solver).start(count, shutdown).await;
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "Client finished"
    );

    Ok(())
}
