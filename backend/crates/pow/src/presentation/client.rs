//! Client Driver
//!
//! Sequential quote requests against one server, one connection each.

use std::sync::Arc;

use tokio::sync::watch;

use crate::application::config::ClientConfig;
use crate::application::request_quote::QuoteRequest;
use crate::domain::hashcash::Solver;
use crate::error::ClientError;

/// Outcome of [`Client::start`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// The loop ended early on shutdown
    pub cancelled: bool,
}

pub struct Client<S> {
    config: ClientConfig,
    request: QuoteRequest<S>,
}

impl<S> Client<S>
where
    S: Solver + 'static,
{
    pub fn new(config: ClientConfig, solver: Arc<S>) -> Self {
        let request = QuoteRequest::new(solver, config.io_timeout, config.max_frame_len);
        Self { config, request }
    }

    /// Dial, solve and fetch a single quote.
    pub async fn get_quote(&self) -> Result<String, ClientError> {
        let addr = &self.config.server_addr;
        let socket = tokio::time::timeout(
            self.config.io_timeout,
            platform::net::connect(addr, self.config.keep_alive),
        )
        .await
        .map_err(|_| ClientError::DialTimeout { addr: addr.clone() })?
        .map_err(|source| ClientError::Dial {
            addr: addr.clone(),
            source,
        })?;

        self.request.exchange(socket).await
    }

    /// Run `count` requests one after another, checking `shutdown` before each.
    pub async fn start(&self, count: usize, shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();

        for request in 1..=count {
            if *shutdown.borrow() {
                tracing::info!(remaining = count - request + 1, "Shutdown requested, stopping");
                summary.cancelled = true;
                break;
            }

            match self.get_quote().await {
                Ok(quote) => {
                    summary.succeeded += 1;
                    tracing::info!(request, %quote, "Received quote");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(request, kind = %e.kind(), error = %e, "Request failed");
                }
            }
        }

        summary
    }
}
