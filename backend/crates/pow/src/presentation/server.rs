//! Server Lifecycle
//!
//! `bind` -> `run` (accept loop + dispatcher) -> `stop` (drain).
//!
//! Two drain groups are kept apart: `loops` tracks the accept and dispatch
//! loops, `handlers` tracks in-flight connections. `stop` waits for the loops
//! first so that no new handler can start while the handlers are drained.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult, ResultExt};
use kernel::error::kind::ErrorKind;
use platform::drain::DrainGroup;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::application::config::ServerConfig;
use crate::application::serve_connection::ConnectionHandler;
use crate::domain::hashcash::Verifier;
use crate::domain::repository::QuoteRepository;
use crate::presentation::admission::{AdmissionError, admission_queue};
use crate::presentation::dispatcher::{Dispatcher, stop_requested};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct Server<V, Q> {
    config: ServerConfig,
    handler: ConnectionHandler<V, Q>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    loops: DrainGroup,
    handlers: DrainGroup,
}

impl<V, Q> Server<V, Q>
where
    V: Verifier + 'static,
    Q: QuoteRepository + Sync + 'static,
{
    /// Bind the listening socket. Failure here is fatal to the process.
    pub async fn bind(config: ServerConfig, verifier: Arc<V>, quotes: Arc<Q>) -> AppResult<Self> {
        let listener = platform::net::listen(&config.addr, config.keep_alive)
            .await
            .map_app_err(ErrorKind::Fatal, format!("failed to bind {}", config.addr))?;
        let local_addr = listener
            .local_addr()
            .map_app_err(ErrorKind::Fatal, "listener has no local address")?;

        tracing::info!(
            addr = %local_addr,
            difficulty = verifier.difficulty().bits(),
            expected_trials = verifier.difficulty().expected_trials(),
            workers = config.workers,
            max_handlers = ?config.max_handlers,
            "Server listening"
        );

        let handler = ConnectionHandler::new(verifier, quotes, config.max_frame_len);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            handler,
            listener: Mutex::new(Some(listener)),
            local_addr,
            shutdown,
            loops: DrainGroup::new(),
            handlers: DrainGroup::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently being served
    pub fn active_handlers(&self) -> usize {
        self.handlers.active()
    }

    /// Accept until [`Server::stop`] is called.
    pub async fn run(&self) -> AppResult<()> {
        let _running = self.loops.enter();
        let mut shutdown = self.shutdown.subscribe();

        let Some(listener) = self.take_listener() else {
            if *shutdown.borrow() {
                return Ok(());
            }
            return Err(AppError::fatal("server is already running"));
        };
        if *shutdown.borrow() {
            return Ok(());
        }

        let (queue, receiver) = admission_queue(self.config.workers, self.config.accept_timeout);
        let dispatcher = Dispatcher::new(
            receiver,
            self.handler.clone(),
            self.handlers.clone(),
            self.config.conn_deadline,
            self.config.max_handlers,
        );
        let dispatching = self.loops.enter();
        let dispatch_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _dispatching = dispatching;
            dispatcher.run(dispatch_shutdown).await;
        });

        loop {
            let accepted = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((socket, peer)) => {
                    if let Err(e) = socket.set_nodelay(true) {
                        tracing::debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }
                    // Shedding is logged by the queue.
                    if let Err(AdmissionError::Closed { .. }) = queue.admit(socket, peer).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        tracing::debug!("Accept loop stopped");
        Ok(())
    }

    /// Stop accepting, then wait for every in-flight connection to finish.
    ///
    /// Handlers are not cancelled, so this can take up to one connection
    /// deadline. Safe to call more than once, and before or without `run`.
    pub async fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!(active = self.active_handlers(), "Stopping server");
        }
        drop(self.take_listener());

        self.loops.wait().await;
        self.handlers.wait().await;
        tracing::info!("Server stopped");
    }

    fn take_listener(&self) -> Option<TcpListener> {
        match self.listener.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}
