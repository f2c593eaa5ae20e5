//! Dispatcher
//!
//! Pulls admitted sockets off the queue and starts one handler task per
//! socket. The connection deadline is fixed at dispatch, before the task is
//! spawned. With a handler cap configured the dispatcher stops pulling while
//! the cap is reached, so the queue fills and shedding takes over.

use std::sync::Arc;
use std::time::Duration;

use platform::drain::DrainGroup;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::time::Instant;

use crate::application::serve_connection::ConnectionHandler;
use crate::domain::hashcash::Verifier;
use crate::domain::repository::QuoteRepository;
use crate::presentation::admission::{Admitted, AdmissionReceiver};

pub struct Dispatcher<V, Q> {
    receiver: AdmissionReceiver,
    handler: ConnectionHandler<V, Q>,
    handlers: DrainGroup,
    conn_deadline: Duration,
    limit: Option<Arc<Semaphore>>,
}

impl<V, Q> Dispatcher<V, Q>
where
    V: Verifier + 'static,
    Q: QuoteRepository + Sync + 'static,
{
    pub fn new(
        receiver: AdmissionReceiver,
        handler: ConnectionHandler<V, Q>,
        handlers: DrainGroup,
        conn_deadline: Duration,
        max_handlers: Option<usize>,
    ) -> Self {
        Self {
            receiver,
            handler,
            handlers,
            conn_deadline,
            limit: max_handlers
                .map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS)))),
        }
    }

    /// Dispatch until `shutdown` flips to `true`, then drop anything still queued.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let permit = match &self.limit {
                Some(limit) => tokio::select! {
                    biased;
                    _ = stop_requested(&mut shutdown) => break,
                    permit = Arc::clone(limit).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                },
                None => None,
            };

            let admitted = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                next = self.receiver.next() => match next {
                    Some(admitted) => admitted,
                    None => break,
                },
            };

            self.dispatch(admitted, permit);
        }

        let dropped = self.receiver.close_and_drain();
        tracing::debug!(dropped, "Dispatcher stopped");
    }

    fn dispatch(&self, admitted: Admitted, permit: Option<OwnedSemaphorePermit>) {
        let deadline = Instant::now() + self.conn_deadline;
        let guard = self.handlers.enter();
        let handler = self.handler.clone();

        tokio::spawn(async move {
            // Both release on completion or panic.
            let _guard = guard;
            let _permit = permit;

            let Admitted {
                socket,
                peer,
                id,
                accepted_at,
            } = admitted;
            tracing::debug!(
                %peer,
                connection = %id,
                queued_ms = accepted_at.elapsed().as_millis() as u64,
                "Dispatching connection"
            );
            handler.handle(socket, peer, deadline).await;
        });
    }
}

/// Resolves once `shutdown` holds `true` or its sender is gone.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
