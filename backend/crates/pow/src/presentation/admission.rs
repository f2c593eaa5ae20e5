//! Admission Queue
//!
//! Bounded hand-off between the accept loop and the dispatcher. A socket that
//! cannot get a slot within the admission timeout is closed before it ever
//! sees a challenge.

use std::net::SocketAddr;
use std::time::Duration;

use kernel::error::kind::ErrorKind;
use kernel::id::ConnectionId;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Semaphore, mpsc};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::time::Instant;

/// An accepted socket waiting for a handler
#[derive(Debug)]
pub struct Admitted {
    pub socket: TcpStream,
    pub peer: SocketAddr,
    pub id: ConnectionId,
    pub accepted_at: Instant,
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("admission queue stayed full for {waited:?}, shed {peer}")]
    Shed { peer: SocketAddr, waited: Duration },

    #[error("dispatcher is gone, dropped {peer}")]
    Closed { peer: SocketAddr },
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Resource
    }
}

/// Create a queue holding at most `capacity` sockets, clamped to
/// `1..=Semaphore::MAX_PERMITS`.
pub fn admission_queue(capacity: usize, timeout: Duration) -> (AdmissionQueue, AdmissionReceiver) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, Semaphore::MAX_PERMITS));
    (AdmissionQueue { tx, timeout }, AdmissionReceiver { rx })
}

/// Producer side, owned by the accept loop
#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    tx: mpsc::Sender<Admitted>,
    timeout: Duration,
}

impl AdmissionQueue {
    /// Enqueue `socket`, waiting at most the admission timeout for space.
    ///
    /// On failure the socket has already been closed.
    pub async fn admit(&self, socket: TcpStream, peer: SocketAddr) -> Result<(), AdmissionError> {
        let admitted = Admitted {
            socket,
            peer,
            id: ConnectionId::new(),
            accepted_at: Instant::now(),
        };
        let id = admitted.id;

        match self.tx.send_timeout(admitted, self.timeout).await {
            Ok(()) => {
                tracing::debug!(%peer, connection = %id, queued = self.len(), "Connection admitted");
                Ok(())
            }
            Err(SendTimeoutError::Timeout(shed)) => {
                drop(shed);
                tracing::warn!(
                    %peer,
                    waited_ms = self.timeout.as_millis() as u64,
                    capacity = self.capacity(),
                    "Admission queue full, connection shed"
                );
                Err(AdmissionError::Shed {
                    peer,
                    waited: self.timeout,
                })
            }
            Err(SendTimeoutError::Closed(dropped)) => {
                drop(dropped);
                tracing::debug!(%peer, "Admission queue closed, connection dropped");
                Err(AdmissionError::Closed { peer })
            }
        }
    }

    /// Sockets currently waiting
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

}

/// Consumer side, owned by the dispatcher
#[derive(Debug)]
pub struct AdmissionReceiver {
    rx: mpsc::Receiver<Admitted>,
}

impl AdmissionReceiver {
    /// Next queued socket, or `None` once every producer is gone
    pub async fn next(&mut self) -> Option<Admitted> {
        self.rx.recv().await
    }

    /// Refuse further admissions and close whatever is still queued.
    /// Returns how many sockets were dropped.
    pub fn close_and_drain(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while let Ok(admitted) = self.rx.try_recv() {
            tracing::debug!(peer = %admitted.peer, "Dropping queued connection on shutdown");
            dropped += 1;
        }
        dropped
    }
}
