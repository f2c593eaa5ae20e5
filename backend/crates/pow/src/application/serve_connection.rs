//! Serve Connection Use Case
//!
//! Runs the challenge/response handshake for one accepted socket:
//!
//! ```text
//! AwaitRequest -> IssueChallenge -> AwaitSolution -> Verify -> SendResult -> Closed
//! ```
//!
//! Any failure jumps straight to `Closed`. The peer never learns why: on
//! failure the socket is simply dropped without a result frame.

use std::net::SocketAddr;
use std::sync::Arc;

use platform::framing::MessageStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::domain::hashcash::Verifier;
use crate::domain::repository::QuoteRepository;
use crate::error::{ConnectionError, Step};

#[derive(Debug)]
enum ConnectionState {
    AwaitRequest,
    IssueChallenge,
    AwaitSolution { challenge: Vec<u8> },
    Verify { challenge: Vec<u8>, solution: Vec<u8> },
    SendResult,
    Closed,
}

/// Serve Connection Use Case
pub struct ConnectionHandler<V, Q> {
    verifier: Arc<V>,
    quotes: Arc<Q>,
    max_frame_len: usize,
}

impl<V, Q> Clone for ConnectionHandler<V, Q> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            quotes: Arc::clone(&self.quotes),
            max_frame_len: self.max_frame_len,
        }
    }
}

impl<V, Q> ConnectionHandler<V, Q>
where
    V: Verifier,
    Q: QuoteRepository + Sync,
{
    pub fn new(verifier: Arc<V>, quotes: Arc<Q>, max_frame_len: usize) -> Self {
        Self {
            verifier,
            quotes,
            max_frame_len,
        }
    }

    /// Own the socket for one request and release it on every exit path.
    pub async fn handle<S>(&self, socket: S, peer: SocketAddr, deadline: Instant)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = MessageStream::new(socket, self.max_frame_len).with_deadline(deadline);

        match self.serve(&mut stream).await {
            Ok(()) => {
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!(%peer, error = %e, "shutdown after result failed");
                }
            }
            Err(err) => err.log(peer),
        }
    }

    /// Drive the handshake to completion on an already framed stream.
    pub async fn serve<S>(&self, stream: &mut MessageStream<S>) -> Result<(), ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut state = ConnectionState::AwaitRequest;

        loop {
            state = match state {
                ConnectionState::AwaitRequest => {
                    // Any payload counts as the trigger.
                    stream
                        .read_message()
                        .await
                        .map_err(ConnectionError::frame(Step::Request))?;
                    ConnectionState::IssueChallenge
                }
                ConnectionState::IssueChallenge => {
                    let challenge = self.verifier.issue();
                    tracing::debug!(
                        resource = %challenge.resource,
                        difficulty = challenge.difficulty.bits(),
                        "Issued challenge"
                    );

                    let challenge = challenge.encode();
                    stream
                        .write_message(&challenge)
                        .await
                        .map_err(ConnectionError::frame(Step::Challenge))?;
                    ConnectionState::AwaitSolution { challenge }
                }
                ConnectionState::AwaitSolution { challenge } => {
                    let solution = stream
                        .read_message()
                        .await
                        .map_err(ConnectionError::frame(Step::Solution))?;
                    ConnectionState::Verify {
                        challenge,
                        solution,
                    }
                }
                ConnectionState::Verify {
                    challenge,
                    solution,
                } => {
                    self.verifier.verify(&challenge, &solution)?;
                    ConnectionState::SendResult
                }
                ConnectionState::SendResult => {
                    let quote = self.quotes.get_quote().await?;
                    stream
                        .write_message(quote.as_bytes())
                        .await
                        .map_err(ConnectionError::frame(Step::Result))?;
                    ConnectionState::Closed
                }
                ConnectionState::Closed => return Ok(()),
            };
        }
    }
}
