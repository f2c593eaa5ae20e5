//! Request Quote Use Case
//!
//! Client half of the handshake over an already connected socket. Every step
//! gets its own `io_timeout`; the PoW search runs on the blocking pool and is
//! bounded only by the ceiling difficulty the solver accepts.

use std::sync::Arc;
use std::time::Duration;

use platform::framing::MessageStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::domain::hashcash::Solver;
use crate::error::{ClientError, Step};

/// Trigger payload that opens a handshake
pub const REQUEST_TOKEN: &[u8] = b"challenge";

/// Request Quote Use Case
pub struct QuoteRequest<S> {
    solver: Arc<S>,
    io_timeout: Duration,
    max_frame_len: usize,
}

impl<S> Clone for QuoteRequest<S> {
    fn clone(&self) -> Self {
        Self {
            solver: Arc::clone(&self.solver),
            io_timeout: self.io_timeout,
            max_frame_len: self.max_frame_len,
        }
    }
}

impl<S> QuoteRequest<S>
where
    S: Solver + 'static,
{
    pub fn new(solver: Arc<S>, io_timeout: Duration, max_frame_len: usize) -> Self {
        Self {
            solver,
            io_timeout,
            max_frame_len,
        }
    }

    pub async fn exchange<T>(&self, socket: T) -> Result<String, ClientError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = MessageStream::new(socket, self.max_frame_len);

        stream.set_deadline(Instant::now() + self.io_timeout);
        stream
            .write_message(REQUEST_TOKEN)
            .await
            .map_err(ClientError::frame(Step::Request))?;

        stream.set_deadline(Instant::now() + self.io_timeout);
        let challenge = stream
            .read_message()
            .await
            .map_err(ClientError::frame(Step::Challenge))?;

        let started = std::time::Instant::now();
        let solver = Arc::clone(&self.solver);
        let solution = tokio::task::spawn_blocking(move || solver.solve(&challenge)).await??;
        tracing::debug!(
            counter = solution.counter,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Solved challenge"
        );

        stream.set_deadline(Instant::now() + self.io_timeout);
        stream
            .write_message(&solution.encode())
            .await
            .map_err(ClientError::frame(Step::Solution))?;

        stream.set_deadline(Instant::now() + self.io_timeout);
        let quote = stream
            .read_message()
            .await
            .map_err(ClientError::frame(Step::Result))?;

        let quote = String::from_utf8(quote)?;
        if quote.is_empty() {
            return Err(ClientError::EmptyQuote);
        }
        Ok(quote)
    }
}
