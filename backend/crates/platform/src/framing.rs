//! Length-delimited message framing.
//!
//! Every message on the wire is a 4-byte big-endian length followed by
//! exactly that many payload bytes. A frame is atomic: the payload is handed
//! to the caller only once it has been read completely.

use std::future::Future;
use std::io;

use kernel::error::kind::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout_at};

/// Size of the length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound for a single frame payload
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Peer closed the stream before a full frame was transferred
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Declared or supplied payload length is above the configured maximum
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    MessageTooLarge { len: usize, max: usize },

    /// The stream deadline lapsed
    #[error("deadline exceeded")]
    Timeout,

    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::MessageTooLarge { .. } => ErrorKind::Protocol,
            FrameError::ConnectionClosed | FrameError::Timeout | FrameError::Io(_) => {
                ErrorKind::Transport
            }
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset => FrameError::ConnectionClosed,
            io::ErrorKind::TimedOut => FrameError::Timeout,
            _ => FrameError::Io(err),
        }
    }
}

/// Read one frame.
///
/// The declared length is checked against `max_len` before any payload
/// buffer is allocated.
pub async fn read_message<R>(r: &mut R, max_len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; LENGTH_PREFIX_LEN];
    r.read_exact(&mut head).await?;

    let len = u32::from_be_bytes(head) as usize;
    if len > max_len {
        return Err(FrameError::MessageTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one frame and flush it.
///
/// Oversized payloads are rejected before anything reaches the stream.
pub async fn write_message<W>(w: &mut W, payload: &[u8], max_len: usize) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let too_large = || FrameError::MessageTooLarge {
        len: payload.len(),
        max: max_len,
    };
    if payload.len() > max_len {
        return Err(too_large());
    }
    let len = u32::try_from(payload.len()).map_err(|_| too_large())?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    w.write_all(&frame).await?;
    w.flush().await?;
    Ok(())
}

/// A byte stream speaking framed messages under an optional deadline.
#[derive(Debug)]
pub struct MessageStream<S> {
    stream: S,
    max_len: usize,
    deadline: Option<Instant>,
}

impl<S> MessageStream<S> {
    pub fn new(stream: S, max_len: usize) -> Self {
        Self {
            stream,
            max_len,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Every subsequent read or write fails with [`FrameError::Timeout`]
    /// once `deadline` has passed.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

}

impl<S> MessageStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn read_message(&mut self) -> Result<Vec<u8>, FrameError> {
        let deadline = self.deadline;
        bounded(deadline, read_message(&mut self.stream, self.max_len)).await
    }

    pub async fn write_message(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        let deadline = self.deadline;
        bounded(deadline, write_message(&mut self.stream, payload, self.max_len)).await
    }

    /// Best-effort half close of the write side.
    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        let deadline = self.deadline;
        bounded(deadline, async {
            self.stream.shutdown().await?;
            Ok::<(), FrameError>(())
        })
        .await
    }
}

async fn bounded<T, F>(deadline: Option<Instant>, fut: F) -> Result<T, FrameError>
where
    F: Future<Output = Result<T, FrameError>>,
{
    match deadline {
        Some(deadline) => timeout_at(deadline, fut)
            .await
            .map_err(|_| FrameError::Timeout)?,
        None => fut.await,
    }
}
