//! PoW Error Types
//!
//! Crate-local error enums. Each one maps onto the shared
//! [`kernel::error::kind::ErrorKind`] taxonomy so callers pick log levels
//! from a single classification.

use std::fmt;
use std::net::SocketAddr;

use kernel::error::kind::ErrorKind;
use platform::framing::FrameError;
use thiserror::Error;

/// PoW-specific result type alias
pub type PowResult<T> = Result<T, PowError>;

/// Challenge codec and proof-of-work failures
///
/// The server never reports these to the peer; they only reach the logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("Unsupported challenge version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed challenge: {0}")]
    MalformedChallenge(&'static str),

    #[error("Malformed solution: expected {expected} bytes, got {actual}")]
    MalformedSolution { expected: usize, actual: usize },

    /// Challenge is older (or further in the future) than the freshness window
    #[error("Challenge expired")]
    ExpiredChallenge,

    #[error("Insufficient work: {actual} leading zero bits, {required} required")]
    InsufficientWork { required: u8, actual: u32 },

    #[error("Invalid difficulty: {0} bits")]
    InvalidDifficulty(u8),

    /// Client-side refusal to solve an unreasonably hard challenge
    #[error("Challenge difficulty {requested} exceeds the accepted ceiling of {ceiling}")]
    DifficultyTooHigh { requested: u8, ceiling: u8 },

    #[error("Counter space exhausted without a solution")]
    SearchExhausted,
}

/// Quote provider failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Quote corpus is empty")]
    Empty,
}

/// The protocol message a framing error happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Request,
    Challenge,
    Solution,
    Result,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Request => "request",
            Step::Challenge => "challenge",
            Step::Solution => "solution",
            Step::Result => "result",
        })
    }
}

/// Why a server-side connection ended without delivering a quote
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("{step} frame: {source}")]
    Frame {
        step: Step,
        #[source]
        source: FrameError,
    },

    #[error("proof of work rejected: {0}")]
    Pow(#[from] PowError),

    #[error("no quote to send: {0}")]
    Quote(#[from] QuoteError),
}

impl ConnectionError {
    /// Adapter for `map_err` on framed I/O
    pub fn frame(step: Step) -> impl FnOnce(FrameError) -> Self {
        move |source| ConnectionError::Frame { step, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::Frame { source, .. } => source.kind(),
            ConnectionError::Pow(_) => ErrorKind::ProofOfWork,
            ConnectionError::Quote(_) => ErrorKind::Resource,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self, peer: SocketAddr) {
        let kind = self.kind();
        if kind.is_peer_abuse() {
            tracing::warn!(%peer, error = %self, "connection rejected");
        } else if kind == ErrorKind::Transport {
            tracing::info!(%peer, error = %self, "connection dropped");
        } else {
            tracing::error!(%peer, error = %self, "connection closed without a result");
        }
    }
}

/// Client-side request failures, one variant per failing step
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dialing {addr} timed out")]
    DialTimeout { addr: String },

    #[error("{step} frame: {source}")]
    Frame {
        step: Step,
        #[source]
        source: FrameError,
    },

    #[error(transparent)]
    Pow(#[from] PowError),

    #[error("solver task failed: {0}")]
    Solver(#[from] tokio::task::JoinError),

    #[error("server sent a quote that is not UTF-8")]
    InvalidQuote(#[from] std::string::FromUtf8Error),

    #[error("server sent an empty quote")]
    EmptyQuote,
}

impl ClientError {
    pub fn frame(step: Step) -> impl FnOnce(FrameError) -> Self {
        move |source| ClientError::Frame { step, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Dial { .. } | ClientError::DialTimeout { .. } => ErrorKind::Transport,
            ClientError::Frame { source, .. } => source.kind(),
            ClientError::Pow(_) => ErrorKind::ProofOfWork,
            ClientError::Solver(_) => ErrorKind::Resource,
            ClientError::InvalidQuote(_) | ClientError::EmptyQuote => ErrorKind::Protocol,
        }
    }
}
