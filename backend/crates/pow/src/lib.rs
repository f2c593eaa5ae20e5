//! PoW (Proof of Work) Quote Service
//!
//! Clean Architecture structure:
//! - `domain/` - Challenge, codec, hashcash solver/verifier, repository traits
//! - `application/` - Use cases (serve a connection, request a quote) and config
//! - `infra/` - Embedded quote corpus
//! - `presentation/` - Admission queue, dispatcher, server and client drivers
//!
//! ## Security Model
//! - The server is the sole authority for challenge generation and difficulty
//! - Verification is O(1); only the client pays for the search
//! - Freshness is the only replay guard: no challenge state outlives its connection
//! - A failed handshake is a silent close, the peer is never told why
//! - Excess connections are shed after a bounded wait, never queued without limit

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{ClientConfig, PowConfig, ServerConfig};
pub use domain::hashcash::{Hashcash, Solver, Verifier};
pub use error::{ClientError, ConnectionError, PowError, PowResult, QuoteError};
pub use infra::quotes::EmbeddedQuotes;
pub use presentation::client::{Client, RunSummary};
pub use presentation::server::Server;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult, ResultExt},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
