//! Presentation Layer
//!
//! TCP-facing pieces: admission queue, dispatcher, server lifecycle and the
//! client driver.

pub mod admission;
pub mod client;
pub mod dispatcher;
pub mod server;
