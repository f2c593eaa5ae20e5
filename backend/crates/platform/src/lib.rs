//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Length-delimited message framing with deadlines
//! - Cryptographic utilities (SHA-256, random bytes, bit counting)
//! - Environment configuration loading
//! - Tracing initialisation and log levels
//! - TCP listen/connect with keep-alive
//! - Drain tracking for graceful shutdown
//! - Process signal handling

pub mod config;
pub mod crypto;
pub mod drain;
pub mod framing;
pub mod net;
pub mod signal;
pub mod telemetry;
