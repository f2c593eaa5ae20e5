//! Infrastructure Layer - Repository implementations

pub mod quotes;
