//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Challenge, Solution) and their wire codec
//! - Domain value objects (Difficulty)
//! - Domain services (digest, search and verification logic)
//! - The hashcash solver/verifier
//! - Repository traits (interfaces)

pub mod codec;
pub mod entities;
pub mod hashcash;
pub mod repository;
pub mod services;
pub mod value_objects;
