//! Domain Entities
//!
//! Core business entities for the PoW domain.

use std::time::Duration;

use chrono::Utc;
use kernel::id::ResourceId;

use crate::domain::value_objects::Difficulty;

/// Current challenge wire version
pub const CHALLENGE_VERSION: u8 = 1;

/// Length of the server-chosen random seed
pub const SEED_LEN: usize = 16;

/// Challenge entity - a puzzle issued to one connection
///
/// Immutable once issued. Freshness is the only replay guard: nothing about
/// an issued challenge is remembered after its connection closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub version: u8,
    pub difficulty: Difficulty,
    /// Unix milliseconds, UTC
    pub issued_at_ms: i64,
    pub seed: [u8; SEED_LEN],
    pub resource: ResourceId,
}

impl Challenge {
    /// Create a new challenge stamped with the current time
    pub fn issue(difficulty: Difficulty) -> Self {
        Self::new(
            difficulty,
            Utc::now().timestamp_millis(),
            platform::crypto::random_array(),
            ResourceId::new(),
        )
    }

    pub fn new(
        difficulty: Difficulty,
        issued_at_ms: i64,
        seed: [u8; SEED_LEN],
        resource: ResourceId,
    ) -> Self {
        Self {
            version: CHALLENGE_VERSION,
            difficulty,
            issued_at_ms,
            seed,
            resource,
        }
    }

    /// Milliseconds elapsed since issue; negative when stamped in the future
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.issued_at_ms)
    }

    /// Whether the challenge is within `window` of `now_ms`, in either direction
    pub fn is_fresh_at(&self, now_ms: i64, window: Duration) -> bool {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.age_ms(now_ms).saturating_abs() <= window_ms
    }
}

/// Solution entity - the counter found by the brute-force search
///
/// Paired implicitly with the challenge bytes it was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub counter: u64,
}

impl Solution {
    pub fn new(counter: u64) -> Self {
        Self { counter }
    }
}
