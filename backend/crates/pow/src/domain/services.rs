//! Domain Services
//!
//! Pure domain logic for PoW search and verification.

use platform::crypto::{leading_zero_bits, sha256_parts};

use crate::domain::value_objects::Difficulty;

/// Count leading zero bits in a SHA-256 hash
pub fn count_leading_zero_bits(hash: &[u8; 32]) -> u32 {
    leading_zero_bits(hash)
}

/// Verify that a hash meets the difficulty requirement
pub fn verify_difficulty(hash: &[u8; 32], difficulty: Difficulty) -> bool {
    count_leading_zero_bits(hash) >= u32::from(difficulty.bits())
}

/// Compute SHA-256 of concatenated challenge bytes and counter (big-endian)
pub fn compute_pow_hash(challenge_bytes: &[u8], counter: u64) -> [u8; 32] {
    sha256_parts(&[challenge_bytes, &counter.to_be_bytes()])
}

/// Verify a PoW solution
pub fn verify_pow(challenge_bytes: &[u8], counter: u64, difficulty: Difficulty) -> bool {
    verify_difficulty(&compute_pow_hash(challenge_bytes, counter), difficulty)
}

/// Smallest counter whose digest meets `difficulty`, trying 0 upward
///
/// `None` only if the whole u64 space is exhausted.
pub fn search(challenge_bytes: &[u8], difficulty: Difficulty) -> Option<u64> {
    (0..=u64::MAX).find(|&counter| verify_pow(challenge_bytes, counter, difficulty))
}
