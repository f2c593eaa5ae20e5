//! Hashcash solver and verifier.
//!
//! One [`Hashcash`] value serves both roles. On the server its difficulty is
//! what every issued challenge carries; on the client it is the ceiling above
//! which a challenge is refused.

use std::time::Duration;

use chrono::Utc;

use crate::domain::entities::{Challenge, Solution};
use crate::domain::services::{count_leading_zero_bits, compute_pow_hash, search};
use crate::domain::value_objects::Difficulty;
use crate::error::{PowError, PowResult};

/// Server side of the puzzle
pub trait Verifier: Send + Sync {
    fn difficulty(&self) -> Difficulty;

    /// A fresh challenge carrying this verifier's difficulty
    fn issue(&self) -> Challenge;

    /// Check a solution against the challenge bytes this verifier issued.
    ///
    /// O(1) in the difficulty: never searches.
    fn verify(&self, challenge: &[u8], solution: &[u8]) -> PowResult<()>;
}

/// Client side of the puzzle
pub trait Solver: Send + Sync {
    /// Brute-force a counter for the encoded challenge
    fn solve(&self, challenge: &[u8]) -> PowResult<Solution>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hashcash {
    difficulty: Difficulty,
    freshness: Duration,
}

impl Hashcash {
    pub fn new(bits: u8, freshness: Duration) -> PowResult<Self> {
        Ok(Self::with_difficulty(Difficulty::try_new(bits)?, freshness))
    }

    pub fn with_difficulty(difficulty: Difficulty, freshness: Duration) -> Self {
        Self {
            difficulty,
            freshness,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// [`Verifier::verify`] with an explicit clock
    pub fn verify_at(&self, challenge: &[u8], solution: &[u8], now_ms: i64) -> PowResult<()> {
        let decoded = Challenge::decode(challenge)?;
        if decoded.difficulty != self.difficulty {
            return Err(PowError::MalformedChallenge("difficulty mismatch"));
        }
        if !decoded.is_fresh_at(now_ms, self.freshness) {
            return Err(PowError::ExpiredChallenge);
        }

        let solution = Solution::decode(solution)?;
        let zeros = count_leading_zero_bits(&compute_pow_hash(challenge, solution.counter));
        if zeros < u32::from(self.difficulty.bits()) {
            return Err(PowError::InsufficientWork {
                required: self.difficulty.bits(),
                actual: zeros,
            });
        }
        Ok(())
    }
}

impl Default for Hashcash {
    fn default() -> Self {
        Self::with_difficulty(Difficulty::DEFAULT, Duration::from_secs(60))
    }
}

impl Verifier for Hashcash {
    fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    fn issue(&self) -> Challenge {
        Challenge::issue(self.difficulty)
    }

    fn verify(&self, challenge: &[u8], solution: &[u8]) -> PowResult<()> {
        self.verify_at(challenge, solution, Utc::now().timestamp_millis())
    }
}

impl Solver for Hashcash {
    fn solve(&self, challenge: &[u8]) -> PowResult<Solution> {
        let decoded = Challenge::decode(challenge)?;
        if decoded.difficulty > self.difficulty {
            return Err(PowError::DifficultyTooHigh {
                requested: decoded.difficulty.bits(),
                ceiling: self.difficulty.bits(),
            });
        }

        search(challenge, decoded.difficulty)
            .map(Solution::new)
            .ok_or(PowError::SearchExhausted)
    }
}
