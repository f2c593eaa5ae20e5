//! Domain Value Objects
//!
//! Immutable value types for the PoW domain.

use std::fmt;

use crate::error::{PowError, PowResult};

/// Difficulty level for PoW, in required leading zero bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const DEFAULT: Difficulty = Difficulty(20);
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 32; // Max practical difficulty

    pub fn new(bits: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&bits) {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub fn try_new(bits: u8) -> PowResult<Self> {
        Self::new(bits).ok_or(PowError::InvalidDifficulty(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Expected number of hash trials to find a solution
    pub fn expected_trials(&self) -> u64 {
        1u64 << self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}
