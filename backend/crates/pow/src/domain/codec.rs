//! Wire encoding for challenges and solutions.
//!
//! Challenge v1 is a fixed 42-byte record, integers big-endian:
//!
//! | offset | size | field                       |
//! |--------|------|-----------------------------|
//! | 0      | 1    | version                     |
//! | 1      | 1    | difficulty bits             |
//! | 2      | 8    | issued-at, Unix ms (i64)    |
//! | 10     | 16   | random seed                 |
//! | 26     | 16   | resource id (UUID bytes)    |
//!
//! A solution is the counter as an 8-byte big-endian u64.

use kernel::id::ResourceId;

use crate::domain::entities::{CHALLENGE_VERSION, Challenge, SEED_LEN, Solution};
use crate::domain::value_objects::Difficulty;
use crate::error::{PowError, PowResult};

pub const CHALLENGE_LEN: usize = 1 + 1 + 8 + SEED_LEN + ResourceId::LEN;
pub const SOLUTION_LEN: usize = 8;

const ISSUED_AT: std::ops::Range<usize> = 2..10;
const SEED: std::ops::Range<usize> = 10..10 + SEED_LEN;
const RESOURCE: std::ops::Range<usize> = 10 + SEED_LEN..CHALLENGE_LEN;

impl Challenge {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CHALLENGE_LEN);
        buf.push(self.version);
        buf.push(self.difficulty.bits());
        buf.extend_from_slice(&self.issued_at_ms.to_be_bytes());
        buf.extend_from_slice(&self.seed);
        buf.extend_from_slice(self.resource.as_bytes());
        buf
    }

    /// Decode a challenge, checking the version before the layout.
    pub fn decode(bytes: &[u8]) -> PowResult<Self> {
        let version = *bytes
            .first()
            .ok_or(PowError::MalformedChallenge("empty challenge"))?;
        if version != CHALLENGE_VERSION {
            return Err(PowError::UnsupportedVersion(version));
        }
        if bytes.len() != CHALLENGE_LEN {
            return Err(PowError::MalformedChallenge("unexpected length"));
        }

        let difficulty = Difficulty::new(bytes[1])
            .ok_or(PowError::MalformedChallenge("difficulty out of range"))?;
        let issued_at_ms = i64::from_be_bytes(fixed(&bytes[ISSUED_AT])?);
        let seed = fixed(&bytes[SEED])?;
        let resource = ResourceId::from_bytes(fixed(&bytes[RESOURCE])?);

        Ok(Self {
            version,
            difficulty,
            issued_at_ms,
            seed,
            resource,
        })
    }
}

impl Solution {
    pub fn encode(&self) -> [u8; SOLUTION_LEN] {
        self.counter.to_be_bytes()
    }

    pub fn decode(bytes: &[u8]) -> PowResult<Self> {
        let counter = <[u8; SOLUTION_LEN]>::try_from(bytes).map_err(|_| {
            PowError::MalformedSolution {
                expected: SOLUTION_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self::new(u64::from_be_bytes(counter)))
    }
}

fn fixed<const N: usize>(slice: &[u8]) -> PowResult<[u8; N]> {
    slice
        .try_into()
        .map_err(|_| PowError::MalformedChallenge("truncated field"))
}
