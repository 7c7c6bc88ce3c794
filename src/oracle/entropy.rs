//! Pseudo-random capability index assignment.
//!
//! Indices are drawn from a seeded generator whose seed mixes the caller
//! identity, a monotonically increasing draw counter and an environmental
//! nonce. The draw is deterministic for a given environment, so tests can
//! pin it, while callers cannot predict it.

use crate::core::{now, sha3_256_multi, AccountId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the changing environmental nonce mixed into every seed.
pub trait EntropySource: Send {
    /// Next nonce value.
    fn nonce(&mut self) -> u64;
}

/// Nonce from the wall clock, in nanoseconds.
#[derive(Clone, Debug, Default)]
pub struct ClockEntropy;

impl EntropySource for ClockEntropy {
    fn nonce(&mut self) -> u64 {
        now().timestamp_nanos_opt().unwrap_or_default() as u64
    }
}

/// Constant nonce, for reproducible assignment.
#[derive(Clone, Debug)]
pub struct FixedEntropy(pub u64);

impl EntropySource for FixedEntropy {
    fn nonce(&mut self) -> u64 {
        self.0
    }
}

/// Draws one raw index below `range` for an identity.
pub trait IndexSource: Send {
    fn draw(&mut self, identity: &AccountId, range: u8) -> u8;
}

/// Default index source backed by a freshly seeded `StdRng` per draw.
pub struct SeededIndexSource {
    counter: u64,
    entropy: Box<dyn EntropySource>,
}

impl SeededIndexSource {
    /// Create a source over the given entropy.
    pub fn new(entropy: Box<dyn EntropySource>) -> Self {
        Self { counter: 0, entropy }
    }

    /// Number of draws made so far.
    pub fn draws(&self) -> u64 {
        self.counter
    }
}

impl Default for SeededIndexSource {
    fn default() -> Self {
        Self::new(Box::new(ClockEntropy))
    }
}

impl IndexSource for SeededIndexSource {
    fn draw(&mut self, identity: &AccountId, range: u8) -> u8 {
        let nonce = self.entropy.nonce();
        let seed = sha3_256_multi(&[
            identity.as_str().as_bytes(),
            &self.counter.to_le_bytes(),
            &nonce.to_le_bytes(),
        ]);
        self.counter += 1;

        let mut rng = StdRng::seed_from_u64(seed.low_u64());
        rng.gen_range(0..range)
    }
}

/// Turns raw draws into capability indices within a fixed range.
pub struct IndexGenerator {
    source: Box<dyn IndexSource>,
    range: u8,
}

impl IndexGenerator {
    /// Create a generator over `0..range`.
    pub fn new(source: Box<dyn IndexSource>, range: u8) -> Self {
        Self { source, range }
    }

    /// Size of the index range.
    pub fn range(&self) -> u8 {
        self.range
    }

    /// One index for `identity`.
    pub fn index(&mut self, identity: &AccountId) -> u8 {
        self.source.draw(identity, self.range) % self.range
    }

    /// `count` distinct indices for `identity`. A draw that collides with an
    /// earlier one is incremented (wrapping) until it is free.
    ///
    /// `count` must not exceed the range; the config validation enforces this.
    pub fn distinct(&mut self, identity: &AccountId, count: usize) -> Vec<u8> {
        let mut indices = Vec::with_capacity(count);
        while indices.len() < count {
            let mut candidate = self.index(identity);
            while indices.contains(&candidate) {
                candidate = (candidate + 1) % self.range;
            }
            indices.push(candidate);
        }
        indices
    }
}
