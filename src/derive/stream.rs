//! Reproducible float stream (mulberry32).

use super::hash::seed_hash;

const INCREMENT: u32 = 0x6D2B_79F5;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Deterministic stream of values in `[0, 1)`.
///
/// Owned by whoever created it; never persisted. Rebuild it from the same
/// seed (or key) to replay the same sequence.
#[derive(Debug, Clone)]
pub struct DeterministicStream {
    state: u32,
}

impl DeterministicStream {
    /// Create a stream from a 32-bit seed
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Create a stream seeded from a string key
    pub fn from_key(key: &str) -> Self {
        Self::new(seed_hash(key))
    }

    /// Next raw 32-bit output
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / TWO_POW_32
    }
}
