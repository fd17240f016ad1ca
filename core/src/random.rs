#![deny(missing_docs)]

//! # Random Source
//!
//! A seedable random number source threaded explicitly through merge
//! sampling and value generation. Two sources created from the same seed
//! produce the same sequence.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Deterministic, seedable randomness.
#[derive(Debug, Clone)]
pub struct RandomSource {
    seed: u64,
    rng: StdRng,
}

impl RandomSource {
    /// Creates a source seeded with `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derives an independent source, e.g. for a worker thread.
    pub fn fork(&mut self) -> Self {
        Self::seeded(self.rng.gen())
    }

    /// `amount` distinct indices below `len`, sorted ascending.
    pub fn sample_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        let mut picked = index::sample(&mut self.rng, len, amount.min(len)).into_vec();
        picked.sort_unstable();
        picked
    }

    /// A uniformly chosen element.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.rng.gen_range(0..items.len()))
        }
    }

    /// An integer in `[low, high]`.
    pub fn int_between(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            low
        } else {
            self.rng.gen_range(low..=high)
        }
    }

    /// A float in `[low, high)`.
    pub fn float_between(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            low
        } else {
            self.rng.gen_range(low..high)
        }
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Direct access to the generator.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::seeded(0)
    }
}
