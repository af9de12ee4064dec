//! Deterministic, seedable pseudo random number generator for grain scheduling.

use rand::{RngCore, SeedableRng};

// -------------------------------------------------------------------------------------------------

/// A small, fast, seedable pseudo random generator (mulberry32).
///
/// Two generators which got initialized with the same seed produce the exact same sequence of
/// values when called the same number of times. This makes grain schedules reproducible: the
/// same seed with the same settings renders the same take.
///
/// The generator also implements [`RngCore`] and [`SeedableRng`], so it can be used with all
/// distributions of the `rand` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    const INCREMENT: u32 = 0x6D2B_79F5;
    const NORMALIZER: f64 = 1.0 / 4_294_967_296.0; // 2^32

    /// Create a new generator with the given seed.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Re-initialize the generator with the given seed. The resulting sequence only depends
    /// on the seed and not on the generator's previous state.
    pub fn reset(&mut self, seed: u32) {
        self.state = seed;
    }

    /// Advance the state and return the next raw 32 bit value.
    #[inline]
    fn advance(&mut self) -> u32 {
        self.state = self.state.wrapping_add(Self::INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Next uniformly distributed value in range [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        self.advance() as f64 * Self::NORMALIZER
    }

    /// Next uniformly distributed value in range [min, max).
    #[inline]
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }

    /// Next uniformly distributed integer in range [min, max] (inclusive).
    pub fn range_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span).floor() as i64
    }

    /// Next normal distributed value with the given mean and standard deviation.
    /// Uses the Box-Muller transform and always consumes exactly two uniform values.
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        // 1 - u keeps the log argument in (0, 1]
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        mean + std_dev * z
    }

    /// Pick a random element from the given slice. Returns None for empty slices.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.range_int(0, items.len() as i64 - 1) as usize;
        items.get(index)
    }
}

impl Default for SeededRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        self.advance()
    }

    fn next_u64(&mut self) -> u64 {
        let low = self.advance() as u64;
        let high = self.advance() as u64;
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.advance().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

impl SeedableRng for SeededRng {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

// -------------------------------------------------------------------------------------------------

/// Draw a fresh, non deterministic seed from the thread local random generator.
/// Use this when a new take should sound different from the previous one.
pub fn random_seed() -> u32 {
    rand::random::<u32>()
}

// -------------------------------------------------------------------------------------------------
