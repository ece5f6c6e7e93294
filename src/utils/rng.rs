//! Simple random number generator for reproducibility.
//!
//! This module provides a lightweight xorshift-based PRNG that doesn't require
//! external dependencies, ensuring reproducible results across runs. All weight
//! initialization and shuffling in the crate draws from one seeded generator,
//! so a fixed seed reproduces a training run bit for bit.

/// Simple RNG for reproducibility without external crates.
///
/// Uses xorshift algorithm for fast, deterministic random number generation.
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / (u32::MAX as f32 + 1.0)
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32()
    }

    /// Sample from the standard normal distribution (mean 0, deviation 1).
    ///
    /// Uses the Box-Muller transform over two uniform samples. Deterministic
    /// for a given seed, which the weight-initialization tests rely on.
    pub fn next_gaussian(&mut self) -> f32 {
        let u1 = self.next_f32().max(f32::EPSILON); // keep ln() finite
        let u2 = self.next_f32();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            (self.next_u32() as usize) % upper
        }
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        if data.len() <= 1 {
            return;
        }
        for i in (1..data.len()).rev() {
            let j = self.gen_usize(i + 1);
            data.swap(i, j);
        }
    }

    /// Fisher-Yates shuffle applied to two parallel slices in lockstep.
    ///
    /// Both slices receive the identical permutation, preserving the pairing
    /// between elements at equal indices (e.g. images and their labels).
    ///
    /// # Panics
    ///
    /// Panics if the slices have different lengths.
    pub fn shuffle_parallel<A, B>(&mut self, first: &mut [A], second: &mut [B]) {
        assert_eq!(
            first.len(),
            second.len(),
            "parallel shuffle requires equal-length slices"
        );
        if first.len() <= 1 {
            return;
        }
        for i in (1..first.len()).rev() {
            let j = self.gen_usize(i + 1);
            first.swap(i, j);
            second.swap(i, j);
        }
    }
}
