//! Random index generation shared by the samplers.

use rand::distributions::Uniform;
use rand::prelude::*;

/// Uniform integer generator drawing indices from an owned random source.
///
/// The source is any [`RngCore`]; passing `&mut StdRng` lets the caller keep
/// ownership of a seeded generator and replay it across calls.
pub struct UniformRandomGenerator<R = StdRng> {
    rng: R,
    dist: Uniform<usize>,
}

impl Default for UniformRandomGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformRandomGenerator<StdRng> {
    /// Construct with an entropy-seeded generator.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Construct with a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> UniformRandomGenerator<R> {
    /// Wrap an existing random source.
    pub fn from_rng(rng: R) -> Self {
        Self {
            rng,
            dist: Uniform::new_inclusive(0, 0),
        }
    }

    /// Reset the distribution to the inclusive range `[min, max]`.
    ///
    /// An empty range (`min > max`) is ignored.
    pub fn reset(&mut self, min: usize, max: usize) {
        if min <= max {
            self.dist = Uniform::new_inclusive(min, max);
        }
    }

    /// Draw a single value from the current range.
    pub fn next(&mut self) -> usize {
        self.dist.sample(&mut self.rng)
    }

    /// Fill `out` with distinct values drawn from `[min, max]`.
    ///
    /// Returns `false` without touching `out` if the range holds fewer values
    /// than requested.
    pub fn gen_unique(&mut self, out: &mut [usize], min: usize, max: usize) -> bool {
        if min > max || out.len() > max - min + 1 {
            return false;
        }
        self.reset(min, max);
        self.gen_unique_current(out);
        true
    }

    /// Fill `out` with distinct values from the range set by the last [`reset`](Self::reset).
    ///
    /// Rejection sampling; intended for minimal samples that are small
    /// compared to the range.
    pub fn gen_unique_current(&mut self, out: &mut [usize]) {
        for i in 0..out.len() {
            loop {
                let candidate = self.next();
                if out[..i].iter().all(|&v| v != candidate) {
                    out[i] = candidate;
                    break;
                }
            }
        }
    }
}
