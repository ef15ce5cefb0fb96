//! PROSAC sampler: progressively grows the subset of high-priority points.
//!
//! The data is assumed to be sorted by decreasing quality. The `k`-th sample
//! is drawn from the prefix of size `n` and always includes its newest
//! element `n - 1`; the prefix grows whenever `k` exceeds `T'_n`.
//! After `ransac_convergence_iterations` draws, or once the prefix covers the
//! whole data, sampling is uniform.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::core::Sampler;
use crate::types::DataMatrix;
use crate::utils::UniformRandomGenerator;

const DEFAULT_CONVERGENCE_ITERATIONS: usize = 100_000;

pub struct ProsacSampler<R = StdRng> {
    rng: UniformRandomGenerator<R>,
    /// `growth[m - 1]` is the last draw served by a prefix of size `m`.
    growth: Vec<usize>,
    point_number: usize,
    sample_size: usize,
    ransac_convergence_iterations: usize,
    kth_sample_number: usize,
    subset_size: usize,
}

impl Default for ProsacSampler<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProsacSampler<StdRng> {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy(), DEFAULT_CONVERGENCE_ITERATIONS)
    }

    /// Construct from a fixed seed.
    pub fn from_seed(seed: u64, ransac_convergence_iterations: usize) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), ransac_convergence_iterations)
    }
}

impl<R: RngCore> ProsacSampler<R> {
    /// Draw from a caller-provided random source.
    pub fn from_rng(rng: R, ransac_convergence_iterations: usize) -> Self {
        Self {
            rng: UniformRandomGenerator::from_rng(rng),
            growth: Vec::new(),
            point_number: 0,
            sample_size: 0,
            ransac_convergence_iterations,
            kth_sample_number: 0,
            subset_size: 0,
        }
    }

    /// Current prefix size.
    pub fn subset_size(&self) -> usize {
        self.subset_size
    }

    /// Restart the progression from the smallest prefix.
    pub fn reset(&mut self) {
        self.kth_sample_number = 0;
        self.subset_size = self.sample_size;
    }

    fn initialize(&mut self, point_number: usize, sample_size: usize) {
        self.point_number = point_number;
        self.sample_size = sample_size;
        self.growth = growth_function(
            point_number,
            sample_size,
            self.ransac_convergence_iterations,
        );
        self.reset();
    }

    fn is_uniform(&self) -> bool {
        self.kth_sample_number > self.ransac_convergence_iterations
            || self.subset_size >= self.point_number
    }
}

/// Growth function `T'_m` for every prefix size `m` in `1..=point_number`.
fn growth_function(point_number: usize, sample_size: usize, convergence: usize) -> Vec<usize> {
    let mut growth = vec![1usize; point_number];

    // T_s, the expected number of all-prefix samples among `convergence` draws.
    let mut t_n = convergence as f64;
    for i in 0..sample_size {
        t_n *= (sample_size - i) as f64 / (point_number - i) as f64;
    }

    let mut t_n_prime = 1usize;
    for (i, slot) in growth.iter_mut().enumerate().skip(sample_size) {
        let t_next = (i + 1) as f64 * t_n / (i + 1 - sample_size) as f64;
        t_n_prime += (t_next - t_n).ceil().max(0.0) as usize;
        *slot = t_n_prime;
        t_n = t_next;
    }
    growth
}

impl<R: RngCore> Sampler for ProsacSampler<R> {
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool {
        let n = data.nrows();
        if sample_size == 0 || sample_size > n || out_indices.len() < sample_size {
            return false;
        }
        if self.point_number != n || self.sample_size != sample_size {
            self.initialize(n, sample_size);
        }

        self.kth_sample_number += 1;
        let out = &mut out_indices[..sample_size];

        if !self.is_uniform() && self.kth_sample_number > self.growth[self.subset_size - 1] {
            self.subset_size += 1;
        }
        if self.is_uniform() {
            return self.rng.gen_unique(out, 0, n - 1);
        }

        let newest = self.subset_size - 1;
        let (rest, last) = out.split_at_mut(sample_size - 1);
        if !rest.is_empty() && !self.rng.gen_unique(rest, 0, newest - 1) {
            return false;
        }
        last[0] = newest;
        true
    }
}
