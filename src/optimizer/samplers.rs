//! Candidate designs for the hyperparameter search

use super::search_space::{SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Space-filling Latin hypercube
    LatinHypercube,
    /// Independent uniform draws
    Random,
}

impl Default for SamplerType {
    fn default() -> Self {
        SamplerType::LatinHypercube
    }
}

impl SamplerType {
    pub fn name(&self) -> &'static str {
        match self {
            SamplerType::LatinHypercube => "latin_hypercube",
            SamplerType::Random => "random",
        }
    }
}

/// Produces the full candidate set up front; the search is non-adaptive
pub trait Sampler: Send + Sync {
    /// Draw up to `n` distinct configurations
    fn design(&mut self, search_space: &SearchSpace, n: usize) -> Vec<TrialParams>;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn design(&mut self, search_space: &SearchSpace, n: usize) -> Vec<TrialParams> {
        let candidates = (0..n).map(|_| search_space.sample(&mut self.rng)).collect();
        dedup(candidates)
    }
}

/// Latin hypercube sampler.
///
/// Every parameter axis is cut into `n` equal strata and each stratum is
/// used by exactly one candidate, with the pairing shuffled per axis.
#[derive(Debug)]
pub struct LatinHypercubeSampler {
    rng: Xoshiro256PlusPlus,
}

impl LatinHypercubeSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Points in the unit hypercube, one row per candidate
    pub fn unit_design(&mut self, n_dims: usize, n: usize) -> Vec<Vec<f64>> {
        let mut points = vec![vec![0.0; n_dims]; n];
        for dim in 0..n_dims {
            let mut strata: Vec<usize> = (0..n).collect();
            strata.shuffle(&mut self.rng);
            for (point, stratum) in points.iter_mut().zip(strata) {
                point[dim] = (stratum as f64 + self.rng.gen::<f64>()) / n as f64;
            }
        }
        points
    }
}

impl Sampler for LatinHypercubeSampler {
    fn design(&mut self, search_space: &SearchSpace, n: usize) -> Vec<TrialParams> {
        let candidates = self
            .unit_design(search_space.len(), n)
            .iter()
            .map(|point| search_space.from_unit(point))
            .collect();
        dedup(candidates)
    }
}

/// Integer and categorical axes can collide; keep first occurrences
fn dedup(candidates: Vec<TrialParams>) -> Vec<TrialParams> {
    let mut unique: Vec<TrialParams> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !unique.contains(&c) {
            unique.push(c);
        }
    }
    unique
}

/// Create a sampler from type
pub fn create_sampler(sampler_type: SamplerType, seed: u64) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::LatinHypercube => Box::new(LatinHypercubeSampler::new(seed)),
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_stratum_used_once() {
        let mut sampler = LatinHypercubeSampler::new(3);
        let n = 20;
        let points = sampler.unit_design(3, n);
        for dim in 0..3 {
            let mut strata: Vec<usize> = points.iter().map(|p| (p[dim] * n as f64).floor() as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_design_is_seeded() {
        let space = SearchSpace::new().int("trees", 1, 2000).float("sample_size", 0.1, 1.0);
        let a = create_sampler(SamplerType::LatinHypercube, 11).design(&space, 30);
        let b = create_sampler(SamplerType::LatinHypercube, 11).design(&space, 30);
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
    }

    #[test]
    fn test_small_grid_deduplicates() {
        let space = SearchSpace::new().int("mtry", 1, 4);
        let design = create_sampler(SamplerType::LatinHypercube, 0).design(&space, 100);
        assert_eq!(design.len(), 4);

        let random = create_sampler(SamplerType::Random, 0).design(&space, 100);
        assert!(random.len() <= 4);
    }
}
