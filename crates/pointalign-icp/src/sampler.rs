use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the data point indices visited by the correspondence search.
pub trait IndexSampler {
    /// Draw `count` indices in `0..population`.
    fn sample(&mut self, population: usize, count: usize) -> Vec<usize>;
}

/// Uniform sampling with replacement.
///
/// When `count` covers the whole population every index is returned once, in
/// order.
#[derive(Debug, Clone)]
pub struct UniformSampler<R: Rng> {
    rng: R,
}

impl<R: Rng> UniformSampler<R> {
    /// Create a sampler drawing from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl UniformSampler<StdRng> {
    /// Create a reproducible sampler from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Create a sampler seeded from the thread rng.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_rng(&mut rand::rng()))
    }
}

impl<R: Rng> IndexSampler for UniformSampler<R> {
    fn sample(&mut self, population: usize, count: usize) -> Vec<usize> {
        if population == 0 {
            return Vec::new();
        }
        if count >= population {
            return (0..population).collect();
        }
        (0..count)
            .map(|_| self.rng.random_range(0..population))
            .collect()
    }
}

/// Replays a fixed sequence of indices, cycling when exhausted.
///
/// Indices are reduced modulo the population.
#[derive(Debug, Clone)]
pub struct SequenceSampler {
    indices: Vec<usize>,
    cursor: usize,
}

impl SequenceSampler {
    /// Create a sampler replaying `indices`.
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices, cursor: 0 }
    }
}

impl IndexSampler for SequenceSampler {
    fn sample(&mut self, population: usize, count: usize) -> Vec<usize> {
        if population == 0 || self.indices.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.indices[self.cursor] % population);
            self.cursor = (self.cursor + 1) % self.indices.len();
        }
        out
    }
}

impl<S: IndexSampler + ?Sized> IndexSampler for &mut S {
    fn sample(&mut self, population: usize, count: usize) -> Vec<usize> {
        (**self).sample(population, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_full_pass() {
        let mut sampler = UniformSampler::seeded(7);
        assert_eq!(sampler.sample(5, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(sampler.sample(5, 8), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_uniform_partial() {
        let mut sampler = UniformSampler::seeded(7);
        let indices = sampler.sample(100, 30);
        assert_eq!(indices.len(), 30);
        assert!(indices.iter().all(|&i| i < 100));

        // same seed, same draw
        let mut other = UniformSampler::seeded(7);
        assert_eq!(other.sample(100, 30), indices);
    }

    #[test]
    fn test_uniform_empty_population() {
        let mut sampler = UniformSampler::seeded(0);
        assert!(sampler.sample(0, 3).is_empty());
    }

    #[test]
    fn test_sequence_cycles() {
        let mut sampler = SequenceSampler::new(vec![1, 3, 7]);
        assert_eq!(sampler.sample(5, 4), vec![1, 3, 2, 1]);
        assert_eq!(sampler.sample(10, 2), vec![3, 7]);
    }
}
