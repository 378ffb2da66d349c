use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Initializer, check_selection};
use crate::distance::DistanceMetric;
use crate::error::Result;

/// Uniform sampling of `k` distinct unique points, without replacement.
///
/// Ignores counts and the metric. The same seed always yields the same
/// selection for the same input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RandomSample {
    seed: u64,
}

impl RandomSample {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl<const D: usize> Initializer<D> for RandomSample {
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        _metric: &M,
    ) -> Result<Vec<[f32; D]>> {
        check_selection(points.len(), counts.len(), k)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let picks = rand::seq::index::sample(&mut rng, points.len(), k);
        Ok(picks.iter().map(|i| points[i]).collect())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
