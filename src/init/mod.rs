//! Initial centroid selection.
//!
//! An [`Initializer`] picks `k` starting centroids from the unique points of
//! a dataset. The deterministic strategies both start from the mode (the most
//! frequent unique point) and spread the remaining picks away from it:
//!
//! - [`FarthestFirst`]: greedy farthest-first traversal by summed distance.
//! - [`UniformModeDistance`]: points evenly spaced by distance to the mode.
//! - [`RandomSample`]: seeded sampling without replacement, the baseline the
//!   other two are measured against.

mod fft;
mod random;
mod uniform_mode;

pub use fft::FarthestFirst;
pub use random::RandomSample;
pub use uniform_mode::UniformModeDistance;

use crate::distance::DistanceMetric;
use crate::error::{ClusterError, Result};

/// Strategy producing `k` initial centroids from unique points and their counts.
pub trait Initializer<const D: usize> {
    /// Select exactly `k` centroids.
    ///
    /// `points` and `counts` are parallel slices. Fails with
    /// [`ClusterError::TooManyClusters`] when `k > points.len()`.
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        metric: &M,
    ) -> Result<Vec<[f32; D]>>;

    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;
}

impl<const D: usize, I: Initializer<D>> Initializer<D> for &I {
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        metric: &M,
    ) -> Result<Vec<[f32; D]>> {
        (**self).select(points, counts, k, metric)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Index of the highest count. Ties go to the first index.
pub fn mode_index(counts: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (i, &c) in counts.iter().enumerate() {
        match best {
            Some((_, bc)) if c <= bc => {}
            _ => best = Some((i, c)),
        }
    }
    best.map(|(i, _)| i)
}

/// The most frequent point, ties to the first encountered.
pub fn get_mode<const D: usize>(points: &[[f32; D]], counts: &[u32]) -> Option<[f32; D]> {
    mode_index(counts).and_then(|i| points.get(i).copied())
}

/// Preconditions shared by every initializer.
pub(crate) fn check_selection(points_len: usize, counts_len: usize, k: usize) -> Result<()> {
    if points_len != counts_len {
        return Err(ClusterError::DimensionMismatch {
            expected: points_len,
            found: counts_len,
        });
    }
    if k == 0 {
        return Err(ClusterError::ZeroClusters);
    }
    if k > points_len {
        return Err(ClusterError::TooManyClusters {
            k,
            available: points_len,
        });
    }
    Ok(())
}
