//! Batch k-means over the unique points of a dataset.
//!
//! Every unique point carries its multiplicity, so one pass over `M` unique
//! points stands in for a pass over all `N` original points. An iteration is
//! an update (count-weighted means) followed by a fresh assignment of every
//! unique point to its nearest centroid, which also yields the MSE for the
//! new centroids.
//!
//! A run stops on the first of:
//! 1. no centroid coordinate moved by `epsilon` or more,
//! 2. the MSE did not drop by more than `epsilon`,
//! 3. the relative MSE improvement fell below `min_relative_gain`,
//! 4. `max_iterations` committed iterations.
//!
//! An iteration whose MSE is higher than the previous one is discarded, so
//! the reported MSE history never increases.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::distance::{DistanceMetric, nearest};
use crate::error::{ClusterError, Result};
use crate::init::{Initializer, check_selection};
use crate::unique::UniqueSet;

/// Tuning for a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Upper bound on committed iterations. Reaching it is not an error.
    pub max_iterations: usize,
    /// Centroid movement and MSE delta below this count as no change.
    pub epsilon: f32,
    /// Relative MSE improvement below this stops the run.
    pub min_relative_gain: f64,
    /// Run the assign, update and MSE phases on the rayon pool.
    /// Ignored without the `parallel` feature.
    pub parallel: bool,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            epsilon: f32::EPSILON,
            min_relative_gain: 0.001,
            parallel: true,
        }
    }
}

impl KMeansConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn min_relative_gain(mut self, gain: f64) -> Self {
        self.min_relative_gain = gain;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Centroids stopped moving.
    Converged,
    /// MSE failed to decrease.
    MseStalled,
    /// MSE decreased by less than the relative threshold.
    RelativeGainBelowThreshold,
    /// Iteration bound reached.
    MaxIterations,
}

/// Output of a k-means run over unique points.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering<const D: usize> {
    /// Final centroids, `k` of them.
    pub centroids: Vec<[f32; D]>,
    /// Cluster of each unique point.
    pub assignment: Vec<usize>,
    /// Count-weighted mean squared distance to the assigned centroid.
    pub mse: f64,
    /// Committed update iterations.
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// MSE before the first update, then after each committed iteration.
    pub mse_history: Vec<f64>,
}

/// k-means engine, generic over the distance metric and the initializer.
#[derive(Debug, Clone)]
pub struct KMeans<Mt, I> {
    metric: Mt,
    init: I,
    config: KMeansConfig,
}

impl<Mt, I> KMeans<Mt, I> {
    pub fn new(metric: Mt, init: I) -> Self {
        Self {
            metric,
            init,
            config: KMeansConfig::default(),
        }
    }

    pub fn with_config(mut self, config: KMeansConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    pub fn metric(&self) -> &Mt {
        &self.metric
    }

    pub fn initializer(&self) -> &I {
        &self.init
    }

    /// Cluster the unique points of `unique` into `k` clusters.
    pub fn run<S, const D: usize>(&self, unique: &UniqueSet<S, D>, k: usize) -> Result<Clustering<D>>
    where
        Mt: DistanceMetric<D>,
        I: Initializer<D>,
    {
        self.fit(unique.coords(), unique.counts(), k, None)
    }

    /// Like [`run`](Self::run), checking `cancel` before every iteration.
    pub fn run_with_cancel<S, const D: usize>(
        &self,
        unique: &UniqueSet<S, D>,
        k: usize,
        cancel: &AtomicBool,
    ) -> Result<Clustering<D>>
    where
        Mt: DistanceMetric<D>,
        I: Initializer<D>,
    {
        self.fit(unique.coords(), unique.counts(), k, Some(cancel))
    }

    /// Cluster already-deduplicated `points` with multiplicities `counts`.
    pub fn fit<const D: usize>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        cancel: Option<&AtomicBool>,
    ) -> Result<Clustering<D>>
    where
        Mt: DistanceMetric<D>,
        I: Initializer<D>,
    {
        check_selection(points.len(), counts.len(), k)?;

        let centroids = self.init.select(points, counts, k, &self.metric)?;
        if centroids.len() != k {
            return Err(ClusterError::DimensionMismatch {
                expected: k,
                found: centroids.len(),
            });
        }
        self.fit_from(points, counts, centroids, cancel)
    }

    /// Iterate from caller-provided initial centroids, skipping the initializer.
    pub fn fit_from<const D: usize>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        centroids: Vec<[f32; D]>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Clustering<D>>
    where
        Mt: DistanceMetric<D>,
        I: Initializer<D>,
    {
        let k = centroids.len();
        check_selection(points.len(), counts.len(), k)?;

        let run = Run {
            points,
            counts,
            total: counts.iter().map(|&c| u64::from(c)).sum(),
            metric: &self.metric,
            parallel: self.config.parallel,
        };
        let result = run.iterate(centroids, &self.config, cancel)?;

        debug!(
            init = self.init.name(),
            k,
            unique = points.len(),
            iterations = result.iterations,
            mse = result.mse,
            stop = ?result.stop_reason,
            "k-means finished"
        );

        Ok(result)
    }
}

/// Per-run context: the data being clustered and how to measure it.
struct Run<'a, Mt, const D: usize> {
    points: &'a [[f32; D]],
    counts: &'a [u32],
    total: u64,
    metric: &'a Mt,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
}

impl<Mt: DistanceMetric<D>, const D: usize> Run<'_, Mt, D> {
    fn iterate(
        &self,
        mut centroids: Vec<[f32; D]>,
        config: &KMeansConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<Clustering<D>> {
        let m = self.points.len();
        let k = centroids.len();
        let eps = config.epsilon;

        let mut assignment = vec![0usize; m];
        let mut dists = vec![0.0f32; m];
        self.assign(&centroids, &mut assignment, &mut dists);
        let mut mse = self.mse(&dists);
        let mut history = vec![mse];

        let mut next_assignment = vec![0usize; m];
        let mut next_dists = vec![0.0f32; m];
        let mut iterations = 0usize;

        let stop_reason = loop {
            if iterations >= config.max_iterations {
                break StopReason::MaxIterations;
            }
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(ClusterError::Cancelled { iterations });
            }

            let members = members_per_cluster(&assignment, k);
            let next = self.update(&centroids, &members);
            let shift = max_shift(&centroids, &next);

            self.assign(&next, &mut next_assignment, &mut next_dists);
            let next_mse = self.mse(&next_dists);

            if next_mse > mse {
                trace!(iteration = iterations + 1, mse, next_mse, "discarding iteration, mse rose");
                break StopReason::MseStalled;
            }

            centroids = next;
            std::mem::swap(&mut assignment, &mut next_assignment);
            std::mem::swap(&mut dists, &mut next_dists);
            let prev = mse;
            mse = next_mse;
            history.push(mse);
            iterations += 1;

            trace!(iteration = iterations, mse, shift, "k-means iteration");

            if shift < eps {
                break StopReason::Converged;
            }
            if mse >= prev - f64::from(eps) {
                break StopReason::MseStalled;
            }
            let relative = (mse - prev) / prev;
            if relative >= 0.0 || relative.abs() < config.min_relative_gain {
                break StopReason::RelativeGainBelowThreshold;
            }
        };

        Ok(Clustering {
            centroids,
            assignment,
            mse,
            iterations,
            stop_reason,
            mse_history: history,
        })
    }

    /// Nearest centroid (ties to the lowest index) and its distance, per point.
    fn assign(&self, centroids: &[[f32; D]], assignment: &mut [usize], dists: &mut [f32]) {
        #[cfg(feature = "parallel")]
        if self.parallel {
            assignment
                .par_iter_mut()
                .zip(dists.par_iter_mut())
                .zip(self.points.par_iter())
                .for_each(|((a, d), p)| {
                    (*a, *d) = nearest(self.metric, p, centroids);
                });
            return;
        }

        for ((a, d), p) in assignment.iter_mut().zip(dists.iter_mut()).zip(self.points) {
            (*a, *d) = nearest(self.metric, p, centroids);
        }
    }

    /// Count-weighted means, each seeded with its previous centroid at weight 1.
    ///
    /// The seed keeps empty clusters at their previous position and keeps the
    /// divisor positive.
    fn update(&self, centroids: &[[f32; D]], members: &[Vec<usize>]) -> Vec<[f32; D]> {
        #[cfg(feature = "parallel")]
        if self.parallel {
            return centroids
                .par_iter()
                .zip(members.par_iter())
                .map(|(prev, idx)| self.seeded_mean(prev, idx))
                .collect();
        }

        centroids
            .iter()
            .zip(members)
            .map(|(prev, idx)| self.seeded_mean(prev, idx))
            .collect()
    }

    fn seeded_mean(&self, prev: &[f32; D], members: &[usize]) -> [f32; D] {
        let mut sums = prev.map(f64::from);
        let mut weight = 1.0f64;
        for &i in members {
            let w = f64::from(self.counts[i]);
            for (s, &c) in sums.iter_mut().zip(self.points[i].iter()) {
                *s += f64::from(c) * w;
            }
            weight += w;
        }
        sums.map(|s| (s / weight) as f32)
    }

    /// Σ count · distance² over unique points, divided by the total count.
    /// Summed sequentially so the result does not depend on thread scheduling.
    fn mse(&self, dists: &[f32]) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let sum: f64 = dists
            .iter()
            .zip(self.counts)
            .map(|(&d, &c)| {
                let d = f64::from(d);
                f64::from(c) * d * d
            })
            .sum();
        sum / self.total as f64
    }
}

/// Unique point indices per cluster, ascending.
fn members_per_cluster(assignment: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); k];
    for (i, &c) in assignment.iter().enumerate() {
        members[c].push(i);
    }
    members
}

/// Largest per-coordinate movement between two centroid sets.
fn max_shift<const D: usize>(old: &[[f32; D]], new: &[[f32; D]]) -> f32 {
    old.iter()
        .zip(new)
        .flat_map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()))
        .fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{Euclidean, RgbDistance};
    use crate::init::{FarthestFirst, UniformModeDistance};
    use crate::unique::dedupe;

    fn two_blobs() -> Vec<[u8; 3]> {
        let mut pixels = Vec::new();
        for i in 0..20u8 {
            pixels.push([i % 5, i % 3, i % 4]);
            pixels.push([200 + i % 5, 190 + i % 3, 210 + i % 4]);
        }
        pixels
    }

    #[test]
    fn separates_two_blobs() {
        let pixels = two_blobs();
        let unique = dedupe(&pixels);
        let result = KMeans::new(RgbDistance, FarthestFirst).run(&unique, 2).unwrap();

        assert_eq!(result.centroids.len(), 2);
        let dark = result.centroids.iter().filter(|c| c[0] < 100.0).count();
        assert_eq!(dark, 1);
        for (u, sample) in unique.samples().iter().enumerate() {
            let c = result.centroids[result.assignment[u]];
            assert_eq!(sample[0] < 100, c[0] < 100.0);
        }
    }

    #[test]
    fn k_equal_unique_count_gives_zero_mse() {
        let pixels = [[1u8, 2, 3], [40, 50, 60], [1, 2, 3], [200, 100, 0]];
        let unique = dedupe(&pixels);
        let result = KMeans::new(RgbDistance, FarthestFirst).run(&unique, 3).unwrap();
        assert_eq!(result.mse, 0.0);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.stop_reason, StopReason::Converged);
        for p in unique.coords() {
            assert!(result.centroids.contains(p));
        }
    }

    #[test]
    fn too_many_clusters() {
        let pixels = [[1u8, 2, 3], [1, 2, 3], [4, 5, 6]];
        let unique = dedupe(&pixels);
        assert_eq!(
            KMeans::new(RgbDistance, FarthestFirst).run(&unique, 3),
            Err(ClusterError::TooManyClusters { k: 3, available: 2 })
        );
    }

    #[test]
    fn zero_clusters() {
        let unique = dedupe(&[[0u8, 0, 0]]);
        assert_eq!(
            KMeans::new(RgbDistance, FarthestFirst).run(&unique, 0),
            Err(ClusterError::ZeroClusters)
        );
    }

    #[test]
    fn mse_history_non_increasing() {
        let pixels: Vec<[u8; 3]> = (0..400u32)
            .map(|i| {
                let h = i.wrapping_mul(2654435761);
                [(h >> 24) as u8, (h >> 16) as u8, (h >> 8) as u8]
            })
            .collect();
        let unique = dedupe(&pixels);
        let result = KMeans::new(RgbDistance, UniformModeDistance::default())
            .run(&unique, 8)
            .unwrap();
        for w in result.mse_history.windows(2) {
            assert!(w[1] <= w[0], "mse rose: {} -> {}", w[0], w[1]);
        }
        assert_eq!(result.mse_history.len(), result.iterations + 1);
        assert_eq!(*result.mse_history.last().unwrap(), result.mse);
    }

    #[test]
    fn empty_cluster_keeps_previous_centroid() {
        let run = Run {
            points: &[[0.0f32, 0.0], [1.0, 1.0]],
            counts: &[3, 1],
            total: 4,
            metric: &Euclidean,
            parallel: false,
        };
        let centroids = [[0.0f32, 0.0], [9.0, 9.0]];
        let members = vec![vec![0, 1], vec![]];
        let next = run.update(&centroids, &members);
        assert_eq!(next[1], [9.0, 9.0]);
        // (prev 0 + 3*0 + 1*1) / (1 + 3 + 1)
        assert!((next[0][0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parallel_matches_sequential() {
        let pixels: Vec<[u8; 3]> = (0..2000u32)
            .map(|i| {
                let h = i.wrapping_mul(2246822519);
                [(h >> 24) as u8, (h >> 13) as u8, (h >> 5) as u8]
            })
            .collect();
        let unique = dedupe(&pixels);
        let seq = KMeans::new(RgbDistance, FarthestFirst)
            .with_config(KMeansConfig::new().parallel(false))
            .run(&unique, 16)
            .unwrap();
        let par = KMeans::new(RgbDistance, FarthestFirst)
            .with_config(KMeansConfig::new().parallel(true))
            .run(&unique, 16)
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn max_iterations_bound() {
        let pixels: Vec<[u8; 3]> = (0..300u32).map(|i| [i as u8, (i * 7) as u8, (i * 13) as u8]).collect();
        let unique = dedupe(&pixels);
        let result = KMeans::new(RgbDistance, FarthestFirst)
            .with_config(KMeansConfig::new().max_iterations(1).min_relative_gain(0.0))
            .run(&unique, 4)
            .unwrap();
        assert!(result.iterations <= 1);
    }

    #[test]
    fn cancel_before_first_iteration() {
        let pixels: Vec<[u8; 3]> = (0..50u8).map(|i| [i, i, i]).collect();
        let unique = dedupe(&pixels);
        let cancel = AtomicBool::new(true);
        assert_eq!(
            KMeans::new(RgbDistance, FarthestFirst).run_with_cancel(&unique, 4, &cancel),
            Err(ClusterError::Cancelled { iterations: 0 })
        );
    }

    /// 0 for identical points, 1 otherwise. Means do not minimize it, so an
    /// update can leave the MSE flat or raise it.
    struct Discrete;

    impl<const D: usize> DistanceMetric<D> for Discrete {
        fn distance(&self, a: &[f32; D], b: &[f32; D]) -> f32 {
            if a == b { 0.0 } else { 1.0 }
        }
    }

    fn sequential() -> KMeansConfig {
        KMeansConfig::new().parallel(false)
    }

    #[test]
    fn rising_mse_discards_iteration() {
        // mse 0.25 with the centroid on the heavy point; the update moves it
        // to 2.0, off both points, and the mse would rise to 1.0.
        let points = [[0.0f32], [10.0]];
        let result = KMeans::new(Discrete, FarthestFirst)
            .with_config(sequential())
            .fit_from(&points, &[3, 1], vec![[0.0]], None)
            .unwrap();
        assert_eq!(result.stop_reason, StopReason::MseStalled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.centroids, vec![[0.0]]);
        assert_eq!(result.mse, 0.25);
        assert_eq!(result.mse_history, vec![0.25]);
        assert_eq!(result.assignment, vec![0, 0]);
    }

    #[test]
    fn flat_mse_stalls_after_commit() {
        // The centroid moves from 4 to 14/3 but neither point is hit, so the
        // mse stays at 1.0.
        let points = [[0.0f32], [10.0]];
        let result = KMeans::new(Discrete, FarthestFirst)
            .with_config(sequential())
            .fit_from(&points, &[1, 1], vec![[4.0]], None)
            .unwrap();
        assert_eq!(result.stop_reason, StopReason::MseStalled);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.mse_history, vec![1.0, 1.0]);
        assert!((result.centroids[0][0] - 14.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn small_relative_gain_stops() {
        // Centroids [0], [1] -> [0], [5.75]; mse 45.25 -> 11.65625, a 74%
        // improvement, below the 90% bar.
        let points = [[0.0f32], [1.0], [10.0], [11.0]];
        let counts = [1, 1, 1, 1];
        let result = KMeans::new(Euclidean, FarthestFirst)
            .with_config(sequential().min_relative_gain(0.9))
            .fit_from(&points, &counts, vec![[0.0], [1.0]], None)
            .unwrap();
        assert_eq!(result.stop_reason, StopReason::RelativeGainBelowThreshold);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.centroids, vec![[0.0], [5.75]]);
        assert_eq!(result.mse_history, vec![45.25, 11.65625]);
        assert_eq!(result.assignment, vec![0, 0, 1, 1]);

        // The same first step clears the default bar and the run continues.
        let full = KMeans::new(Euclidean, FarthestFirst)
            .with_config(sequential())
            .fit_from(&points, &counts, vec![[0.0], [1.0]], None)
            .unwrap();
        assert!(full.iterations > 1);
        assert!(full.mse < 11.65625);
    }

    #[test]
    fn ties_assign_lowest_index() {
        // Point at 1 is equidistant from centroids at 0 and 2.
        let points = [[0.0f32], [1.0], [2.0]];
        let run = Run {
            points: &points,
            counts: &[1, 1, 1],
            total: 3,
            metric: &Euclidean,
            parallel: false,
        };
        let mut assignment = vec![0; 3];
        let mut dists = vec![0.0; 3];
        run.assign(&[[0.0], [2.0]], &mut assignment, &mut dists);
        assert_eq!(assignment, vec![0, 0, 1]);
    }
}
