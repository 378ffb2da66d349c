use tracing::{debug, trace};

use super::{Initializer, check_selection, mode_index};
use crate::distance::DistanceMetric;
use crate::error::{ClusterError, Result};

/// Uniform Mode Distance Initialization (UMDI).
///
/// Ranks every unique point by its distance to the mode and picks points
/// whose distances are spaced at least `thresh` apart, starting from the mode
/// itself. The initial spacing is `spread * max_dist / k`; a spread below 1
/// keeps the few farthest outliers from dictating the spacing. When a walk
/// over the ranked points yields fewer than `k` picks, `thresh` is scaled by
/// `relax` and the walk restarts from the nearest point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformModeDistance {
    spread: f32,
    relax: f32,
}

impl Default for UniformModeDistance {
    fn default() -> Self {
        Self {
            spread: 0.8,
            relax: 0.8,
        }
    }
}

impl UniformModeDistance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of the largest mode distance divided among the `k` picks.
    pub fn with_spread(mut self, spread: f32) -> Result<Self> {
        self.spread = check_factor("spread", spread)?;
        Ok(self)
    }

    /// Factor applied to the spacing after a walk comes up short.
    pub fn with_relax(mut self, relax: f32) -> Result<Self> {
        self.relax = check_factor("relax", relax)?;
        Ok(self)
    }

    pub fn spread(&self) -> f32 {
        self.spread
    }

    pub fn relax(&self) -> f32 {
        self.relax
    }
}

fn check_factor(name: &'static str, value: f32) -> Result<f32> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(ClusterError::InvalidFactor { name, value })
    }
}

/// One pass over `ranked` (ascending by distance) picking evenly spaced points.
/// Stops as soon as `k` points (mode included) are picked.
fn spaced_walk(ranked: &[(usize, f32)], mode: usize, k: usize, thresh: f32, out: &mut Vec<usize>) {
    out.clear();
    out.push(mode);
    let mut last = 0.0f32;
    for &(idx, dist) in ranked {
        if out.len() == k {
            break;
        }
        if idx == mode {
            continue;
        }
        if dist >= last + thresh {
            last = dist;
            out.push(idx);
        }
    }
}

impl<const D: usize> Initializer<D> for UniformModeDistance {
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        metric: &M,
    ) -> Result<Vec<[f32; D]>> {
        check_selection(points.len(), counts.len(), k)?;

        let mode = mode_index(counts).unwrap_or(0);
        let distances = metric.distance_many(&points[mode], points);
        let max_dist = distances.iter().copied().fold(0.0f32, f32::max);

        // Stable sort keeps unique order among equal distances.
        let mut ranked: Vec<(usize, f32)> = distances.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(core::cmp::Ordering::Equal));

        let mut thresh = self.spread * max_dist / k as f32;
        let mut picked = Vec::with_capacity(k);
        let mut walks = 0usize;

        loop {
            walks += 1;
            spaced_walk(&ranked, mode, k, thresh, &mut picked);
            trace!(walks, thresh, picked = picked.len(), "uniform mode distance walk");
            if picked.len() == k {
                break;
            }
            // With thresh at 0 every remaining point passes (ranked is
            // ascending), so k <= points.len() always ends here.
            thresh = if thresh > f32::MIN_POSITIVE {
                thresh * self.relax
            } else {
                0.0
            };
        }

        debug!(k, max_dist, thresh, walks, "uniform mode distance selection");

        Ok(picked.into_iter().map(|i| points[i]).collect())
    }

    fn name(&self) -> &'static str {
        "umdi"
    }
}
