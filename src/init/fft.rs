use tracing::trace;

use super::{Initializer, check_selection, mode_index};
use crate::distance::DistanceMetric;
use crate::error::Result;

/// Deterministic farthest-first traversal seeded at the mode.
///
/// After the mode, each pick is the remaining point with the largest sum of
/// distances to every centroid picked so far. Ties go to the point that
/// comes first in unique order, so the output is fully determined by the
/// input order and the metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FarthestFirst;

impl<const D: usize> Initializer<D> for FarthestFirst {
    fn select<M: DistanceMetric<D>>(
        &self,
        points: &[[f32; D]],
        counts: &[u32],
        k: usize,
        metric: &M,
    ) -> Result<Vec<[f32; D]>> {
        check_selection(points.len(), counts.len(), k)?;

        // check_selection guarantees at least one point
        let start = mode_index(counts).unwrap_or(0);

        let mut taken = vec![false; points.len()];
        // Sum of distances from each point to every centroid picked so far.
        // Extended by one term per round, in pick order.
        let mut dist_sum = vec![0.0f64; points.len()];
        let mut selected = Vec::with_capacity(k);

        taken[start] = true;
        selected.push(points[start]);

        for round in 1..k {
            let last = selected[round - 1];
            let mut best: Option<(usize, f64)> = None;

            for (i, p) in points.iter().enumerate() {
                if taken[i] {
                    continue;
                }
                dist_sum[i] += f64::from(metric.distance(p, &last));
                match best {
                    Some((_, best_sum)) if dist_sum[i] <= best_sum => {}
                    _ => best = Some((i, dist_sum[i])),
                }
            }

            // k <= points.len() leaves at least one candidate per round
            let Some((idx, sum)) = best else {
                break;
            };
            trace!(round, idx, sum, "farthest-first pick");
            taken[idx] = true;
            selected.push(points[idx]);
        }

        Ok(selected)
    }

    fn name(&self) -> &'static str {
        "fft"
    }
}
