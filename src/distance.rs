/// A distance between two `D`-channel points.
///
/// Implementations must return a non-negative value and `0.0` for identical
/// points. Symmetry and the triangle inequality are not required.
pub trait DistanceMetric<const D: usize>: Sync {
    fn distance(&self, a: &[f32; D], b: &[f32; D]) -> f32;

    /// Distances from `p` to each of `others`, in order.
    fn distance_many(&self, p: &[f32; D], others: &[[f32; D]]) -> Vec<f32> {
        let mut out = Vec::with_capacity(others.len());
        self.distance_many_into(p, others, &mut out);
        out
    }

    /// Same as [`distance_many`](Self::distance_many) but reuses `out`.
    fn distance_many_into(&self, p: &[f32; D], others: &[[f32; D]], out: &mut Vec<f32>) {
        out.clear();
        out.extend(others.iter().map(|o| self.distance(p, o)));
    }
}

impl<const D: usize, M: DistanceMetric<D>> DistanceMetric<D> for &M {
    #[inline]
    fn distance(&self, a: &[f32; D], b: &[f32; D]) -> f32 {
        (**self).distance(a, b)
    }

    fn distance_many_into(&self, p: &[f32; D], others: &[[f32; D]], out: &mut Vec<f32>) {
        (**self).distance_many_into(p, others, out)
    }
}

/// Perceptually weighted RGB distance.
///
/// Channel weights depend on the mean red level of the two colors:
/// `[2 + r̄/256, 4, 2 + (255 - r̄)/256]`. Channels are `0..=255` values
/// carried as `f32`, so differences are signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbDistance;

impl RgbDistance {
    /// Red mean is clamped to `0..=255` so every weight stays positive.
    #[inline(always)]
    fn weights(r_mean: f32) -> [f32; 3] {
        let r_mean = r_mean.clamp(0.0, 255.0);
        [2.0 + r_mean / 256.0, 4.0, 2.0 + (255.0 - r_mean) / 256.0]
    }
}

impl DistanceMetric<3> for RgbDistance {
    #[inline]
    fn distance(&self, a: &[f32; 3], b: &[f32; 3]) -> f32 {
        let r_mean = (a[0] + b[0]) / 2.0;
        let s = Self::weights(r_mean);
        let dr = a[0] - b[0];
        let dg = a[1] - b[1];
        let db = a[2] - b[2];
        (dr * dr * s[0] + dg * dg * s[1] + db * db * s[2]).sqrt()
    }

    // Same arithmetic as `distance`, kept in one loop so the red mean and
    // weights of `p` stay in registers.
    fn distance_many_into(&self, p: &[f32; 3], others: &[[f32; 3]], out: &mut Vec<f32>) {
        out.clear();
        out.reserve(others.len());
        for o in others {
            let r_mean = (p[0] + o[0]) / 2.0;
            let s = Self::weights(r_mean);
            let dr = p[0] - o[0];
            let dg = p[1] - o[1];
            let db = p[2] - o[2];
            out.push((dr * dr * s[0] + dg * dg * s[1] + db * db * s[2]).sqrt());
        }
    }
}

/// Plain Euclidean distance in any dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl<const D: usize> DistanceMetric<D> for Euclidean {
    #[inline]
    fn distance(&self, a: &[f32; D], b: &[f32; D]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

/// Index of the nearest of `centroids` to `p`. Ties go to the lowest index.
///
/// Returns `(index, distance)`; `centroids` must not be empty.
#[inline]
pub fn nearest<const D: usize, M: DistanceMetric<D> + ?Sized>(
    metric: &M,
    p: &[f32; D],
    centroids: &[[f32; D]],
) -> (usize, f32) {
    let mut best_idx = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = metric.distance(p, c);
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }
    (best_idx, best_dist)
}
