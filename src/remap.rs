use crate::sample::to_u8_channels;
use crate::unique::UniqueSet;

/// Spread per-unique cluster ids back onto every original index.
///
/// `assignment[u]` is the cluster of unique point `u`; the result holds one
/// cluster id per original point, in original order.
pub fn expand<S, const D: usize>(assignment: &[usize], unique: &UniqueSet<S, D>) -> Vec<usize> {
    expand_groups(assignment, unique.groups(), unique.total())
}

/// [`expand`] over raw index groups. `total` is the number of original points;
/// the groups must partition `0..total`.
pub fn expand_groups<'a>(
    assignment: &[usize],
    groups: impl IntoIterator<Item = &'a [usize]>,
    total: usize,
) -> Vec<usize> {
    let mut out = vec![0usize; total];
    for (&cluster, group) in assignment.iter().zip(groups) {
        for &i in group {
            out[i] = cluster;
        }
    }
    out
}

/// Number of points in each of `k` clusters.
pub fn cluster_sizes(assignment: &[usize], k: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; k];
    for &c in assignment {
        sizes[c] += 1;
    }
    sizes
}

/// Paint every point with its centroid, rounded to 8-bit channels.
pub fn render<const D: usize>(centroids: &[[f32; D]], assignment: &[usize]) -> Vec<[u8; D]> {
    let palette: Vec<[u8; D]> = centroids.iter().map(to_u8_channels).collect();
    assignment.iter().map(|&c| palette[c]).collect()
}
