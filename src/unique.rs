use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::sample::Sample;

/// Deduplicated view of a dataset.
///
/// Unique samples are kept in first-encountered order. For each unique sample
/// the set stores its `f32` coordinates, its multiplicity, and the original
/// indices that map to it. Index groups live in one flat `members` array
/// addressed through `offsets` (unique `i` owns `members[offsets[i]..offsets[i + 1]]`).
#[derive(Debug, Clone)]
pub struct UniqueSet<S, const D: usize> {
    samples: Vec<S>,
    coords: Vec<[f32; D]>,
    counts: Vec<u32>,
    offsets: Vec<usize>,
    members: Vec<usize>,
}

impl<S: Sample<D>, const D: usize> UniqueSet<S, D> {
    /// Group `points` by exact equality.
    pub fn from_points(points: &[S]) -> Self {
        let mut slots: HashMap<S, usize> = HashMap::with_capacity(points.len().min(1 << 16));
        let mut samples = Vec::new();
        let mut counts: Vec<u32> = Vec::new();
        // unique slot of every original index
        let mut slot_of = Vec::with_capacity(points.len());

        for p in points {
            let slot = match slots.entry(*p) {
                Entry::Occupied(e) => {
                    let slot = *e.get();
                    counts[slot] += 1;
                    slot
                }
                Entry::Vacant(e) => {
                    let slot = samples.len();
                    e.insert(slot);
                    samples.push(*p);
                    counts.push(1);
                    slot
                }
            };
            slot_of.push(slot);
        }

        // Prefix sums over counts give each group's start in `members`.
        let mut offsets = Vec::with_capacity(samples.len() + 1);
        offsets.push(0);
        for &c in &counts {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + c as usize);
        }

        let mut cursor = offsets[..samples.len()].to_vec();
        let mut members = vec![0usize; points.len()];
        for (i, &slot) in slot_of.iter().enumerate() {
            members[cursor[slot]] = i;
            cursor[slot] += 1;
        }

        let coords = samples.iter().map(|s| s.channels()).collect();

        Self {
            samples,
            coords,
            counts,
            offsets,
            members,
        }
    }
}

impl<S, const D: usize> UniqueSet<S, D> {
    /// Number of unique points.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of original points.
    pub fn total(&self) -> usize {
        self.members.len()
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn coords(&self) -> &[[f32; D]] {
        &self.coords
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Original indices (ascending) that hold unique point `i`.
    pub fn group(&self, i: usize) -> &[usize] {
        &self.members[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Index groups in unique order.
    pub fn groups(&self) -> impl ExactSizeIterator<Item = &[usize]> + '_ {
        self.offsets.windows(2).map(|w| &self.members[w[0]..w[1]])
    }

    /// Index of the most frequent unique point, ties to the first encountered.
    pub fn mode_index(&self) -> Option<usize> {
        crate::init::mode_index(&self.counts)
    }
}

/// Deduplicate `points`; shorthand for [`UniqueSet::from_points`].
pub fn dedupe<S: Sample<D>, const D: usize>(points: &[S]) -> UniqueSet<S, D> {
    UniqueSet::from_points(points)
}
