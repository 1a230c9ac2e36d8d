//! Exact duplicate removal for polygon rings.
//!
//! The triangulation engine merges coincident insertions silently, which
//! shifts vertex indices under the constraint edges that refer to them. Every
//! ring is therefore made unique before it is turned into a planar graph.

use std::collections::HashMap;

use super::core::{Point2, point_key};

/// Returns `points` with every repeated coordinate removed, keeping the first
/// occurrence of each and preserving the original order.
///
/// Equality is exact; `-0.0` and `0.0` compare equal.
#[must_use]
pub fn ensure_unique(points: &[Point2]) -> Vec<Point2> {
    let mut first_seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
    for (index, &p) in points.iter().enumerate() {
        first_seen.entry(point_key(p)).or_insert(index);
    }

    // Map iteration order is arbitrary; restore input order from the indices.
    let mut keep: Vec<usize> = first_seen.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|index| points[index]).collect()
}

/// Number of coordinates [`ensure_unique`] would drop.
#[must_use]
pub fn duplicate_count(points: &[Point2]) -> usize {
    points.len() - ensure_unique(points).len()
}
