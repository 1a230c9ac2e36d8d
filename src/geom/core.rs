//! Planar primitives shared by the meshing modules.
//!
//! Points are plain `[f64; 2]` arrays so meshes can be handed to a solver
//! without conversion. The helpers here are the small amount of vector
//! arithmetic the triangulation, smoothing and boundary code all need.

use serde::{Deserialize, Serialize};

/// A point in the plane, `[x, y]`.
pub type Point2 = [f64; 2];

// ─────────────────────────────────────────────────────────────────────────────
// Vector helpers
// ─────────────────────────────────────────────────────────────────────────────

#[must_use]
pub fn sub(a: Point2, b: Point2) -> Point2 {
    [a[0] - b[0], a[1] - b[1]]
}

#[must_use]
pub fn add(a: Point2, b: Point2) -> Point2 {
    [a[0] + b[0], a[1] + b[1]]
}

#[must_use]
pub fn scale(a: Point2, s: f64) -> Point2 {
    [a[0] * s, a[1] * s]
}

#[must_use]
pub fn midpoint(a: Point2, b: Point2) -> Point2 {
    [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])]
}

/// Z component of the cross product of `a` and `b`.
#[must_use]
pub fn cross(a: Point2, b: Point2) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

#[must_use]
pub fn dot(a: Point2, b: Point2) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[must_use]
pub fn distance(a: Point2, b: Point2) -> f64 {
    let d = sub(a, b);
    dot(d, d).sqrt()
}

/// Twice the signed area of triangle `abc`; positive when counterclockwise.
#[must_use]
pub fn orient2d(a: Point2, b: Point2, c: Point2) -> f64 {
    cross(sub(b, a), sub(c, a))
}

#[must_use]
pub fn is_finite(p: Point2) -> bool {
    p[0].is_finite() && p[1].is_finite()
}

/// Exact hash key for a coordinate pair.
///
/// `-0.0` and `0.0` map to the same key so that keys agree with `==`.
#[must_use]
pub fn point_key(p: Point2) -> (u64, u64) {
    let canon = |v: f64| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() };
    (canon(p[0]), canon(p[1]))
}

/// Circumcenter of triangle `abc`, or `None` when the triangle is degenerate.
#[must_use]
pub fn circumcenter(a: Point2, b: Point2, c: Point2) -> Option<Point2> {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let d = 2.0 * cross(ab, ac);
    if d == 0.0 || !d.is_finite() {
        return None;
    }
    let ab2 = dot(ab, ab);
    let ac2 = dot(ac, ac);
    let ux = (ac[1] * ab2 - ab[1] * ac2) / d;
    let uy = (ab[0] * ac2 - ac[0] * ab2) / d;
    Some([a[0] + ux, a[1] + uy])
}

/// Signed area of a closed ring (closing edge implicit).
///
/// Positive area = counter-clockwise, negative = clockwise.
#[must_use]
pub fn signed_area(ring: &[Point2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, &p) in ring.iter().enumerate() {
        let q = ring[(i + 1) % ring.len()];
        sum += cross(p, q);
    }
    0.5 * sum
}

/// Area centroid of a closed ring.
///
/// Falls back to the vertex average when the ring encloses no area.
#[must_use]
pub fn ring_centroid(ring: &[Point2]) -> Option<Point2> {
    if ring.is_empty() {
        return None;
    }
    let mut area2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    // Accumulate relative to the first vertex to keep the sums well conditioned.
    let origin = ring[0];
    for (i, &p) in ring.iter().enumerate() {
        let a = sub(p, origin);
        let b = sub(ring[(i + 1) % ring.len()], origin);
        let w = cross(a, b);
        area2 += w;
        cx += (a[0] + b[0]) * w;
        cy += (a[1] + b[1]) * w;
    }
    if area2.abs() > f64::EPSILON * ring.len() as f64 {
        let k = 1.0 / (3.0 * area2);
        return Some([origin[0] + cx * k, origin[1] + cy * k]);
    }
    let n = ring.len() as f64;
    let sum = ring.iter().fold([0.0, 0.0], |acc, &p| add(acc, p));
    Some([sum[0] / n, sum[1] / n])
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox2
// ─────────────────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BBox2 {
    #[must_use]
    pub const fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// Bounding box of a point set, `None` when the set is empty.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |bbox, &p| bbox.expand_point(p)))
    }

    #[must_use]
    pub fn expand_point(self, p: Point2) -> Self {
        Self::new(
            [self.min[0].min(p[0]), self.min[1].min(p[1])],
            [self.max[0].max(p[0]), self.max[1].max(p[1])],
        )
    }

    /// Extent along x (`ptp` of the x coordinates).
    #[must_use]
    pub fn width(self) -> f64 {
        self.max[0] - self.min[0]
    }

    /// Extent along y.
    #[must_use]
    pub fn height(self) -> f64 {
        self.max[1] - self.min[1]
    }

    #[must_use]
    pub fn area(self) -> f64 {
        self.width() * self.height()
    }

    /// Center computed as `min + extent / 2`.
    #[must_use]
    pub fn center(self) -> Point2 {
        [
            self.min[0] + self.width() / 2.0,
            self.min[1] + self.height() / 2.0,
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default geometric tolerance (1e-9).
    pub const DEFAULT: Self = Self { eps: 1e-9 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    /// Tolerance relative to a length scale.
    #[must_use]
    pub fn relative_to(self, span: f64) -> f64 {
        self.eps * span.abs()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
