//! Vertex relaxation for triangle quality.
//!
//! All smoothers move vertex coordinates only. The triangle array is returned
//! untouched and vertices on the mesh boundary never move.
//!
//! Methods:
//! - `cvt-block-diagonal`: Newton step on the centroidal Voronoi energy with a
//!   per-vertex 2x2 Hessian block
//! - `cvt-diagonal` (alias `lloyd`): move to the centroid of the vertex's
//!   Voronoi region
//! - `laplace`: move to the mean of neighbouring vertices

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::core::{
    Point2, add, circumcenter, cross, distance, dot, midpoint, orient2d, scale, sub,
};
use super::diagnostics::MeshDiagnostics;
use super::mesh::{Mesh, MeshContext};
use super::metrics::TimingBucket;

/// Number of times a move is halved before it is abandoned.
const MAX_BACKTRACKS: usize = 4;

/// Finite-difference step for the Hessian estimate, relative to local edge length.
const HESSIAN_STEP: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmoothError {
    #[error("cannot optimize an empty mesh")]
    EmptyMesh,

    #[error("invalid mesh: {reason}")]
    InvalidMesh { reason: String },

    #[error("unknown smoothing method `{0}`")]
    UnknownMethod(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmoothingMethod {
    #[default]
    CvtBlockDiagonal,
    #[serde(alias = "lloyd")]
    CvtDiagonal,
    Laplace,
}

impl SmoothingMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CvtBlockDiagonal => "cvt-block-diagonal",
            Self::CvtDiagonal => "cvt-diagonal",
            Self::Laplace => "laplace",
        }
    }
}

impl FromStr for SmoothingMethod {
    type Err = SmoothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cvt-block-diagonal" => Ok(Self::CvtBlockDiagonal),
            "cvt-diagonal" | "lloyd" => Ok(Self::CvtDiagonal),
            "laplace" => Ok(Self::Laplace),
            other => Err(SmoothError::UnknownMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`optimize_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Maximum number of sweeps over the free vertices.
    pub steps: usize,
    pub method: SmoothingMethod,
    /// Stop once the largest move in a sweep is below `tolerance` times the
    /// mean edge length.
    pub tolerance: f64,
    /// Log per-step progress at `info` rather than `debug`.
    pub verbose: bool,
    /// Scale applied to every computed move (1.0 takes the full step).
    pub relaxation: f64,
}

impl OptimizeOptions {
    pub const DEFAULT_STEPS: usize = 20;
    pub const DEFAULT_TOLERANCE: f64 = 1e-3;

    #[must_use]
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn method(mut self, method: SmoothingMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub const fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub const fn relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            steps: Self::DEFAULT_STEPS,
            method: SmoothingMethod::default(),
            tolerance: Self::DEFAULT_TOLERANCE,
            verbose: false,
            relaxation: 1.0,
        }
    }
}

/// Relaxes vertex positions without touching connectivity.
pub trait MeshSmoother {
    fn smooth(&self, mesh: &Mesh, options: &OptimizeOptions) -> Result<Mesh, SmoothError>;
}

/// Built-in smoother implementing every [`SmoothingMethod`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CvtSmoother;

impl MeshSmoother for CvtSmoother {
    fn smooth(&self, mesh: &Mesh, options: &OptimizeOptions) -> Result<Mesh, SmoothError> {
        if mesh.vertices.is_empty() || mesh.triangles.is_empty() {
            return Err(SmoothError::EmptyMesh);
        }
        mesh.validate()
            .map_err(|reason| SmoothError::InvalidMesh { reason })?;

        let stencil = Stencil::new(mesh);
        let mut vertices = mesh.vertices.clone();
        let edges = mesh.edges();
        let mean_edge = edges
            .iter()
            .map(|&[a, b]| distance(vertices[a], vertices[b]))
            .sum::<f64>()
            / edges.len() as f64;
        let threshold = options.tolerance * mean_edge;

        let mut converged = false;
        for step in 1..=options.steps {
            let mut max_move = 0.0_f64;
            for v in 0..vertices.len() {
                if stencil.fixed[v] || stencil.wedges[v].is_empty() {
                    continue;
                }
                let x = vertices[v];
                let Some(target) = stencil.target(v, &vertices, options.method) else {
                    continue;
                };
                let delta = scale(sub(target, x), options.relaxation);
                if let Some(moved) = stencil.accept_move(v, &vertices, delta) {
                    max_move = max_move.max(distance(moved, x));
                    vertices[v] = moved;
                }
            }

            if options.verbose {
                log::info!("{} step {step}: max move {max_move:.3e}", options.method);
            } else {
                log::debug!("{} step {step}: max move {max_move:.3e}", options.method);
            }

            if max_move <= threshold {
                converged = true;
                break;
            }
        }

        if !converged && options.steps > 0 {
            log::warn!(
                "{} smoothing did not converge within {} steps",
                options.method,
                options.steps
            );
        }

        Ok(Mesh::new(vertices, mesh.triangles.clone()))
    }
}

/// Per-vertex neighbourhood data that stays fixed while coordinates move.
struct Stencil {
    /// Opposite edge `[a, b]` of every incident triangle, in triangle order.
    wedges: Vec<Vec<[usize; 2]>>,
    /// Orientation sign of the incident triangle for each wedge.
    signs: Vec<Vec<f64>>,
    neighbors: Vec<Vec<usize>>,
    fixed: Vec<bool>,
}

impl Stencil {
    fn new(mesh: &Mesh) -> Self {
        let n = mesh.vertices.len();
        let mut wedges = vec![Vec::new(); n];
        let mut signs = vec![Vec::new(); n];
        for &[a, b, c] in &mesh.triangles {
            let sign = orient2d(mesh.vertices[a], mesh.vertices[b], mesh.vertices[c]).signum();
            for (v, pair) in [(a, [b, c]), (b, [c, a]), (c, [a, b])] {
                wedges[v].push(pair);
                signs[v].push(sign);
            }
        }
        let mut fixed = vec![false; n];
        for v in mesh.boundary_vertices() {
            fixed[v] = true;
        }
        Self {
            wedges,
            signs,
            neighbors: mesh.vertex_neighbors(),
            fixed,
        }
    }

    fn target(&self, v: usize, vertices: &[Point2], method: SmoothingMethod) -> Option<Point2> {
        let x = vertices[v];
        match method {
            SmoothingMethod::Laplace => self.neighbor_mean(v, vertices),
            SmoothingMethod::CvtDiagonal => self.lloyd_target(v, x, vertices),
            SmoothingMethod::CvtBlockDiagonal => self
                .newton_target(v, x, vertices)
                .or_else(|| self.lloyd_target(v, x, vertices)),
        }
    }

    fn neighbor_mean(&self, v: usize, vertices: &[Point2]) -> Option<Point2> {
        let neighbors = &self.neighbors[v];
        if neighbors.is_empty() {
            return None;
        }
        let sum = neighbors
            .iter()
            .fold([0.0, 0.0], |acc, &u| add(acc, vertices[u]));
        Some(scale(sum, 1.0 / neighbors.len() as f64))
    }

    fn lloyd_target(&self, v: usize, x: Point2, vertices: &[Point2]) -> Option<Point2> {
        let (area, moment) = self.voronoi_moments(v, x, vertices);
        if area.abs() <= f64::EPSILON * self.local_scale(v, x, vertices).powi(2) {
            return self.neighbor_mean(v, vertices);
        }
        Some(scale(moment, 1.0 / area))
    }

    /// Newton step `x - H^-1 g` on the CVT energy, `None` if the Hessian block
    /// is not positive definite.
    fn newton_target(&self, v: usize, x: Point2, vertices: &[Point2]) -> Option<Point2> {
        let h = HESSIAN_STEP * self.local_scale(v, x, vertices);
        if h <= 0.0 {
            return None;
        }
        let g = self.energy_gradient(v, x, vertices);
        let gx_plus = self.energy_gradient(v, [x[0] + h, x[1]], vertices);
        let gx_minus = self.energy_gradient(v, [x[0] - h, x[1]], vertices);
        let gy_plus = self.energy_gradient(v, [x[0], x[1] + h], vertices);
        let gy_minus = self.energy_gradient(v, [x[0], x[1] - h], vertices);

        let h00 = (gx_plus[0] - gx_minus[0]) / (2.0 * h);
        let h11 = (gy_plus[1] - gy_minus[1]) / (2.0 * h);
        let h01 = 0.5 * ((gx_plus[1] - gx_minus[1]) + (gy_plus[0] - gy_minus[0])) / (2.0 * h);
        let det = h00 * h11 - h01 * h01;
        if !(h00 > 0.0 && det > 0.0) || !det.is_finite() {
            return None;
        }
        let step = [
            -(h11 * g[0] - h01 * g[1]) / det,
            -(h00 * g[1] - h01 * g[0]) / det,
        ];
        Some(add(x, step))
    }

    /// Gradient `2 A (x - c)` of the CVT energy with respect to the vertex.
    fn energy_gradient(&self, v: usize, x: Point2, vertices: &[Point2]) -> Point2 {
        let (area, moment) = self.voronoi_moments(v, x, vertices);
        let sign = if area < 0.0 { -1.0 } else { 1.0 };
        scale(sub(scale(x, area), moment), 2.0 * sign)
    }

    /// Signed area and first moment of the dual region of `v` placed at `x`,
    /// restricted to its incident triangles.
    fn voronoi_moments(&self, v: usize, x: Point2, vertices: &[Point2]) -> (f64, Point2) {
        let mut area = 0.0;
        let mut moment = [0.0, 0.0];
        for &[a, b] in &self.wedges[v] {
            let (pa, pb) = (vertices[a], vertices[b]);
            let center = dual_center(x, pa, pb);
            let (qa, qm) = polygon_moments(&[x, midpoint(x, pa), center, midpoint(x, pb)]);
            area += qa;
            moment = add(moment, qm);
        }
        (area, moment)
    }

    fn local_scale(&self, v: usize, x: Point2, vertices: &[Point2]) -> f64 {
        let neighbors = &self.neighbors[v];
        if neighbors.is_empty() {
            return 0.0;
        }
        neighbors
            .iter()
            .map(|&u| distance(x, vertices[u]))
            .sum::<f64>()
            / neighbors.len() as f64
    }

    /// Applies `delta`, halving it until no incident triangle flips or collapses.
    fn accept_move(&self, v: usize, vertices: &[Point2], delta: Point2) -> Option<Point2> {
        let x = vertices[v];
        let mut delta = delta;
        for _ in 0..=MAX_BACKTRACKS {
            let candidate = add(x, delta);
            let valid = candidate[0].is_finite()
                && candidate[1].is_finite()
                && self.wedges[v].iter().zip(&self.signs[v]).all(|(&[a, b], &sign)| {
                    orient2d(candidate, vertices[a], vertices[b]) * sign > 0.0
                });
            if valid {
                return Some(candidate);
            }
            delta = scale(delta, 0.5);
        }
        None
    }
}

/// Circumcentre of a non-obtuse triangle, otherwise the midpoint of the edge
/// opposite the obtuse corner so the dual region stays inside the triangle.
fn dual_center(a: Point2, b: Point2, c: Point2) -> Point2 {
    let corners = [a, b, c];
    for k in 0..3 {
        let (p, q, r) = (corners[k], corners[(k + 1) % 3], corners[(k + 2) % 3]);
        if dot(sub(q, p), sub(r, p)) < 0.0 {
            return midpoint(q, r);
        }
    }
    circumcenter(a, b, c).unwrap_or_else(|| scale(add(add(a, b), c), 1.0 / 3.0))
}

/// Signed area and first moment (`area * centroid`) of a closed polygon.
fn polygon_moments(polygon: &[Point2]) -> (f64, Point2) {
    let mut twice_area = 0.0;
    let mut mx = 0.0;
    let mut my = 0.0;
    for (i, &p) in polygon.iter().enumerate() {
        let q = polygon[(i + 1) % polygon.len()];
        let c = cross(p, q);
        twice_area += c;
        mx += (p[0] + q[0]) * c;
        my += (p[1] + q[1]) * c;
    }
    (0.5 * twice_area, [mx / 6.0, my / 6.0])
}

/// Relaxes `mesh` with the built-in [`CvtSmoother`].
pub fn optimize_mesh(mesh: &Mesh, options: &OptimizeOptions) -> Result<Mesh, SmoothError> {
    optimize_mesh_with(&CvtSmoother, mesh, options)
}

pub fn optimize_mesh_with(
    smoother: &impl MeshSmoother,
    mesh: &Mesh,
    options: &OptimizeOptions,
) -> Result<Mesh, SmoothError> {
    smoother.smooth(mesh, options)
}

/// Like [`optimize_mesh_with`], timing the pass and reporting diagnostics.
pub fn optimize_mesh_with_context(
    smoother: &impl MeshSmoother,
    mesh: &Mesh,
    options: &OptimizeOptions,
    ctx: &mut MeshContext,
) -> Result<(Mesh, MeshDiagnostics), SmoothError> {
    ctx.metrics.begin();
    let smoothed = ctx
        .metrics
        .time(TimingBucket::Smoothing, || smoother.smooth(mesh, options))?;
    let mut diagnostics = MeshDiagnostics::for_mesh(&smoothed);
    diagnostics.timing = ctx.metrics.end();
    Ok((smoothed, diagnostics))
}
