//! Polygon-with-holes meshing with size targets.
//!
//! The pipeline is:
//! 1. deduplicate every ring and assemble a [`PlanarGraph`] centred on the
//!    origin ([`PreparedDomain`]),
//! 2. triangulate it once with the engine's own options,
//! 3. if a minimum point count or maximum edge length was requested, keep
//!    re-triangulating with a shrinking area bound until both hold
//!    ([`refine_to_targets`]).
//!
//! The engine only understands an area bound, so the loop steers it with a
//! proportional rule: triangle area scales with the square of edge length, so
//! the bound is multiplied by `sqrt(target / achieved)`, never by more than
//! `0.98` per iteration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::core::{BBox2, Point2, is_finite, point_key, ring_centroid, sub};
use super::dedup::ensure_unique;
use super::diagnostics::MeshDiagnostics;
use super::mesh::{Mesh, MeshContext};
use super::metrics::TimingBucket;
use super::triangulation::{
    PlanarGraph, SpadeTriangulator, TriangulationError, TriangulationOptions, Triangulator,
    convex_hull_facets, ring_facets,
};

/// Largest per-iteration shrink factor of the area bound.
pub const MAX_SHRINK_FACTOR: f64 = 0.98;

/// Fraction of the bounding-box area used as the first area bound.
pub const INITIAL_AREA_FRACTION: f64 = 0.01;

/// Errors that can occur while generating a mesh.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshGenError {
    #[error("outer polygon requires at least 3 distinct points, got {count}")]
    EmptyPolygon { count: usize },

    #[error("hole {index} requires at least 3 distinct points, got {count}")]
    DegenerateHole { index: usize, count: usize },

    #[error("mesh input coordinates must be finite")]
    NonFiniteInput,

    #[error("conflicting mesh options: {0}")]
    ConflictingOptions(String),

    #[error(transparent)]
    Triangulation(#[from] TriangulationError),

    #[error(
        "mesh targets not reached after {iterations} iterations \
         ({vertex_count} points, max edge length {max_edge_length:.3e})"
    )]
    TargetNotReached {
        iterations: usize,
        vertex_count: usize,
        max_edge_length: f64,
    },
}

/// Options for [`generate_mesh`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Minimum number of mesh vertices.
    pub min_points: Option<usize>,
    /// Maximum triangle edge length. Non-positive values are ignored.
    pub max_edge_length: Option<f64>,
    /// Mesh the convex hull of the input instead of the polygon interior.
    pub convex_hull: bool,
    /// Outer-ring coordinates that bound the domain. Outer-ring points not
    /// listed here are still inserted but do not form constraint edges.
    pub boundary: Option<Vec<Point2>>,
    /// Refinement iterations allowed before giving up.
    pub max_iterations: usize,
    /// Options for the default triangulation engine.
    pub engine: TriangulationOptions,
}

impl MeshOptions {
    pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

    #[must_use]
    pub fn min_points(mut self, count: usize) -> Self {
        self.min_points = Some(count);
        self
    }

    #[must_use]
    pub fn max_edge_length(mut self, length: f64) -> Self {
        self.max_edge_length = Some(length);
        self
    }

    #[must_use]
    pub fn convex_hull(mut self, enabled: bool) -> Self {
        self.convex_hull = enabled;
        self
    }

    #[must_use]
    pub fn boundary(mut self, boundary: Vec<Point2>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: TriangulationOptions) -> Self {
        self.engine = engine;
        self
    }
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            min_points: None,
            max_edge_length: None,
            convex_hull: false,
            boundary: None,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            engine: TriangulationOptions::default(),
        }
    }
}

/// A deduplicated, recentred planar graph ready for repeated triangulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDomain {
    /// Graph in the recentred frame.
    pub graph: PlanarGraph,
    /// Translation that was subtracted from every input coordinate.
    pub offset: Point2,
    /// Deduplicated input points in the caller's frame, aligned with `graph.points`.
    pub input_points: Vec<Point2>,
    /// Bounding box of all input points in the caller's frame.
    pub bbox: BBox2,
    /// Coordinates dropped as exact duplicates.
    pub duplicates_removed: usize,
}

impl PreparedDomain {
    /// Builds the constraint graph for `outer` with `holes`.
    ///
    /// `convex_hull` and `boundary` are mutually exclusive.
    pub fn new(
        outer: &[Point2],
        holes: &[Vec<Point2>],
        convex_hull: bool,
        boundary: Option<&[Point2]>,
    ) -> Result<Self, MeshGenError> {
        if convex_hull && boundary.is_some() {
            return Err(MeshGenError::ConflictingOptions(
                "a boundary subset cannot be combined with convex hull meshing".to_string(),
            ));
        }
        let all_finite = outer.iter().all(|&p| is_finite(p))
            && holes.iter().flatten().all(|&p| is_finite(p))
            && boundary.is_none_or(|b| b.iter().all(|&p| is_finite(p)));
        if !all_finite {
            return Err(MeshGenError::NonFiniteInput);
        }

        let outer_unique = ensure_unique(outer);
        if outer_unique.len() < 3 {
            return Err(MeshGenError::EmptyPolygon {
                count: outer_unique.len(),
            });
        }
        let mut duplicates_removed = outer.len() - outer_unique.len();

        let mut holes_unique = Vec::with_capacity(holes.len());
        for (index, hole) in holes.iter().enumerate() {
            let unique = ensure_unique(hole);
            if unique.len() < 3 {
                return Err(MeshGenError::DegenerateHole {
                    index,
                    count: unique.len(),
                });
            }
            duplicates_removed += hole.len() - unique.len();
            holes_unique.push(unique);
        }

        let mut input_points = outer_unique.clone();
        for hole in &holes_unique {
            input_points.extend_from_slice(hole);
        }
        let bbox = BBox2::from_points(&input_points).ok_or(MeshGenError::EmptyPolygon { count: 0 })?;
        let offset = bbox.center();
        let points: Vec<Point2> = input_points.iter().map(|&p| sub(p, offset)).collect();

        let outer_len = outer_unique.len();
        let mut facets = if convex_hull {
            convex_hull_facets(&points)?
        } else if let Some(boundary) = boundary {
            let keep: HashSet<(u64, u64)> = boundary
                .iter()
                .map(|&p| point_key(sub(p, offset)))
                .collect();
            let indices: Vec<usize> = (0..outer_len)
                .filter(|&i| keep.contains(&point_key(points[i])))
                .collect();
            ring_facets(&indices)
        } else {
            ring_facets(&(0..outer_len).collect::<Vec<_>>())
        };

        let mut markers = Vec::with_capacity(holes_unique.len());
        let mut start = outer_len;
        for hole in &holes_unique {
            let indices: Vec<usize> = (start..start + hole.len()).collect();
            facets.extend(ring_facets(&indices));
            if let Some(centroid) = ring_centroid(hole) {
                markers.push(sub(centroid, offset));
            }
            start += hole.len();
        }

        Ok(Self {
            graph: PlanarGraph::new(points, facets, markers),
            offset,
            input_points,
            bbox,
            duplicates_removed,
        })
    }

    /// First area bound tried by the refinement loop.
    #[must_use]
    pub fn initial_area_bound(&self) -> f64 {
        self.bbox.area() * INITIAL_AREA_FRACTION
    }

    /// Runs `engine` once and maps the result back to the caller's frame.
    ///
    /// Input points are restored bit-for-bit; only engine-inserted points carry
    /// the round-off of the translation.
    pub fn triangulate(
        &self,
        engine: &impl Triangulator,
        max_area: Option<f64>,
    ) -> Result<(Mesh, Vec<String>), MeshGenError> {
        let result = engine.triangulate(&self.graph, max_area)?;
        let mut mesh = result.mesh.translated(self.offset);
        for (&vertex, &original) in result.input_vertices.iter().zip(&self.input_points) {
            if let Some(slot) = mesh.vertices.get_mut(vertex) {
                *slot = original;
            }
        }
        Ok((mesh, result.warnings))
    }
}

/// Density targets for [`refine_to_targets`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementTargets {
    pub min_points: usize,
    /// `f64::INFINITY` when only a point count is requested.
    pub max_edge_length: f64,
    pub max_iterations: usize,
}

impl RefinementTargets {
    /// Targets implied by `options`, or `None` when no refinement is requested.
    #[must_use]
    pub fn from_options(options: &MeshOptions) -> Option<Self> {
        let max_edge_length = options.max_edge_length.filter(|&l| l > 0.0);
        if options.min_points.is_none() && max_edge_length.is_none() {
            return None;
        }
        Some(Self {
            min_points: options.min_points.unwrap_or(0),
            max_edge_length: max_edge_length.unwrap_or(f64::INFINITY),
            max_iterations: options.max_iterations,
        })
    }

    #[must_use]
    pub fn is_met(&self, vertex_count: usize, max_edge_length: f64) -> bool {
        vertex_count >= self.min_points && max_edge_length <= self.max_edge_length
    }

    /// Area bound for the next iteration given the edge length just achieved.
    #[must_use]
    pub fn next_area_bound(&self, area_bound: f64, achieved_max_length: f64) -> f64 {
        if self.max_edge_length.is_finite() {
            let ratio = (self.max_edge_length / achieved_max_length).sqrt();
            area_bound * ratio.min(MAX_SHRINK_FACTOR)
        } else {
            area_bound * MAX_SHRINK_FACTOR
        }
    }
}

/// Outcome of the refinement loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementReport {
    pub mesh: Mesh,
    pub converged: bool,
    /// Bounded re-triangulations performed (0 if the first mesh already qualified).
    pub iterations: usize,
    /// Area bound of the returned mesh, `None` for the unbounded first mesh.
    pub area_bound: Option<f64>,
    pub max_edge_length: f64,
    pub warnings: Vec<String>,
}

/// Re-triangulates `domain` until `targets` hold or the iteration budget runs out.
///
/// The returned report says whether the targets were met; an unconverged
/// report still carries the last mesh for inspection.
pub fn refine_to_targets(
    engine: &impl Triangulator,
    domain: &PreparedDomain,
    targets: &RefinementTargets,
    ctx: &mut MeshContext,
) -> Result<RefinementReport, MeshGenError> {
    let (mut mesh, mut warnings) =
        ctx.metrics.time(TimingBucket::Triangulation, || domain.triangulate(engine, None))?;
    let mut max_length = ctx
        .metrics
        .time(TimingBucket::Refinement, || mesh.max_edge_length())
        .unwrap_or(0.0);

    let mut report = RefinementReport {
        converged: targets.is_met(mesh.vertex_count(), max_length),
        mesh: Mesh::default(),
        iterations: 0,
        area_bound: None,
        max_edge_length: max_length,
        warnings: Vec::new(),
    };

    let mut area_bound = domain.initial_area_bound();
    while !report.converged && report.iterations < targets.max_iterations {
        if !(area_bound > 0.0 && area_bound.is_finite()) {
            log::warn!("refinement area bound collapsed to {area_bound:e}; stopping");
            break;
        }
        (mesh, warnings) = ctx.metrics.time(TimingBucket::Triangulation, || {
            domain.triangulate(engine, Some(area_bound))
        })?;
        max_length = ctx
            .metrics
            .time(TimingBucket::Refinement, || mesh.max_edge_length())
            .unwrap_or(0.0);
        report.iterations += 1;
        report.area_bound = Some(area_bound);
        report.max_edge_length = max_length;
        log::debug!(
            "Iteration {}: made mesh with {} points and {} triangles with maximum edge length: \
             {:.2e}. Target maximum edge length: {:.2e}.",
            report.iterations,
            mesh.vertex_count(),
            mesh.triangle_count(),
            max_length,
            targets.max_edge_length
        );
        report.converged = targets.is_met(mesh.vertex_count(), max_length);
        area_bound = targets.next_area_bound(area_bound, max_length);
    }

    report.mesh = mesh;
    report.warnings = warnings;
    Ok(report)
}

/// Meshes the polygon `outer` minus `holes` with the default engine.
///
/// ```
/// use tdgl_mesh::geom::{MeshOptions, generate_mesh};
///
/// let outer = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]];
/// let mesh = generate_mesh(&outer, &[], &MeshOptions::default().max_edge_length(0.5)).unwrap();
/// assert!(mesh.max_edge_length().unwrap() <= 0.5);
/// ```
pub fn generate_mesh(
    outer: &[Point2],
    holes: &[Vec<Point2>],
    options: &MeshOptions,
) -> Result<Mesh, MeshGenError> {
    let engine = SpadeTriangulator::new(options.engine);
    let mut ctx = MeshContext::new();
    generate_mesh_with_context(outer, holes, options, &engine, &mut ctx).map(|(mesh, _)| mesh)
}

/// Like [`generate_mesh`], with an explicit engine and context.
///
/// `options.engine` is ignored here; the engine carries its own options.
/// Fails with [`MeshGenError::TargetNotReached`] when the refinement budget
/// runs out.
pub fn generate_mesh_with_context(
    outer: &[Point2],
    holes: &[Vec<Point2>],
    options: &MeshOptions,
    engine: &impl Triangulator,
    ctx: &mut MeshContext,
) -> Result<(Mesh, MeshDiagnostics), MeshGenError> {
    ctx.metrics.begin();
    let domain = ctx.metrics.time(TimingBucket::Deduplication, || {
        PreparedDomain::new(outer, holes, options.convex_hull, options.boundary.as_deref())
    })?;

    let (mesh, warnings, iterations, area_bound) = match RefinementTargets::from_options(options) {
        None => {
            let (mesh, warnings) = ctx
                .metrics
                .time(TimingBucket::Triangulation, || domain.triangulate(engine, None))?;
            (mesh, warnings, 0, None)
        }
        Some(targets) => {
            let report = refine_to_targets(engine, &domain, &targets, ctx)?;
            if !report.converged {
                return Err(MeshGenError::TargetNotReached {
                    iterations: report.iterations,
                    vertex_count: report.mesh.vertex_count(),
                    max_edge_length: report.max_edge_length,
                });
            }
            (report.mesh, report.warnings, report.iterations, report.area_bound)
        }
    };

    let mut diagnostics = MeshDiagnostics::for_mesh(&mesh);
    diagnostics.duplicate_points_removed = domain.duplicates_removed;
    diagnostics.refinement_iterations = iterations;
    diagnostics.final_area_bound = area_bound;
    diagnostics.warnings = warnings;
    let collapsed = mesh.collapsed_triangle_count(ctx.tolerance);
    if collapsed > 0 {
        diagnostics.add_warning(format!("{collapsed} triangles have negligible area"));
    }
    diagnostics.timing = ctx.metrics.end();
    Ok((mesh, diagnostics))
}
