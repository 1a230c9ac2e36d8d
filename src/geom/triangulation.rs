//! Constrained triangulation of planar straight-line graphs.
//!
//! A [`PlanarGraph`] bundles the points, required edges (facets) and hole
//! markers of a domain. Any [`Triangulator`] can turn it into a [`Mesh`]; the
//! crate ships [`SpadeTriangulator`], a constrained Delaunay triangulation with
//! Ruppert-style refinement.
//!
//! Holes are carved the way classic PSLG meshers do it: starting from the face
//! that contains each hole marker (and from the convex hull, for everything
//! outside the outer boundary), triangles are removed by flood fill until a
//! constraint edge stops the spread.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use spade::handles::{FixedFaceHandle, InnerTag};
use spade::{
    AngleLimit, ConstrainedDelaunayTriangulation, PositionInTriangulation, RefinementParameters,
    Triangulation,
};

use super::core::{BBox2, Point2, is_finite};
use super::mesh::Mesh;

type Cdt = ConstrainedDelaunayTriangulation<spade::Point2<f64>>;

/// Errors raised by a triangulation engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TriangulationError {
    #[error("triangulation requires at least 3 points, got {count}")]
    TooFewPoints { count: usize },

    #[error("point {index} has non-finite coordinates")]
    NonFinitePoint { index: usize },

    #[error("facet {facet} references invalid point index {index}")]
    FacetOutOfRange { facet: usize, index: usize },

    #[error("facet {facet} connects point {index} to itself")]
    DegenerateFacet { facet: usize, index: usize },

    #[error("engine rejected point {index}: {reason}")]
    Insertion { index: usize, reason: String },

    #[error("facet ({from}, {to}) crosses another constraint edge")]
    IntersectingConstraints { from: usize, to: usize },

    #[error("points are collinear; convex hull is degenerate")]
    DegenerateHull,

    #[error("triangulation produced no triangles")]
    NoTriangles,
}

/// Points, constraint edges and hole markers handed to a [`Triangulator`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanarGraph {
    pub points: Vec<Point2>,
    pub facets: Vec<[usize; 2]>,
    pub holes: Vec<Point2>,
}

impl PlanarGraph {
    #[must_use]
    pub fn new(points: Vec<Point2>, facets: Vec<[usize; 2]>, holes: Vec<Point2>) -> Self {
        Self {
            points,
            facets,
            holes,
        }
    }

    /// Checks that every point is finite and every facet joins two distinct,
    /// existing points.
    pub fn validate(&self) -> Result<(), TriangulationError> {
        if self.points.len() < 3 {
            return Err(TriangulationError::TooFewPoints {
                count: self.points.len(),
            });
        }
        if let Some(index) = self.points.iter().position(|&p| !is_finite(p)) {
            return Err(TriangulationError::NonFinitePoint { index });
        }
        for (facet, &[a, b]) in self.facets.iter().enumerate() {
            for index in [a, b] {
                if index >= self.points.len() {
                    return Err(TriangulationError::FacetOutOfRange { facet, index });
                }
            }
            if a == b {
                return Err(TriangulationError::DegenerateFacet { facet, index: a });
            }
        }
        Ok(())
    }

    /// Bounding-box area of the points; used to size refinement budgets.
    #[must_use]
    pub fn bbox_area(&self) -> f64 {
        BBox2::from_points(&self.points).map_or(0.0, BBox2::area)
    }
}

/// Output of a triangulation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationResult {
    pub mesh: Mesh,
    /// Mesh vertex index of every input point, in input order.
    pub input_vertices: Vec<usize>,
    /// Non-fatal issues the engine worked around.
    pub warnings: Vec<String>,
}

/// A constrained triangulation engine.
///
/// Implementations must keep every facet as a (possibly subdivided) mesh edge,
/// exclude the regions marked by hole markers and everything outside the
/// facets, and honour `max_area` as an upper bound on triangle area when it is
/// given. Engine-specific options are carried by the implementing value.
pub trait Triangulator {
    fn triangulate(
        &self,
        graph: &PlanarGraph,
        max_area: Option<f64>,
    ) -> Result<TriangulationResult, TriangulationError>;
}

/// Options for [`SpadeTriangulator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationOptions {
    /// Minimum interior angle in degrees enforced by refinement. `None`
    /// disables quality refinement.
    pub min_angle_deg: Option<f64>,
    /// Upper bound on triangle area. An area bound passed to
    /// [`Triangulator::triangulate`] takes precedence.
    pub max_area: Option<f64>,
    /// Triangles smaller than this are never split.
    pub min_area: Option<f64>,
    /// Cap on vertices the refinement may insert. Derived from the area bound
    /// when unset.
    pub max_steiner_points: Option<usize>,
}

impl TriangulationOptions {
    /// Quality meshing with a 20 degree minimum angle.
    pub const DEFAULT_MIN_ANGLE_DEG: f64 = 20.0;

    /// Options that insert no Steiner points at all.
    #[must_use]
    pub const fn unrefined() -> Self {
        Self {
            min_angle_deg: None,
            max_area: None,
            min_area: None,
            max_steiner_points: None,
        }
    }

    #[must_use]
    pub const fn min_angle(mut self, degrees: Option<f64>) -> Self {
        self.min_angle_deg = degrees;
        self
    }

    #[must_use]
    pub const fn max_area(mut self, area: Option<f64>) -> Self {
        self.max_area = area;
        self
    }

    #[must_use]
    pub const fn min_area(mut self, area: Option<f64>) -> Self {
        self.min_area = area;
        self
    }

    #[must_use]
    pub const fn max_steiner_points(mut self, count: Option<usize>) -> Self {
        self.max_steiner_points = count;
        self
    }
}

impl Default for TriangulationOptions {
    fn default() -> Self {
        Self::unrefined().min_angle(Some(Self::DEFAULT_MIN_ANGLE_DEG))
    }
}

/// Constrained Delaunay engine backed by `spade`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpadeTriangulator {
    pub options: TriangulationOptions,
}

/// Upper limit for the derived Steiner point budget.
const MAX_DERIVED_STEINER_POINTS: usize = 20_000_000;

impl SpadeTriangulator {
    #[must_use]
    pub const fn new(options: TriangulationOptions) -> Self {
        Self { options }
    }

    fn steiner_budget(&self, graph: &PlanarGraph, area_bound: Option<f64>) -> usize {
        if let Some(count) = self.options.max_steiner_points {
            return count;
        }
        let base = graph.points.len().saturating_mul(10).max(1000);
        let from_area = match area_bound {
            Some(area) if area > 0.0 => {
                let estimate = 4.0 * graph.bbox_area() / area;
                if estimate.is_finite() {
                    estimate.min(MAX_DERIVED_STEINER_POINTS as f64) as usize
                } else {
                    MAX_DERIVED_STEINER_POINTS
                }
            }
            _ => 0,
        };
        base.saturating_add(from_area).min(MAX_DERIVED_STEINER_POINTS)
    }
}

impl Triangulator for SpadeTriangulator {
    fn triangulate(
        &self,
        graph: &PlanarGraph,
        max_area: Option<f64>,
    ) -> Result<TriangulationResult, TriangulationError> {
        graph.validate()?;

        let mut cdt = Cdt::new();
        let mut handles = Vec::with_capacity(graph.points.len());
        for (index, &p) in graph.points.iter().enumerate() {
            let handle = cdt
                .insert(spade::Point2::new(p[0], p[1]))
                .map_err(|err| TriangulationError::Insertion {
                    index,
                    reason: format!("{err:?}"),
                })?;
            handles.push(handle);
        }

        for &[a, b] in &graph.facets {
            let (from, to) = (handles[a], handles[b]);
            if from == to {
                // Coincident points were merged on insertion.
                continue;
            }
            if !cdt.can_add_constraint(from, to) {
                return Err(TriangulationError::IntersectingConstraints { from: a, to: b });
            }
            cdt.add_constraint(from, to);
        }

        let mut warnings = Vec::new();
        let area_bound = max_area.or(self.options.max_area);
        if self.options.min_angle_deg.is_some() || area_bound.is_some() {
            let angle = self
                .options
                .min_angle_deg
                .map_or_else(
                    || AngleLimit::from_radius_to_shortest_edge_ratio(f64::INFINITY),
                    AngleLimit::from_deg,
                );
            let mut params = RefinementParameters::<f64>::new()
                .exclude_outer_faces(true)
                .with_angle_limit(angle)
                .with_max_additional_vertices(self.steiner_budget(graph, area_bound));
            if let Some(area) = area_bound {
                params = params.with_max_allowed_area(area);
            }
            if let Some(area) = self.options.min_area {
                params = params.with_min_required_area(area);
            }
            let result = cdt.refine(params);
            if !result.refinement_complete {
                log::warn!(
                    "refinement stopped at the Steiner point budget with {} vertices",
                    cdt.num_vertices()
                );
                warnings.push("refinement stopped at the Steiner point budget".to_string());
            }
        }

        let excluded = carve_exterior(&cdt, &graph.holes, &mut warnings);

        let triangles: Vec<[usize; 3]> = cdt
            .inner_faces()
            .filter(|face| !excluded.contains(&face.fix()))
            .map(|face| {
                let [a, b, c] = face.vertices();
                [a.fix().index(), b.fix().index(), c.fix().index()]
            })
            .collect();

        if triangles.is_empty() {
            return Err(TriangulationError::NoTriangles);
        }

        // Steiner points left inside carved regions are dropped; input points stay.
        let mut keep = vec![false; cdt.num_vertices()];
        for &v in triangles.iter().flatten() {
            keep[v] = true;
        }
        for handle in &handles {
            keep[handle.index()] = true;
        }
        let mut remap = vec![usize::MAX; keep.len()];
        let mut vertices = Vec::with_capacity(keep.len());
        for (v, vertex) in cdt.vertices().enumerate() {
            if keep[v] {
                remap[v] = vertices.len();
                let p = vertex.position();
                vertices.push([p.x, p.y]);
            }
        }

        Ok(TriangulationResult {
            mesh: Mesh::new(
                vertices,
                triangles
                    .iter()
                    .map(|t| [remap[t[0]], remap[t[1]], remap[t[2]]])
                    .collect(),
            ),
            input_vertices: handles.iter().map(|h| remap[h.index()]).collect(),
            warnings,
        })
    }
}

/// Faces outside the outer constraints or inside a marked hole.
fn carve_exterior(
    cdt: &Cdt,
    holes: &[Point2],
    warnings: &mut Vec<String>,
) -> HashSet<FixedFaceHandle<InnerTag>> {
    let mut stack: Vec<FixedFaceHandle<InnerTag>> = Vec::new();

    for edge in cdt.convex_hull() {
        if cdt.is_constraint_edge(edge.as_undirected().fix()) {
            continue;
        }
        for face in [edge.face(), edge.rev().face()] {
            if let Some(inner) = face.as_inner() {
                stack.push(inner.fix());
            }
        }
    }

    for (k, &marker) in holes.iter().enumerate() {
        match cdt.locate(spade::Point2::new(marker[0], marker[1])) {
            PositionInTriangulation::OnFace(face) => stack.push(face),
            PositionInTriangulation::OnEdge(edge) => {
                let edge = cdt.directed_edge(edge);
                if cdt.is_constraint_edge(edge.as_undirected().fix()) {
                    warnings.push(format!("hole marker {k} lies on a constraint edge"));
                    continue;
                }
                for face in [edge.face(), edge.rev().face()] {
                    if let Some(inner) = face.as_inner() {
                        stack.push(inner.fix());
                    }
                }
            }
            _ => {
                log::warn!(
                    "hole marker {k} at ({}, {}) is not inside any triangle",
                    marker[0],
                    marker[1]
                );
                warnings.push(format!("hole marker {k} is not inside any triangle"));
            }
        }
    }

    let mut excluded = HashSet::new();
    while let Some(face) = stack.pop() {
        if !excluded.insert(face) {
            continue;
        }
        for edge in cdt.face(face).adjacent_edges() {
            if cdt.is_constraint_edge(edge.as_undirected().fix()) {
                continue;
            }
            if let Some(neighbor) = edge.rev().face().as_inner() {
                let neighbor = neighbor.fix();
                if !excluded.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }
    }
    excluded
}

/// Convex-hull edges of `points` as facets, in hull order.
pub fn convex_hull_facets(points: &[Point2]) -> Result<Vec<[usize; 2]>, TriangulationError> {
    let hull_points: Vec<delaunator::Point> = points
        .iter()
        .map(|p| delaunator::Point { x: p[0], y: p[1] })
        .collect();
    let triangulation = delaunator::triangulate(&hull_points);
    if triangulation.triangles.is_empty() || triangulation.hull.len() < 3 {
        return Err(TriangulationError::DegenerateHull);
    }
    let hull = triangulation.hull;
    Ok(hull
        .iter()
        .zip(hull.iter().cycle().skip(1))
        .map(|(&a, &b)| [a, b])
        .collect())
}

/// Facets joining consecutive entries of `indices`, closing back to the first.
#[must_use]
pub fn ring_facets(indices: &[usize]) -> Vec<[usize; 2]> {
    if indices.len() < 2 {
        return Vec::new();
    }
    indices
        .iter()
        .zip(indices.iter().cycle().skip(1))
        .map(|(&a, &b)| [a, b])
        .collect()
}
