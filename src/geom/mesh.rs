use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::core::{Point2, Tolerance, distance, dot, is_finite, orient2d, sub};
use super::metrics::MeshMetrics;

/// A planar triangle mesh: vertex coordinates plus index triples.
///
/// This is the only structure the meshing pipeline hands back to callers.
/// Triangles produced by this crate are counterclockwise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point2>,
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh {
    #[must_use]
    pub fn new(vertices: Vec<Point2>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Returns true if any vertex coordinate is NaN or infinite.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.vertices.iter().any(|&p| !is_finite(p))
    }

    /// Returns true if all triangle indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.vertices.len();
        self.triangles.iter().flatten().all(|&i| i < n)
    }

    /// Returns true if some triangle repeats a vertex index.
    #[must_use]
    pub fn has_degenerate_triangles(&self) -> bool {
        self.triangles
            .iter()
            .any(|&[a, b, c]| a == b || b == c || a == c)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if self.has_degenerate_triangles() {
            return Err("mesh has triangles with repeated vertex indices".to_string());
        }
        Ok(())
    }

    /// Unique undirected edges, each stored as `[low, high]`, in first-seen order.
    #[must_use]
    pub fn edges(&self) -> Vec<[usize; 2]> {
        let mut seen: HashSet<[usize; 2]> = HashSet::with_capacity(self.triangles.len() * 2);
        let mut edges = Vec::with_capacity(self.triangles.len() * 2);
        for tri in &self.triangles {
            for k in 0..3 {
                let key = edge_key(tri[k], tri[(k + 1) % 3]);
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        }
        edges
    }

    /// Number of triangles using each undirected edge.
    fn edge_use_counts(&self) -> HashMap<[usize; 2], usize> {
        let mut counts = HashMap::with_capacity(self.triangles.len() * 2);
        for tri in &self.triangles {
            for k in 0..3 {
                *counts.entry(edge_key(tri[k], tri[(k + 1) % 3])).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Edges used by exactly one triangle, oriented as they appear in that triangle.
    ///
    /// For a counterclockwise mesh this walks the outer boundary counterclockwise
    /// and hole boundaries clockwise.
    #[must_use]
    pub fn boundary_edges(&self) -> Vec<[usize; 2]> {
        let counts = self.edge_use_counts();
        let mut boundary = Vec::new();
        for tri in &self.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                if counts.get(&edge_key(a, b)) == Some(&1) {
                    boundary.push([a, b]);
                }
            }
        }
        boundary
    }

    /// Number of edges shared by more than two triangles.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_use_counts().values().filter(|&&n| n > 2).count()
    }

    /// Sorted, deduplicated indices of vertices that lie on a boundary edge.
    #[must_use]
    pub fn boundary_vertices(&self) -> Vec<usize> {
        let mut on_boundary = vec![false; self.vertices.len()];
        for [a, b] in self.boundary_edges() {
            on_boundary[a] = true;
            on_boundary[b] = true;
        }
        on_boundary
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| flag.then_some(i))
            .collect()
    }

    /// Length of every triangle edge, three per triangle (shared edges repeat).
    #[must_use]
    pub fn edge_lengths(&self) -> Vec<f64> {
        self.triangles
            .iter()
            .flat_map(|tri| {
                (0..3).map(move |k| {
                    distance(self.vertices[tri[k]], self.vertices[tri[(k + 1) % 3]])
                })
            })
            .collect()
    }

    /// Longest triangle edge, `None` for a mesh without triangles.
    #[must_use]
    pub fn max_edge_length(&self) -> Option<f64> {
        self.edge_lengths().into_iter().reduce(f64::max)
    }

    /// Signed area of each triangle (positive when counterclockwise).
    #[must_use]
    pub fn triangle_areas(&self) -> Vec<f64> {
        self.triangles
            .iter()
            .map(|&[a, b, c]| 0.5 * orient2d(self.vertices[a], self.vertices[b], self.vertices[c]))
            .collect()
    }

    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.triangle_areas().iter().map(|a| a.abs()).sum()
    }

    /// Smallest interior angle over all triangles, in degrees.
    #[must_use]
    pub fn min_angle_deg(&self) -> Option<f64> {
        self.triangles
            .iter()
            .map(|&[a, b, c]| {
                let p = [self.vertices[a], self.vertices[b], self.vertices[c]];
                (0..3)
                    .map(|k| corner_angle(p[k], p[(k + 1) % 3], p[(k + 2) % 3]))
                    .fold(f64::INFINITY, f64::min)
            })
            .reduce(f64::min)
            .map(f64::to_degrees)
    }

    /// Vertex-to-vertex adjacency lists, sorted and without duplicates.
    #[must_use]
    pub fn vertex_neighbors(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![Vec::new(); self.vertices.len()];
        for [a, b] in self.edges() {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }
        neighbors
    }

    /// Triangles incident to each vertex.
    #[must_use]
    pub fn vertex_triangles(&self) -> Vec<Vec<usize>> {
        let mut incident = vec![Vec::new(); self.vertices.len()];
        for (t, tri) in self.triangles.iter().enumerate() {
            for &v in tri {
                incident[v].push(t);
            }
        }
        incident
    }

    /// Returns a copy with every vertex shifted by `offset`.
    #[must_use]
    pub fn translated(&self, offset: Point2) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|p| [p[0] + offset[0], p[1] + offset[1]])
                .collect(),
            triangles: self.triangles.clone(),
        }
    }

    /// Triangles whose area is negligible relative to the mesh scale.
    #[must_use]
    pub fn collapsed_triangle_count(&self, tol: Tolerance) -> usize {
        let scale = self.max_edge_length().unwrap_or(0.0);
        let threshold = tol.relative_to(scale * scale);
        self.triangle_areas()
            .iter()
            .filter(|a| a.abs() <= threshold)
            .count()
    }
}

fn edge_key(a: usize, b: usize) -> [usize; 2] {
    if a < b { [a, b] } else { [b, a] }
}

/// Interior angle at `p` in triangle `(p, q, r)`, in radians.
fn corner_angle(p: Point2, q: Point2, r: Point2) -> f64 {
    let u = sub(q, p);
    let v = sub(r, p);
    let denom = dot(u, u).sqrt() * dot(v, v).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot(u, v) / denom).clamp(-1.0, 1.0).acos()
}

/// Per-call state threaded through the `_with_context` entry points.
#[derive(Debug)]
pub struct MeshContext {
    pub tolerance: Tolerance,
    pub metrics: MeshMetrics,
}

impl MeshContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tolerance: Tolerance::default(),
            metrics: MeshMetrics::default(),
        }
    }
}

impl Default for MeshContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangle_square() -> Mesh {
        Mesh::new(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn edges_are_unique() {
        let mesh = two_triangle_square();
        let edges = mesh.edges();
        assert_eq!(edges.len(), 5);
        assert!(edges.contains(&[0, 2]));
    }

    #[test]
    fn boundary_edges_skip_the_diagonal() {
        let mesh = two_triangle_square();
        let boundary = mesh.boundary_edges();
        assert_eq!(boundary.len(), 4);
        assert!(!boundary.contains(&[0, 2]) && !boundary.contains(&[2, 0]));
        assert_eq!(mesh.boundary_vertices(), vec![0, 1, 2, 3]);
        assert_eq!(mesh.non_manifold_edge_count(), 0);
    }

    #[test]
    fn lengths_areas_and_angles() {
        let mesh = two_triangle_square();
        let max = mesh.max_edge_length().unwrap();
        assert!((max - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((mesh.total_area() - 1.0).abs() < 1e-12);
        assert!(mesh.triangle_areas().iter().all(|&a| a > 0.0));
        assert!((mesh.min_angle_deg().unwrap() - 45.0).abs() < 1e-9);
        assert_eq!(mesh.collapsed_triangle_count(Tolerance::default()), 0);
    }

    #[test]
    fn slivers_count_as_collapsed_under_the_given_tolerance() {
        let sliver = Mesh::new(
            vec![[0.0, 0.0], [1.0, 0.0], [0.5, 1e-12]],
            vec![[0, 1, 2]],
        );
        assert_eq!(sliver.collapsed_triangle_count(Tolerance::default()), 1);
        assert_eq!(sliver.collapsed_triangle_count(Tolerance::new(1e-15)), 0);
    }

    #[test]
    fn empty_mesh_has_no_max_length() {
        let mesh = Mesh::default();
        assert!(mesh.max_edge_length().is_none());
        assert!(mesh.min_angle_deg().is_none());
        assert!(mesh.is_empty());
    }

    #[test]
    fn validate_rejects_bad_buffers() {
        let mesh = Mesh::new(vec![[0.0, 0.0]], vec![[0, 1, 2]]);
        assert!(mesh.validate().is_err());

        let mesh = Mesh::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]], vec![[0, 0, 2]]);
        assert!(mesh.validate().is_err());

        let mesh = Mesh::new(vec![[f64::NAN, 0.0], [1.0, 0.0], [0.0, 1.0]], vec![[0, 1, 2]]);
        assert!(mesh.validate().is_err());

        assert!(two_triangle_square().validate().is_ok());
    }

    #[test]
    fn neighbors_and_incidence() {
        let mesh = two_triangle_square();
        let neighbors = mesh.vertex_neighbors();
        assert_eq!(neighbors[0], vec![1, 2, 3]);
        assert_eq!(neighbors[1], vec![0, 2]);
        let incident = mesh.vertex_triangles();
        assert_eq!(incident[2], vec![0, 1]);
    }

    #[test]
    fn translation_keeps_connectivity() {
        let mesh = two_triangle_square();
        let moved = mesh.translated([2.0, -1.0]);
        assert_eq!(moved.triangles, mesh.triangles);
        assert_eq!(moved.vertices[2], [3.0, 0.0]);
    }
}
