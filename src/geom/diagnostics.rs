//! Mesh diagnostics for the meshing pipeline.
//!
//! Diagnostics are collected alongside every `_with_context` call and describe
//! what the pipeline produced and how hard it had to work for it:
//!
//! - size of the final mesh (vertices, triangles, boundary edges)
//! - topology problems (non-manifold edges)
//! - refinement effort (iterations, final area bound, achieved edge length)
//! - quality (smallest triangle angle)
//! - optional timing buckets
//!
//! ```ignore
//! let (mesh, diagnostics) = generate_mesh_with_context(&outer, &[], &options, &engine, &mut ctx)?;
//! log::debug!("{}", diagnostics.summary());
//! ```

use std::fmt;

use super::mesh::Mesh;
use super::metrics::MeshTimingReport;

/// Statistics about a generated or post-processed mesh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshDiagnostics {
    /// Total number of vertices in the final mesh.
    pub vertex_count: usize,

    /// Total number of triangles in the final mesh.
    pub triangle_count: usize,

    /// Edges used by exactly one triangle (outer boundary plus hole boundaries).
    pub boundary_edge_count: usize,

    /// Edges shared by more than two triangles. Zero for any valid planar mesh.
    pub non_manifold_edge_count: usize,

    /// Number of input coordinates dropped as exact duplicates.
    pub duplicate_points_removed: usize,

    /// Re-triangulations performed by the refinement loop (0 when skipped).
    pub refinement_iterations: usize,

    /// Area bound used for the final triangulation, if the loop ran.
    pub final_area_bound: Option<f64>,

    /// Longest triangle edge in the final mesh.
    pub max_edge_length: f64,

    /// Smallest interior triangle angle in degrees.
    pub min_angle_deg: f64,

    /// Optional timing breakdown, populated with the `mesh_metrics` feature.
    pub timing: Option<MeshTimingReport>,

    /// Human-readable notes about recoverable oddities (e.g. a hole marker that
    /// fell outside the triangulation).
    pub warnings: Vec<String>,
}

impl MeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the size, topology and quality fields from `mesh`.
    #[must_use]
    pub fn for_mesh(mesh: &Mesh) -> Self {
        Self {
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
            boundary_edge_count: mesh.boundary_edges().len(),
            non_manifold_edge_count: mesh.non_manifold_edge_count(),
            max_edge_length: mesh.max_edge_length().unwrap_or(0.0),
            min_angle_deg: mesh.min_angle_deg().unwrap_or(0.0),
            ..Self::default()
        }
    }

    /// Returns `true` if no edge is shared by more than two triangles.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count == 0
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Short summary suitable for logging: `"V:{vertices} T:{triangles} ..."`.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("V:{} T:{}", self.vertex_count, self.triangle_count)];
        parts.push(format!("max-edge:{:.3e}", self.max_edge_length));
        parts.push(format!("min-angle:{:.1}", self.min_angle_deg));
        if self.duplicate_points_removed > 0 {
            parts.push(format!("dedup:{}", self.duplicate_points_removed));
        }
        if self.refinement_iterations > 0 {
            parts.push(format!("refine:{}", self.refinement_iterations));
        }
        if self.non_manifold_edge_count > 0 {
            parts.push(format!("non-manifold:{}", self.non_manifold_edge_count));
        }
        parts.join(" ")
    }
}

impl fmt::Display for MeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Triangles: {}", self.triangle_count)?;
        writeln!(f, "  Boundary edges: {}", self.boundary_edge_count)?;
        writeln!(f, "  Max edge length: {:.6e}", self.max_edge_length)?;
        writeln!(f, "  Min angle: {:.2} deg", self.min_angle_deg)?;

        if self.duplicate_points_removed > 0 {
            writeln!(f, "  Duplicate points removed: {}", self.duplicate_points_removed)?;
        }
        if self.refinement_iterations > 0 {
            writeln!(f, "  Refinement iterations: {}", self.refinement_iterations)?;
        }
        if let Some(bound) = self.final_area_bound {
            writeln!(f, "  Final area bound: {bound:.6e}")?;
        }
        if self.non_manifold_edge_count > 0 {
            writeln!(f, "  Non-manifold edges: {}", self.non_manifold_edge_count)?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }

        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }

        Ok(())
    }
}
