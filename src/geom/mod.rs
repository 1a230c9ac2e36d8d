mod boundary;
mod core;
mod dedup;
mod diagnostics;
mod generate;
mod mesh;
mod metrics;
mod smoothing;
mod triangulation;

pub use boundary::{
    BoundaryError, loop_area, mesh_boundary_loops_with_context, oriented_boundary,
    split_outer_and_holes,
};
pub use core::{BBox2, Point2, Tolerance, signed_area};
pub use dedup::{duplicate_count, ensure_unique};
pub use diagnostics::MeshDiagnostics;
pub use generate::{
    MeshGenError, MeshOptions, PreparedDomain, RefinementReport, RefinementTargets,
    generate_mesh, generate_mesh_with_context, refine_to_targets,
};
pub use mesh::{Mesh, MeshContext};
pub use metrics::{MeshMetrics, MeshTimingReport, TimingBucket};
pub use smoothing::{
    CvtSmoother, MeshSmoother, OptimizeOptions, SmoothError, SmoothingMethod, optimize_mesh,
    optimize_mesh_with, optimize_mesh_with_context,
};
pub use triangulation::{
    PlanarGraph, SpadeTriangulator, TriangulationError, TriangulationOptions,
    TriangulationResult, Triangulator, convex_hull_facets, ring_facets,
};

#[cfg(test)]
mod tests;
