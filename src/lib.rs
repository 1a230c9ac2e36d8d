#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Two-dimensional mesh generation for finite-volume device simulations.
//!
//! The pipeline turns a polygon with optional holes into a triangle mesh,
//! optionally relaxes it for triangle quality and recovers ordered boundary
//! loops:
//!
//! ```
//! use tdgl_mesh::geom::{MeshOptions, OptimizeOptions, generate_mesh, optimize_mesh, oriented_boundary};
//!
//! let film = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]];
//! let hole = vec![[1.0, 0.5], [2.0, 0.5], [2.0, 1.5], [1.0, 1.5]];
//!
//! let options = MeshOptions::default().max_edge_length(0.3);
//! let mesh = generate_mesh(&film, &[hole], &options)?;
//! let mesh = optimize_mesh(&mesh, &OptimizeOptions::new(10))?;
//! let loops = oriented_boundary(&mesh.vertices, &mesh.boundary_edges())?;
//! assert_eq!(loops.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The crate logs through the [`log`] facade and never installs a logger.

pub mod geom;

pub use geom::{
    BoundaryError, Mesh, MeshGenError, MeshOptions, OptimizeOptions, SmoothError,
    ensure_unique, generate_mesh, optimize_mesh, oriented_boundary,
};
