use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom::{
    CvtSmoother, Mesh, MeshContext, MeshOptions, OptimizeOptions, SmoothingMethod, generate_mesh,
    optimize_mesh, optimize_mesh_with_context,
};

const METHODS: [SmoothingMethod; 3] = [
    SmoothingMethod::CvtBlockDiagonal,
    SmoothingMethod::CvtDiagonal,
    SmoothingMethod::Laplace,
];

/// `n` x `n` grid on the unit square, each cell split along its diagonal.
fn grid(n: usize) -> Mesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push([i as f64 / n as f64, j as f64 / n as f64]);
        }
    }
    let mut triangles = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            let a = j * (n + 1) + i;
            triangles.push([a, a + 1, a + n + 2]);
            triangles.push([a, a + n + 2, a + n + 1]);
        }
    }
    Mesh::new(vertices, triangles)
}

fn jittered_grid(n: usize, seed: u64) -> Mesh {
    let mut mesh = grid(n);
    let mut rng = StdRng::seed_from_u64(seed);
    let amplitude = 0.3 / n as f64;
    for j in 1..n {
        for i in 1..n {
            let v = &mut mesh.vertices[j * (n + 1) + i];
            v[0] += rng.random_range(-amplitude..amplitude);
            v[1] += rng.random_range(-amplitude..amplitude);
        }
    }
    mesh
}

/// Shape quality in (0, 1], 1 for an equilateral triangle.
fn qualities(mesh: &Mesh) -> Vec<f64> {
    mesh.triangles
        .iter()
        .zip(mesh.triangle_areas())
        .map(|(&[a, b, c], area)| {
            let p = [mesh.vertices[a], mesh.vertices[b], mesh.vertices[c]];
            let squares: f64 = (0..3)
                .map(|k| {
                    let dx = p[k][0] - p[(k + 1) % 3][0];
                    let dy = p[k][1] - p[(k + 1) % 3][1];
                    dx * dx + dy * dy
                })
                .sum();
            4.0 * 3.0_f64.sqrt() * area / squares
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

#[test]
fn smoothing_improves_jittered_grid() {
    for seed in [1, 2, 3] {
        let mesh = jittered_grid(8, seed);
        let before = qualities(&mesh);
        for method in METHODS {
            let smoothed = optimize_mesh(&mesh, &OptimizeOptions::new(20).method(method))
                .expect("smoothing");
            let after = qualities(&smoothed);
            assert!(min(&after) > 0.0, "{method}: inverted triangle");
            assert!(mean(&after) > mean(&before), "{method}: mean quality dropped");
            assert!(min(&after) > min(&before), "{method}: worst triangle got worse");
        }
    }
}

#[test]
fn smoothing_preserves_connectivity_and_boundary() {
    let mesh = generate_mesh(
        &[[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]],
        &[vec![[1.0, 0.5], [2.0, 0.5], [2.0, 1.5], [1.0, 1.5]]],
        &MeshOptions::default().max_edge_length(0.3),
    )
    .expect("mesh");
    let boundary = mesh.boundary_vertices();

    for method in METHODS {
        let smoothed = optimize_mesh(&mesh, &OptimizeOptions::new(5).method(method))
            .expect("smoothing");
        assert_eq!(smoothed.triangles, mesh.triangles);
        assert_eq!(smoothed.vertex_count(), mesh.vertex_count());
        for &v in &boundary {
            assert_eq!(smoothed.vertices[v], mesh.vertices[v]);
        }
        assert!(smoothed.triangle_areas().iter().all(|&a| a > 0.0));
        assert!((smoothed.total_area() - mesh.total_area()).abs() < 1e-9);
    }
}

#[test]
fn context_variant_reports_diagnostics() {
    let mesh = jittered_grid(4, 11);
    let mut ctx = MeshContext::new();
    let (smoothed, diag) =
        optimize_mesh_with_context(&CvtSmoother, &mesh, &OptimizeOptions::default(), &mut ctx)
            .expect("smoothing");
    assert_eq!(diag.vertex_count, smoothed.vertex_count());
    assert_eq!(diag.triangle_count, mesh.triangle_count());
    assert_eq!(diag.boundary_edge_count, 16);
}

#[test]
fn unjittered_grid_is_a_fixed_point() {
    let mesh = grid(5);
    for method in METHODS {
        let smoothed = optimize_mesh(&mesh, &OptimizeOptions::new(3).method(method))
            .expect("smoothing");
        for (a, b) in smoothed.vertices.iter().zip(&mesh.vertices) {
            assert!((a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9, "{method}");
        }
    }
}
