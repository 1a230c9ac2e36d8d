use crate::geom::triangulation::TriangulationOptions;
use crate::geom::{
    MeshContext, MeshGenError, MeshOptions, Point2, SpadeTriangulator, generate_mesh,
    generate_mesh_with_context, oriented_boundary,
};

const RECT: [Point2; 4] = [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]];

fn hole() -> Vec<Point2> {
    vec![[1.0, 0.5], [2.0, 0.5], [2.0, 1.5], [1.0, 1.5]]
}

fn index_of(vertices: &[Point2], p: Point2) -> usize {
    vertices
        .iter()
        .position(|&v| v == p)
        .unwrap_or_else(|| panic!("vertex {p:?} missing from mesh"))
}

#[test]
fn rectangle_mesh_is_valid_and_bounded_by_its_corners() {
    let mesh = generate_mesh(&RECT, &[], &MeshOptions::default()).expect("mesh");
    mesh.validate().expect("valid mesh");
    assert!((mesh.total_area() - 8.0).abs() < 1e-9);
    assert!(mesh.triangle_areas().iter().all(|&a| a > 0.0));

    let loops = oriented_boundary(&mesh.vertices, &mesh.boundary_edges()).expect("loops");
    assert_eq!(loops.len(), 1);
    let corners: Vec<usize> = RECT.iter().map(|&p| index_of(&mesh.vertices, p)).collect();
    let positions: Vec<usize> = corners
        .iter()
        .map(|c| loops[0].iter().position(|v| v == c).expect("corner on loop"))
        .collect();
    // Counterclockwise: corners appear in ring order up to rotation.
    let start = positions.iter().enumerate().min_by_key(|(_, p)| **p).map_or(0, |(i, _)| i);
    let rotated: Vec<usize> = (0..4).map(|k| positions[(start + k) % 4]).collect();
    assert!(rotated.windows(2).all(|w| w[0] < w[1]), "corner order {positions:?}");
}

#[test]
fn rectangle_with_hole_has_two_disjoint_loops() {
    let mesh = generate_mesh(&RECT, &[hole()], &MeshOptions::default()).expect("mesh");
    mesh.validate().expect("valid mesh");
    assert!((mesh.total_area() - 7.0).abs() < 1e-9);

    let loops = oriented_boundary(&mesh.vertices, &mesh.boundary_edges()).expect("loops");
    assert_eq!(loops.len(), 2);
    assert!(loops[0].iter().all(|v| !loops[1].contains(v)));
    for p in hole() {
        let idx = index_of(&mesh.vertices, p);
        assert!(loops[1].contains(&idx));
    }
}

#[test]
fn refinement_reaches_both_targets() {
    let options = MeshOptions::default().min_points(200).max_edge_length(0.25);
    let mut ctx = MeshContext::new();
    let (mesh, diag) = generate_mesh_with_context(
        &RECT,
        &[hole()],
        &options,
        &SpadeTriangulator::default(),
        &mut ctx,
    )
    .expect("refined mesh");

    assert!(mesh.vertex_count() >= 200);
    assert!(mesh.max_edge_length().expect("edges") <= 0.25);
    assert!(mesh.has_valid_indices());
    assert!(diag.is_manifold());
    assert!(diag.min_angle_deg > 0.0);
    assert!((mesh.total_area() - 7.0).abs() < 1e-9);
}

#[test]
fn point_count_alone_drives_refinement() {
    let options = MeshOptions::default().min_points(100);
    let mesh = generate_mesh(&RECT, &[], &options).expect("mesh");
    assert!(mesh.vertex_count() >= 100);
}

#[test]
fn unrefined_engine_keeps_only_input_points() {
    let options = MeshOptions::default().engine(TriangulationOptions::unrefined());
    let mesh = generate_mesh(&RECT, &[hole()], &options).expect("mesh");
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.triangle_count(), 8);
}

#[test]
fn unrefined_engine_still_meets_edge_target() {
    let options = MeshOptions::default()
        .engine(TriangulationOptions::unrefined())
        .max_edge_length(0.3);
    let mesh = generate_mesh(&RECT, &[hole()], &options).expect("mesh");
    mesh.validate().expect("valid mesh");
    assert!(mesh.vertex_count() > 8);
    assert!(mesh.max_edge_length().expect("edges") <= 0.3);
    assert!((mesh.total_area() - 7.0).abs() < 1e-9);
}

#[test]
fn convex_hull_fills_concavities() {
    let l_shape = [[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]];
    let concave = generate_mesh(&l_shape, &[], &MeshOptions::default()).expect("mesh");
    assert!((concave.total_area() - 3.0).abs() < 1e-9);

    let hull = generate_mesh(&l_shape, &[], &MeshOptions::default().convex_hull(true)).expect("mesh");
    assert!((hull.total_area() - 3.5).abs() < 1e-9);
}

#[test]
fn convex_hull_with_boundary_is_rejected() {
    let options = MeshOptions::default()
        .convex_hull(true)
        .boundary(RECT.to_vec());
    assert!(matches!(
        generate_mesh(&RECT, &[], &options),
        Err(MeshGenError::ConflictingOptions(_))
    ));
}

#[test]
fn exhausted_budget_reports_target_not_reached() {
    let options = MeshOptions::default()
        .max_edge_length(1e-6)
        .max_iterations(2);
    match generate_mesh(&RECT, &[], &options) {
        Err(MeshGenError::TargetNotReached {
            iterations,
            max_edge_length,
            ..
        }) => {
            assert_eq!(iterations, 2);
            assert!(max_edge_length > 1e-6);
        }
        other => panic!("expected TargetNotReached, got {other:?}"),
    }
}

#[test]
fn duplicate_input_points_are_ignored() {
    let ring = [
        [0.0, 0.0],
        [4.0, 0.0],
        [4.0, 0.0],
        [4.0, 2.0],
        [0.0, 2.0],
        [0.0, 0.0],
    ];
    let mut ctx = MeshContext::new();
    let (mesh, diag) = generate_mesh_with_context(
        &ring,
        &[],
        &MeshOptions::default(),
        &SpadeTriangulator::default(),
        &mut ctx,
    )
    .expect("mesh");
    assert_eq!(diag.duplicate_points_removed, 2);
    assert!((mesh.total_area() - 8.0).abs() < 1e-9);
}

#[test]
fn offset_input_coordinates_round_trip_exactly() {
    let outer: Vec<Point2> = RECT.iter().map(|p| [p[0] + 1.0e5 + 0.1, p[1] - 3.3]).collect();
    let holes: Vec<Vec<Point2>> = vec![
        hole()
            .iter()
            .map(|p| [p[0] + 1.0e5 + 0.1, p[1] - 3.3])
            .collect(),
    ];
    let mesh = generate_mesh(&outer, &holes, &MeshOptions::default().max_edge_length(0.5))
        .expect("mesh");
    for p in outer.iter().chain(holes.iter().flatten()) {
        assert!(
            mesh.vertices.iter().any(|v| v[0].to_bits() == p[0].to_bits() && v[1].to_bits() == p[1].to_bits()),
            "input point {p:?} not preserved"
        );
    }
}
