//! Ordered boundary loops from an unordered set of boundary edges.
//!
//! Segments are merged by exact coordinate into a planar graph, dangling
//! chains are pruned, and the bounded faces of the remaining graph are traced
//! by always taking the next outgoing edge clockwise from the one just
//! arrived on. That walk keeps the face on its left, so every bounded face
//! comes out counterclockwise and the unbounded face of each component
//! comes out clockwise and is discarded.

use std::collections::HashMap;

use super::core::{Point2, is_finite, point_key, signed_area};
use super::mesh::{Mesh, MeshContext};
use super::metrics::TimingBucket;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundaryError {
    #[error("boundary edge {edge} references vertex {index}, but the mesh has {len} vertices")]
    EdgeOutOfRange { edge: usize, index: usize, len: usize },

    #[error("boundary vertex {index} has a non-finite coordinate")]
    NonFiniteVertex { index: usize },
}

/// Coordinate-merged undirected graph of boundary segments.
#[derive(Debug, Default)]
struct SegmentGraph {
    nodes: Vec<Point2>,
    /// Smallest vertex index carrying each node's coordinate.
    vertex_of: Vec<usize>,
    /// Neighbours of each node, sorted counterclockwise by direction.
    adjacency: Vec<Vec<usize>>,
}

impl SegmentGraph {
    fn build(vertices: &[Point2], edges: &[[usize; 2]]) -> Result<Self, BoundaryError> {
        let mut graph = Self::default();
        let mut node_of: HashMap<(u64, u64), usize> = HashMap::new();
        let mut first_index: HashMap<(u64, u64), usize> = HashMap::with_capacity(vertices.len());
        for (i, &p) in vertices.iter().enumerate() {
            first_index.entry(point_key(p)).or_insert(i);
        }

        for (edge, &[a, b]) in edges.iter().enumerate() {
            let mut ends = [0; 2];
            for (slot, index) in ends.iter_mut().zip([a, b]) {
                let p = *vertices.get(index).ok_or(BoundaryError::EdgeOutOfRange {
                    edge,
                    index,
                    len: vertices.len(),
                })?;
                if !is_finite(p) {
                    return Err(BoundaryError::NonFiniteVertex { index });
                }
                let key = point_key(p);
                *slot = *node_of.entry(key).or_insert_with(|| {
                    graph.nodes.push(p);
                    graph.vertex_of.push(first_index.get(&key).copied().unwrap_or(index));
                    graph.adjacency.push(Vec::new());
                    graph.nodes.len() - 1
                });
            }
            let [u, v] = ends;
            if u != v && !graph.adjacency[u].contains(&v) {
                graph.adjacency[u].push(v);
                graph.adjacency[v].push(u);
            }
        }

        graph.prune_dangling();
        graph.sort_by_angle();
        Ok(graph)
    }

    /// Repeatedly removes degree-1 nodes so only closed chains remain.
    fn prune_dangling(&mut self) {
        let mut stack: Vec<usize> = (0..self.nodes.len())
            .filter(|&n| self.adjacency[n].len() == 1)
            .collect();
        while let Some(n) = stack.pop() {
            let Some(&m) = self.adjacency[n].first() else {
                continue;
            };
            self.adjacency[n].clear();
            self.adjacency[m].retain(|&k| k != n);
            if self.adjacency[m].len() == 1 {
                stack.push(m);
            }
        }
    }

    fn sort_by_angle(&mut self) {
        for (n, neighbors) in self.adjacency.iter_mut().enumerate() {
            let origin = self.nodes[n];
            neighbors.sort_by(|&a, &b| {
                let pa = self.nodes[a];
                let pb = self.nodes[b];
                let angle_a = (pa[1] - origin[1]).atan2(pa[0] - origin[0]);
                let angle_b = (pb[1] - origin[1]).atan2(pb[0] - origin[0]);
                angle_a.total_cmp(&angle_b)
            });
        }
    }

    /// Every face of the graph as a node cycle.
    fn faces(&self) -> Vec<Vec<usize>> {
        let mut offsets = Vec::with_capacity(self.adjacency.len() + 1);
        let mut total = 0;
        for neighbors in &self.adjacency {
            offsets.push(total);
            total += neighbors.len();
        }
        let mut visited = vec![false; total];

        let mut faces = Vec::new();
        for start in 0..self.adjacency.len() {
            for k in 0..self.adjacency[start].len() {
                if visited[offsets[start] + k] {
                    continue;
                }
                let mut face = Vec::new();
                let (mut u, mut slot) = (start, k);
                while !visited[offsets[u] + slot] {
                    visited[offsets[u] + slot] = true;
                    face.push(u);
                    let v = self.adjacency[u][slot];
                    let around = &self.adjacency[v];
                    let Some(back) = around.iter().position(|&w| w == u) else {
                        break;
                    };
                    slot = (back + around.len() - 1) % around.len();
                    u = v;
                }
                faces.push(face);
            }
        }
        faces
    }
}

/// Counterclockwise vertex-index loops bounded by `edges`.
///
/// Each loop starts at its smallest vertex index and omits the closing
/// vertex. Loops are ordered by decreasing area, so for a polygon with holes
/// the outer boundary comes first. Coordinates shared by several vertices
/// resolve to the first such vertex.
pub fn oriented_boundary(
    vertices: &[Point2],
    edges: &[[usize; 2]],
) -> Result<Vec<Vec<usize>>, BoundaryError> {
    let graph = SegmentGraph::build(vertices, edges)?;

    let mut loops = Vec::new();
    for face in graph.faces() {
        let ring: Vec<Point2> = face.iter().map(|&n| graph.nodes[n]).collect();
        let area = signed_area(&ring);
        if area <= 0.0 {
            continue;
        }
        let indices = face.iter().map(|&n| graph.vertex_of[n]).collect();
        loops.push((area, rotate_to_min(indices)));
    }

    loops.sort_by(|a, b| b.0.total_cmp(&a.0));
    Ok(loops.into_iter().map(|(_, indices)| indices).collect())
}

/// Boundary loops of `mesh`, timed under [`TimingBucket::BoundaryExtraction`].
pub fn mesh_boundary_loops_with_context(
    mesh: &Mesh,
    ctx: &mut MeshContext,
) -> Result<Vec<Vec<usize>>, BoundaryError> {
    ctx.metrics.time(TimingBucket::BoundaryExtraction, || {
        oriented_boundary(&mesh.vertices, &mesh.boundary_edges())
    })
}

fn rotate_to_min(mut indices: Vec<usize>) -> Vec<usize> {
    if let Some(start) = indices
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| v)
        .map(|(i, _)| i)
    {
        indices.rotate_left(start);
    }
    indices
}

/// Signed area of a loop of vertex indices.
#[must_use]
pub fn loop_area(vertices: &[Point2], indices: &[usize]) -> f64 {
    let ring: Vec<Point2> = indices
        .iter()
        .filter_map(|&i| vertices.get(i).copied())
        .collect();
    signed_area(&ring)
}

/// Separates the loop with the largest absolute area from the rest.
///
/// Returns `None` for an empty list.
#[must_use]
pub fn split_outer_and_holes(
    vertices: &[Point2],
    mut loops: Vec<Vec<usize>>,
) -> Option<(Vec<usize>, Vec<Vec<usize>>)> {
    let outer = loops
        .iter()
        .enumerate()
        .map(|(i, l)| (i, loop_area(vertices, l).abs()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)?;
    let outer_loop = loops.swap_remove(outer);
    Some((outer_loop, loops))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_square_hole() -> (Vec<Point2>, Vec<[usize; 2]>) {
        let vertices = vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 3.0],
            [0.0, 3.0],
            [1.0, 1.0],
            [2.0, 1.0],
            [2.0, 2.0],
            [1.0, 2.0],
        ];
        // Shuffled and with mixed directions.
        let edges = vec![[5, 4], [2, 3], [6, 5], [0, 1], [7, 6], [3, 0], [4, 7], [2, 1]];
        (vertices, edges)
    }

    #[test]
    fn square_gives_one_ccw_loop() {
        let vertices = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let edges = vec![[2, 1], [0, 3], [3, 2], [1, 0]];
        let loops = oriented_boundary(&vertices, &edges).unwrap();
        assert_eq!(loops, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn hole_is_a_separate_loop() {
        let (vertices, edges) = square_with_square_hole();
        let loops = oriented_boundary(&vertices, &edges).unwrap();
        assert_eq!(loops, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        for l in &loops {
            assert!(loop_area(&vertices, l) > 0.0);
        }
        let (outer, holes) = split_outer_and_holes(&vertices, loops).unwrap();
        assert_eq!(outer, vec![0, 1, 2, 3]);
        assert_eq!(holes, vec![vec![4, 5, 6, 7]]);
    }

    #[test]
    fn dangling_chain_is_pruned() {
        let vertices = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 2.0]];
        let edges = vec![[0, 1], [1, 2], [2, 0], [2, 3], [3, 4]];
        let loops = oriented_boundary(&vertices, &edges).unwrap();
        assert_eq!(loops, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn duplicate_coordinates_resolve_to_first_index() {
        let vertices = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
        let edges = vec![[0, 3], [1, 2], [2, 0]];
        let loops = oriented_boundary(&vertices, &edges).unwrap();
        assert_eq!(loops, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn duplicate_outside_the_edge_set_still_wins() {
        // Vertex 0 shares a coordinate with vertex 2 but no edge uses it.
        let vertices = vec![[1.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let edges = vec![[1, 2], [2, 3], [3, 1]];
        let loops = oriented_boundary(&vertices, &edges).unwrap();
        assert_eq!(loops, vec![vec![0, 3, 1]]);
    }

    #[test]
    fn shared_corner_loops() {
        // Two triangles touching at vertex 0.
        let vertices = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [-1.0, 0.0], [-1.0, -1.0]];
        let edges = vec![[0, 1], [1, 2], [2, 0], [0, 3], [3, 4], [4, 0]];
        let mut loops = oriented_boundary(&vertices, &edges).unwrap();
        loops.sort();
        assert_eq!(loops, vec![vec![0, 1, 2], vec![0, 3, 4]]);
    }

    #[test]
    fn invalid_input_is_reported() {
        let vertices = vec![[0.0, 0.0], [1.0, 0.0], [f64::NAN, 1.0]];
        assert_eq!(
            oriented_boundary(&vertices, &[[0, 7]]),
            Err(BoundaryError::EdgeOutOfRange {
                edge: 0,
                index: 7,
                len: 3
            })
        );
        assert_eq!(
            oriented_boundary(&vertices, &[[0, 1], [1, 2]]),
            Err(BoundaryError::NonFiniteVertex { index: 2 })
        );
        assert_eq!(oriented_boundary(&vertices, &[]), Ok(Vec::new()));
    }

    #[test]
    fn split_of_nothing_is_none() {
        assert!(split_outer_and_holes(&[], Vec::new()).is_none());
    }
}
