//! Grid mesh generation

use crate::render::mesh::{Mesh, Vertex};

/// Builds the playing-field quad grid
pub struct GridSystem;

impl GridSystem {
    /// Generate an n×n grid of quads spanning [-1, 1] in X and Y
    ///
    /// Each cell contributes four vertices (corner colors cycling red, green,
    /// blue, white, with per-cell UV corners) and two triangles.
    pub fn grid_mesh(grid_size: u16) -> Mesh {
        let mut mesh = Mesh::new();
        let starting_value = -1.0f32;
        let increment = 2.0 / f32::from(grid_size);

        let mut x = starting_value;
        let mut y = starting_value;
        let mut index = 0u32;
        for _ in 0..grid_size {
            for _ in 0..grid_size {
                mesh.vertices.push(Vertex::new(
                    [x, y, 0.0],
                    [1.0, 0.0, 0.0],
                    [0.0, 0.0],
                ));
                mesh.vertices.push(Vertex::new(
                    [x + increment, y, 0.0],
                    [0.0, 1.0, 0.0],
                    [1.0, 0.0],
                ));
                mesh.vertices.push(Vertex::new(
                    [x + increment, y + increment, 0.0],
                    [0.0, 0.0, 1.0],
                    [1.0, 1.0],
                ));
                mesh.vertices.push(Vertex::new(
                    [x, y + increment, 0.0],
                    [1.0, 1.0, 1.0],
                    [0.0, 1.0],
                ));

                mesh.indices.extend_from_slice(&[
                    index,
                    index + 1,
                    index + 2,
                    index + 2,
                    index + 3,
                    index,
                ]);
                index += 4;
                x += increment;
            }
            y += increment;
            x = starting_value;
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn grid_mesh_has_four_vertices_and_six_indices_per_cell() {
        let mesh = GridSystem::grid_mesh(10);
        assert_eq!(mesh.vertices.len(), 4 * 100);
        assert_eq!(mesh.indices.len(), 6 * 100);
        assert_eq!(mesh.index_count(), 600);
    }

    #[test]
    fn first_cell_uses_the_quad_index_pattern() {
        let mesh = GridSystem::grid_mesh(2);
        assert_eq!(&mesh.indices[..6], &[0, 1, 2, 2, 3, 0]);
        // Second cell starts four vertices later.
        assert_eq!(&mesh.indices[6..12], &[4, 5, 6, 6, 7, 4]);
    }

    #[test]
    fn cells_span_the_unit_square() {
        let mesh = GridSystem::grid_mesh(4);
        for vertex in &mesh.vertices {
            assert!(vertex.position[0] >= -1.0 && vertex.position[0] <= 1.0 + 1e-5);
            assert!(vertex.position[1] >= -1.0 && vertex.position[1] <= 1.0 + 1e-5);
            assert_relative_eq!(vertex.position[2], 0.0);
        }

        // First cell's corners cover one half-unit at grid size 4.
        let first = &mesh.vertices[..4];
        assert_relative_eq!(first[0].position[0], -1.0);
        assert_relative_eq!(first[1].position[0], -0.5);
        assert_relative_eq!(first[2].position[1], -0.5);
    }

    #[test]
    fn cell_corners_carry_uv_corners() {
        let mesh = GridSystem::grid_mesh(1);
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 0.0]);
        assert_eq!(mesh.vertices[1].tex_coord, [1.0, 0.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [1.0, 1.0]);
        assert_eq!(mesh.vertices[3].tex_coord, [0.0, 1.0]);
    }

    #[test]
    fn all_indices_reference_existing_vertices() {
        let mesh = GridSystem::grid_mesh(3);
        let vertex_count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < vertex_count));
    }
}
