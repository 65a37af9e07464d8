//! Backend-agnostic mesh primitives
//!
//! Vertex layout matches the fixed pipeline: position, vertex color and
//! texture coordinates. The Vulkan-side input descriptions live in
//! `render::vulkan::vertex_layout`.

/// A single mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Per-vertex color, multiplied with the sampled texture
    pub color: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex from its components
    pub fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }
}

/// An indexed triangle mesh
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        // The pipeline's attribute offsets assume no padding between fields.
        assert_eq!(std::mem::size_of::<Vertex>(), 8 * std::mem::size_of::<f32>());
    }

    #[test]
    fn mesh_index_count() {
        let mesh = Mesh {
            vertices: vec![Vertex::new([0.0; 3], [1.0; 3], [0.0; 2]); 3],
            indices: vec![0, 1, 2],
        };
        assert_eq!(mesh.index_count(), 3);
    }
}
