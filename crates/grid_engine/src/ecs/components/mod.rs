//! Component types for the demo scene

use crate::ecs::Component;
use crate::render::mesh::Mesh;

/// A drawable mesh attached to an entity
#[derive(Debug, Clone, Default)]
pub struct MeshComponent {
    /// The mesh to draw
    pub mesh: Mesh,
}

impl MeshComponent {
    /// Wrap a mesh as a component
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh }
    }
}

impl Component for MeshComponent {}

/// The playing-field grid
///
/// At most one grid exists, so grid positions do not reference a specific
/// grid entity.
#[derive(Debug, Clone, Copy)]
pub struct GridComponent {
    /// Number of cells along X
    pub width: u32,
    /// Number of cells along Y
    pub height: u32,
}

impl Component for GridComponent {}

/// Position on the 2D grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPosition2D {
    /// Cell column
    pub x: u32,
    /// Cell row
    pub y: u32,
}

impl Component for GridPosition2D {}

/// Movement speed in cells per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementSpeed {
    /// Speed value
    pub speed: f32,
}

impl Component for MovementSpeed {}
