//! Demo scene assembly
//!
//! Three entities: the playing-field grid, a unit marker and a building
//! marker. The markers are small triangles until real models exist.

use grid_engine::ecs::components::{GridComponent, GridPosition2D, MeshComponent, MovementSpeed};
use grid_engine::ecs::systems::GridSystem;
use grid_engine::ecs::Registry;
use grid_engine::render::mesh::{Mesh, Vertex};

/// Build the skirmish demo scene
pub fn build_scene(grid_size: u16) -> Registry {
    let mut registry = Registry::new();

    // Grid
    let grid_entity = registry.create_entity();
    registry.add_component(
        grid_entity,
        MeshComponent::new(GridSystem::grid_mesh(grid_size)),
    );
    registry.add_component(
        grid_entity,
        GridComponent {
            width: u32::from(grid_size),
            height: u32::from(grid_size),
        },
    );

    // Unit (red triangle for the moment)
    let unit_entity = registry.create_entity();
    let unit_mesh = Mesh {
        vertices: vec![
            Vertex::new([-0.05, -0.05, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.05, -0.05, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.05, 0.05, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
        ],
        indices: vec![0, 1, 2],
    };
    registry.add_component(unit_entity, GridPosition2D { x: 5, y: 5 });
    registry.add_component(unit_entity, MovementSpeed { speed: 10.0 });
    registry.add_component(unit_entity, MeshComponent::new(unit_mesh));

    // Building (green triangle for the moment)
    let building_entity = registry.create_entity();
    let building_mesh = Mesh {
        vertices: vec![
            Vertex::new([-0.10, -0.10, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([-0.05, -0.10, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-0.05, -0.05, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
        ],
        indices: vec![0, 1, 2],
    };
    registry.add_component(building_entity, GridPosition2D { x: 4, y: 5 });
    registry.add_component(building_entity, MeshComponent::new(building_mesh));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_has_grid_unit_and_building() {
        let registry = build_scene(10);
        assert_eq!(registry.entity_count(), 3);
        assert_eq!(registry.components::<MeshComponent>().count(), 3);
        assert_eq!(registry.components::<GridComponent>().count(), 1);
        assert_eq!(registry.components::<GridPosition2D>().count(), 2);
    }

    #[test]
    fn grid_mesh_matches_the_configured_size() {
        let registry = build_scene(4);
        let (_, grid) = registry
            .components::<GridComponent>()
            .next()
            .expect("grid entity exists");
        assert_eq!((grid.width, grid.height), (4, 4));

        let (entity, _) = registry
            .components::<GridComponent>()
            .next()
            .expect("grid entity exists");
        let mesh = &registry
            .get_component::<MeshComponent>(entity)
            .expect("grid has a mesh")
            .mesh;
        assert_eq!(mesh.vertices.len(), 4 * 16);
    }

    #[test]
    fn unit_is_placed_and_mobile() {
        let registry = build_scene(10);
        let (unit, position) = registry
            .components::<GridPosition2D>()
            .next()
            .expect("unit exists");
        assert_eq!(*position, GridPosition2D { x: 5, y: 5 });

        let speed = registry
            .get_component::<MovementSpeed>(unit)
            .expect("unit has movement speed");
        assert_eq!(speed.speed, 10.0);
    }

    #[test]
    fn building_has_no_movement_speed() {
        let registry = build_scene(10);
        let positions: Vec<_> = registry.components::<GridPosition2D>().collect();
        assert_eq!(positions.len(), 2);

        let (building, _) = positions[1];
        assert!(registry.get_component::<MovementSpeed>(building).is_none());
    }
}
