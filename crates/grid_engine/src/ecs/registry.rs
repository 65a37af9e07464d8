//! Entity registry with typed component storage
//!
//! Components are stored per concrete type in a downcastable `Vec`, so
//! cleanup is ordinary ownership rather than type-erased destructors.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::Entity;

/// Marker trait for component types
pub trait Component: 'static {}

/// Typed storage for one component type
struct Storage<T: Component> {
    items: Vec<(Entity, T)>,
}

impl<T: Component> Storage<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }
}

/// Registry of entities and their components
#[derive(Default)]
pub struct Registry {
    next_entity_id: u32,
    entities: Vec<Entity>,
    storages: HashMap<TypeId, Box<dyn Any>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity::new(self.next_entity_id);
        self.next_entity_id += 1;
        self.entities.push(entity);
        entity
    }

    /// Attach a component to an entity
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::new()));
        let storage = storage
            .downcast_mut::<Storage<T>>()
            .expect("storage type matches its TypeId key");
        storage.items.push((entity, component));
    }

    /// Get an entity's component of type `T`, if attached
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?
            .items
            .iter()
            .find(|(owner, _)| *owner == entity)
            .map(|(_, component)| component)
    }

    /// Get an entity's component of type `T` mutably, if attached
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?
            .items
            .iter_mut()
            .find(|(owner, _)| *owner == entity)
            .map(|(_, component)| component)
    }

    /// Iterate all components of type `T` with their owning entities
    ///
    /// Iteration order is insertion order.
    pub fn components<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>()
            .into_iter()
            .flat_map(|storage| storage.items.iter())
            .map(|(entity, component)| (*entity, component))
    }

    /// Iterate all entities
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.downcast_ref::<Storage<T>>())
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.downcast_mut::<Storage<T>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    struct Health(u32);
    impl Component for Health {}

    #[test]
    fn entities_get_sequential_ids() {
        let mut registry = Registry::new();
        let a = registry.create_entity();
        let b = registry.create_entity();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(registry.entity_count(), 2);
    }

    #[test]
    fn add_and_get_component_round_trip() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.add_component(entity, Position { x: 1.0, y: 2.0 });

        let position = registry.get_component::<Position>(entity).unwrap();
        assert_eq!(position.x, 1.0);
        assert_eq!(position.y, 2.0);
    }

    #[test]
    fn component_types_are_isolated() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.add_component(entity, Position { x: 0.0, y: 0.0 });

        assert!(registry.get_component::<Position>(entity).is_some());
        assert!(registry.get_component::<Health>(entity).is_none());
    }

    #[test]
    fn missing_entity_yields_none() {
        let mut registry = Registry::new();
        let with = registry.create_entity();
        let without = registry.create_entity();
        registry.add_component(with, Health(100));

        assert!(registry.get_component::<Health>(without).is_none());
    }

    #[test]
    fn mutation_through_get_component_mut() {
        let mut registry = Registry::new();
        let entity = registry.create_entity();
        registry.add_component(entity, Health(100));

        registry.get_component_mut::<Health>(entity).unwrap().0 = 50;
        assert_eq!(registry.get_component::<Health>(entity).unwrap().0, 50);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut registry = Registry::new();
        let a = registry.create_entity();
        let b = registry.create_entity();
        registry.add_component(b, Health(2));
        registry.add_component(a, Health(1));

        let collected: Vec<_> = registry
            .components::<Health>()
            .map(|(entity, health)| (entity.id(), health.0))
            .collect();
        assert_eq!(collected, vec![(1, 2), (0, 1)]);
    }

    #[test]
    fn iterating_an_absent_type_is_empty() {
        let registry = Registry::new();
        assert_eq!(registry.components::<Position>().count(), 0);
    }
}
