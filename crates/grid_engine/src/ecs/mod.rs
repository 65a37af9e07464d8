//! Toy entity/component registry
//!
//! Entities are plain ids; components live in typed per-component storages
//! keyed by `TypeId`. No concurrency, no persistence — scene assembly only.

pub mod components;
pub mod entity;
pub mod registry;
pub mod systems;

pub use entity::Entity;
pub use registry::{Component, Registry};
