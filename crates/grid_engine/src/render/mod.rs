//! Rendering: mesh primitives, per-frame uniform data and the Vulkan backend

pub mod mesh;
pub mod uniforms;
pub mod vulkan;

pub use mesh::{Mesh, Vertex};
pub use uniforms::UniformBufferObject;
pub use vulkan::{Renderer, Window};
