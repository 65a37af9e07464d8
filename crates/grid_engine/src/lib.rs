//! Grid engine: a small Vulkan renderer for grid-based scenes
//!
//! The engine draws a handful of textured, indexed meshes assembled through a
//! toy entity registry. The interesting machinery lives in [`render::vulkan`]:
//! device negotiation, swapchain lifecycle, frames-in-flight synchronization
//! and staged uploads into device-local memory.

pub mod config;
pub mod ecs;
pub mod render;

use thiserror::Error;

/// Top-level engine error, aggregating the subsystem errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Vulkan backend failure
    #[error(transparent)]
    Vulkan(#[from] render::vulkan::VulkanError),

    /// Windowing layer failure
    #[error(transparent)]
    Window(#[from] render::vulkan::WindowError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// Result type for top-level engine operations
pub type EngineResult<T> = Result<T, EngineError>;
