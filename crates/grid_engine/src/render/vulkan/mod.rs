//! Vulkan rendering backend
//!
//! Low-level Vulkan implementation built on RAII wrappers: every created
//! handle is owned by exactly one struct whose `Drop` destroys it, and struct
//! field order encodes the required teardown order.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex_layout;
pub mod window;

pub use buffer::{Buffer, DeviceLocalBuffer, IndexBuffer, StagingBuffer, UniformBuffer, VertexBuffer};
pub use commands::{CommandPool, CommandRecorder};
pub use context::{
    DeviceRequirements, LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext,
    VulkanError, VulkanInstance, VulkanResult,
};
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use framebuffer::{DepthBuffer, Framebuffer};
pub use render_pass::RenderPass;
pub use renderer::{Renderer, MAX_FRAMES_IN_FLIGHT};
pub use shader::{GraphicsPipeline, ShaderModule};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::Texture;
pub use vertex_layout::VertexLayout;
pub use window::{Window, WindowError, WindowResult};
