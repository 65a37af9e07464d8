//! Vulkan vertex input descriptions for the engine's `Vertex` type
//!
//! Kept separate from the mesh module so the core mesh types stay
//! backend-agnostic.

use ash::vk;

use crate::render::mesh::Vertex;

/// Vertex input binding and attribute descriptions
pub struct VertexLayout;

impl VertexLayout {
    /// Binding description: one interleaved vertex stream
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions: position, color, texture coordinates
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_offsets_match_vertex_layout() {
        let binding = VertexLayout::binding_description();
        assert_eq!(binding.stride as usize, std::mem::size_of::<Vertex>());

        let attributes = VertexLayout::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 24);
    }
}
