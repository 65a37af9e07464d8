//! Sampled texture management
//!
//! Textures reach device-local memory the same way buffers do: a
//! host-visible staging buffer and a one-shot transfer, bracketed by two
//! image layout transitions (undefined → transfer-dst → shader-read). The
//! stage/access masks for a transition come from a fixed lookup; a pair the
//! lookup does not know is a programming fault, never a silent no-op.

use ash::{vk, Device, Instance};
use std::path::Path;

use crate::render::vulkan::buffer::{find_memory_type, StagingBuffer};
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::context::{PhysicalDeviceInfo, VulkanError, VulkanResult};

/// Stage and access masks for one recognized layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TransitionMasks {
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
}

/// The fixed (old, new) → masks lookup for upload transitions
fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            })
        }
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        (old, new) => Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    }
}

/// Sampled RGBA8 texture with image, view, sampler and backing memory
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
}

impl Texture {
    /// Format used for all sampled textures
    pub const FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

    /// Load an RGBA8 image file and upload it to device-local memory
    ///
    /// A missing or undecodable file is fatal at setup time.
    pub fn from_file<P: AsRef<Path>>(
        device: Device,
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        command_pool: &CommandPool,
        queue: vk::Queue,
        path: P,
    ) -> VulkanResult<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|e| {
                VulkanError::InitializationFailed(format!(
                    "Failed to load texture {:?}: {}",
                    path, e
                ))
            })?
            .into_rgba8();

        let extent = vk::Extent2D {
            width: decoded.width(),
            height: decoded.height(),
        };
        log::debug!("Loaded texture {:?} ({}x{})", path, extent.width, extent.height);

        Self::from_rgba8(
            device,
            instance,
            physical_device_info,
            command_pool,
            queue,
            extent,
            decoded.as_raw(),
        )
    }

    /// Upload raw RGBA8 pixels to a fresh device-local image
    pub fn from_rgba8(
        device: Device,
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        command_pool: &CommandPool,
        queue: vk::Queue,
        extent: vk::Extent2D,
        pixels: &[u8],
    ) -> VulkanResult<Self> {
        let physical_device = physical_device_info.device;

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(Self::FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device
                .create_image(&image_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            instance,
            physical_device,
            mem_requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            device
                .allocate_memory(&alloc_info, None)
                .map_err(VulkanError::Api)?
        };

        unsafe {
            device
                .bind_image_memory(image, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        // Staged upload: undefined -> transfer-dst, copy, -> shader-read.
        let staging = StagingBuffer::new(device.clone(), instance, physical_device, pixels)?;

        let mut recorder = command_pool.begin_single_time()?;
        Self::record_layout_transition(
            &mut recorder,
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();
        recorder.cmd_copy_buffer_to_image(
            staging.handle(),
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        Self::record_layout_transition(
            &mut recorder,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let command_buffer = recorder.end()?;
        command_pool.submit_and_wait(command_buffer, queue)?;
        drop(staging);

        let view_create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(Self::FORMAT)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let image_view = unsafe {
            device
                .create_image_view(&view_create_info, None)
                .map_err(VulkanError::Api)?
        };

        let anisotropy_enabled =
            physical_device_info.features.sampler_anisotropy == vk::TRUE;
        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy_enabled)
            .max_anisotropy(if anisotropy_enabled {
                physical_device_info.properties.limits.max_sampler_anisotropy
            } else {
                1.0
            })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        let sampler = unsafe {
            device
                .create_sampler(&sampler_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            image,
            memory,
            image_view,
            sampler,
        })
    }

    fn record_layout_transition(
        recorder: &mut CommandRecorder,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks = transition_masks(old_layout, new_layout)?;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        recorder.cmd_image_barrier(masks.src_stage, masks.dst_stage, barrier);
        Ok(())
    }

    /// Get the image view
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Get the sampler
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_transitions_have_fixed_masks() {
        let to_dst = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_dst.src_access, vk::AccessFlags::empty());
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_read = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_read.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transition_is_a_fatal_error() {
        let result = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        match result {
            Err(VulkanError::UnsupportedLayoutTransition { old, new }) => {
                assert_eq!(old, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                assert_eq!(new, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
            }
            other => panic!("expected UnsupportedLayoutTransition, got {:?}", other),
        }
    }
}
