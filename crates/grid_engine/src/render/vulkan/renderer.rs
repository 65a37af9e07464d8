//! The frame loop core: frame slots, synchronization and command recording
//!
//! The renderer owns `MAX_FRAMES_IN_FLIGHT` frame slots, each with its own
//! command buffer, persistently mapped uniform buffer, descriptor set and
//! synchronization objects. A slot index is not a swapchain image index: a
//! slot's resources are reused every `MAX_FRAMES_IN_FLIGHT` frames, while an
//! image is reused whenever the presentation engine cycles back to it.
//!
//! Per frame, in order: wait on the slot's fence, acquire an image, write the
//! slot's uniforms, re-record the slot's command buffer against the acquired
//! image's framebuffer, submit, present, advance the slot index. A stale
//! swapchain reported by acquire aborts the frame (no submit, no advance);
//! one reported by present triggers recreation after the frame was shown.

use ash::vk;
use std::path::Path;

use crate::render::mesh::Mesh;
use crate::render::uniforms::UniformBufferObject;
use crate::render::vulkan::buffer::{IndexBuffer, UniformBuffer, VertexBuffer};
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::context::{
    DeviceRequirements, VulkanContext, VulkanError, VulkanResult,
};
use crate::render::vulkan::descriptor::{DescriptorPool, DescriptorSetLayout};
use crate::render::vulkan::framebuffer::{DepthBuffer, Framebuffer};
use crate::render::vulkan::render_pass::RenderPass;
use crate::render::vulkan::shader::{GraphicsPipeline, ShaderModule};
use crate::render::vulkan::sync::FrameSync;
use crate::render::vulkan::texture::Texture;
use crate::render::vulkan::window::Window;

/// Number of frames the CPU may record ahead of the GPU
///
/// Two is the minimum that lets the CPU record frame k+1 while the GPU
/// executes frame k; it also bounds the host memory pinned by in-flight
/// uniform and command resources.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

const VERTEX_SHADER_PATH: &str = "resources/shaders/grid.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "resources/shaders/grid.frag.spv";

/// Advance a frame-slot index modulo the in-flight bound
fn next_frame_slot(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// A mesh uploaded to device-local memory
struct GpuMesh {
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
}

/// Per-slot resources, reused every `MAX_FRAMES_IN_FLIGHT` frames
struct FrameSlot {
    command_buffer: vk::CommandBuffer,
    uniform_buffer: UniformBuffer<UniformBufferObject>,
    descriptor_set: vk::DescriptorSet,
    sync: FrameSync,
}

/// The Vulkan renderer: owns all draw state and drives the frame loop
///
/// Field order encodes teardown order; the context is declared last so the
/// device outlives every resource created from it.
pub struct Renderer {
    render_pass: RenderPass,
    pipeline: GraphicsPipeline,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    descriptor_set_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    texture: Texture,
    meshes: Vec<GpuMesh>,
    depth_buffers: Vec<DepthBuffer>,
    framebuffers: Vec<Framebuffer>,
    frames: Vec<FrameSlot>,
    command_pool: CommandPool,
    clear_color: [f32; 4],
    current_frame: usize,
    context: VulkanContext,
}

impl Renderer {
    /// Create the renderer for a window
    ///
    /// Builds the full fixed object graph: context, render pass, pipeline
    /// (from the SPIR-V blobs under `resources/shaders/`), the texture, and
    /// one frame slot per in-flight frame. Any failure here is a fatal setup
    /// fault.
    pub fn new(
        window: &mut Window,
        app_name: &str,
        requirements: &DeviceRequirements,
        clear_color: [f32; 4],
        texture_path: &Path,
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, app_name, requirements)?;
        let device = context.raw_device();

        let render_pass = RenderPass::new(device.clone(), context.swapchain().format().format)?;

        let vertex_shader = ShaderModule::from_file(device.clone(), VERTEX_SHADER_PATH)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), FRAGMENT_SHADER_PATH)?;

        let descriptor_set_layout = DescriptorSetLayout::new(device.clone())?;

        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            &vertex_shader,
            &fragment_shader,
            descriptor_set_layout.handle(),
        )?;

        let command_pool = CommandPool::new(device.clone(), context.graphics_queue_family())?;

        let texture = Texture::from_file(
            device.clone(),
            context.instance(),
            &context.physical_device,
            &command_pool,
            context.graphics_queue(),
            texture_path,
        )?;

        let (depth_buffers, framebuffers) =
            Self::create_framebuffers(&context, &render_pass)?;

        // One slot per in-flight frame: command buffer, mapped uniform
        // buffer, descriptor set, sync objects.
        let command_buffers =
            command_pool.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;
        let descriptor_pool =
            DescriptorPool::new(device.clone(), MAX_FRAMES_IN_FLIGHT as u32)?;
        let layouts = vec![descriptor_set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate_sets(&layouts)?;

        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for (command_buffer, descriptor_set) in
            command_buffers.into_iter().zip(descriptor_sets)
        {
            let uniform_buffer = UniformBuffer::new(
                device.clone(),
                context.instance(),
                context.physical_device.device,
            )?;

            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(uniform_buffer.handle())
                .offset(0)
                .range(uniform_buffer.size())
                .build();
            let image_info = vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(texture.image_view())
                .sampler(texture.sampler())
                .build();

            let buffer_infos = [buffer_info];
            let image_infos = [image_info];
            let descriptor_writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(descriptor_set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos)
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(descriptor_set)
                    .dst_binding(1)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos)
                    .build(),
            ];
            unsafe {
                device.update_descriptor_sets(&descriptor_writes, &[]);
            }

            frames.push(FrameSlot {
                command_buffer,
                uniform_buffer,
                descriptor_set,
                sync: FrameSync::new(device.clone())?,
            });
        }

        log::info!("Renderer initialized ({} frames in flight)", MAX_FRAMES_IN_FLIGHT);

        Ok(Self {
            render_pass,
            pipeline,
            vertex_shader,
            fragment_shader,
            descriptor_set_layout,
            descriptor_pool,
            texture,
            meshes: Vec::new(),
            depth_buffers,
            framebuffers,
            frames,
            command_pool,
            clear_color,
            current_frame: 0,
            context,
        })
    }

    /// Upload a mesh into device-local memory (setup-time, blocking)
    pub fn upload_mesh(&mut self, mesh: &Mesh) -> VulkanResult<()> {
        let device = self.context.raw_device();

        let vertex_buffer = VertexBuffer::new(
            device.clone(),
            self.context.instance(),
            self.context.physical_device.device,
            &self.command_pool,
            self.context.graphics_queue(),
            &mesh.vertices,
        )?;
        let index_buffer = IndexBuffer::new(
            device,
            self.context.instance(),
            self.context.physical_device.device,
            &self.command_pool,
            self.context.graphics_queue(),
            &mesh.indices,
        )?;

        log::debug!(
            "Uploaded mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
        });
        Ok(())
    }

    /// Current swapchain extent as (width, height)
    pub fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.context.swapchain().extent();
        (extent.width, extent.height)
    }

    /// Render and present one frame
    pub fn draw_frame(
        &mut self,
        window: &mut Window,
        ubo: &UniformBufferObject,
    ) -> VulkanResult<()> {
        self.draw_frame_with_timeout(window, ubo, u64::MAX)
    }

    /// Render and present one frame, bounding the fence wait
    ///
    /// `fence_timeout_ns` bounds step 1 (waiting for the slot's previous GPU
    /// work); steady-state callers pass `u64::MAX`.
    pub fn draw_frame_with_timeout(
        &mut self,
        window: &mut Window,
        ubo: &UniformBufferObject,
        fence_timeout_ns: u64,
    ) -> VulkanResult<()> {
        let slot = &self.frames[self.current_frame];

        // 1. Wait until the GPU is done with this slot's previous use.
        slot.sync.in_flight.wait(fence_timeout_ns)?;

        // 2. Acquire the next presentable image. A stale chain aborts the
        // frame: recreate, no submission, no slot advance, retry next
        // iteration. The fence stays signaled so the retry does not block.
        let acquire_result = unsafe {
            self.context.swapchain_loader().acquire_next_image(
                self.context.swapchain().handle(),
                u64::MAX,
                slot.sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let (image_index, _) = match acquire_result {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on acquire; recreating");
                self.recreate_swapchain(window)?;
                return Ok(());
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        // 3. Update this slot's uniforms through the persistent mapping.
        slot.uniform_buffer.write(ubo);

        // 4. Re-record this slot's command buffer against the acquired
        // image's framebuffer.
        self.record_commands(self.current_frame, image_index)?;

        let slot = &self.frames[self.current_frame];
        let wait_semaphores = [slot.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [slot.command_buffer];
        let signal_semaphores = [slot.sync.render_finished.handle()];

        // 5. Submit. The fence is reset only now that a submission is
        // certain; resetting earlier could deadlock the next wait.
        slot.sync.in_flight.reset()?;
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe {
            self.context
                .device()
                .device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info.build()],
                    slot.sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        // 6. Present, then recreate if the chain went stale or the window
        // resized. After present: the frame was still shown.
        let swapchains = [self.context.swapchain().handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };
        let chain_stale = match present_result {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(VulkanError::Api(e)),
        };

        if chain_stale || window.take_framebuffer_resized() {
            log::debug!("Swapchain stale after present; recreating");
            self.recreate_swapchain(window)?;
        }

        // 7. Advance the frame-slot index.
        self.current_frame = next_frame_slot(self.current_frame);

        Ok(())
    }

    /// Record the fixed draw sequence for one frame slot and target image
    fn record_commands(&self, frame_index: usize, image_index: u32) -> VulkanResult<()> {
        let slot = &self.frames[frame_index];
        let device = self.context.raw_device();

        unsafe {
            device
                .reset_command_buffer(slot.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }

        let mut recorder = CommandRecorder::new(slot.command_buffer, device);
        recorder.begin(vk::CommandBufferUsageFlags::empty())?;

        let extent = self.context.swapchain().extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        {
            let mut pass = recorder.begin_render_pass(
                self.render_pass.handle(),
                self.framebuffers[image_index as usize].handle(),
                render_area,
                &clear_values,
            )?;

            pass.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());

            // Viewport and scissor are dynamic state so recreation never
            // touches the pipeline.
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            pass.set_viewport(&viewport);
            pass.set_scissor(&scissor);

            pass.cmd_bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[slot.descriptor_set],
            );

            for mesh in &self.meshes {
                pass.cmd_bind_vertex_buffers(0, &[mesh.vertex_buffer.handle()], &[0]);
                pass.cmd_bind_index_buffer(mesh.index_buffer.handle(), 0, vk::IndexType::UINT32);
                pass.cmd_draw_indexed(mesh.index_buffer.index_count(), 0);
            }
        }

        recorder.end()?;
        Ok(())
    }

    /// Tear down and rebuild the presentation chain
    ///
    /// Waits out minimized (zero-extent) windows first: no zero-extent chain
    /// is ever created. The render pass and pipeline are rebuilt only when
    /// the image format changed; extent changes alone reuse them.
    pub fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let (mut width, mut height) = window.get_framebuffer_size();
        while width == 0 || height == 0 {
            log::debug!("Window minimized; waiting for a nonzero framebuffer size");
            window.wait_events();
            let size = window.get_framebuffer_size();
            width = size.0;
            height = size.1;
        }

        // The idle wait makes recreation mutually exclusive with in-flight
        // frames; only then may the old framebuffers and views be destroyed.
        self.wait_idle()?;
        self.framebuffers.clear();
        self.depth_buffers.clear();

        self.context
            .recreate_swapchain(vk::Extent2D { width, height })?;

        let new_format = self.context.swapchain().format().format;
        if new_format != self.render_pass.color_format() {
            log::info!(
                "Swapchain format changed to {:?}; rebuilding render pass and pipeline",
                new_format
            );
            let device = self.context.raw_device();
            self.render_pass = RenderPass::new(device.clone(), new_format)?;
            self.pipeline = GraphicsPipeline::new(
                device,
                self.render_pass.handle(),
                &self.vertex_shader,
                &self.fragment_shader,
                self.descriptor_set_layout.handle(),
            )?;
        }

        let (depth_buffers, framebuffers) =
            Self::create_framebuffers(&self.context, &self.render_pass)?;
        self.depth_buffers = depth_buffers;
        self.framebuffers = framebuffers;

        log::debug!(
            "Swapchain recreated at {}x{} ({} images)",
            width,
            height,
            self.context.swapchain().image_count()
        );
        Ok(())
    }

    /// Build one depth buffer and framebuffer per swapchain image
    fn create_framebuffers(
        context: &VulkanContext,
        render_pass: &RenderPass,
    ) -> VulkanResult<(Vec<DepthBuffer>, Vec<Framebuffer>)> {
        let extent = context.swapchain().extent();
        let mut depth_buffers = Vec::new();
        let mut framebuffers = Vec::new();

        for &image_view in context.swapchain().image_views() {
            let depth_buffer = DepthBuffer::new(
                context.raw_device(),
                context.instance(),
                context.physical_device.device,
                extent,
            )?;
            let framebuffer = Framebuffer::new(
                context.raw_device(),
                render_pass.handle(),
                &[image_view, depth_buffer.image_view()],
                extent,
            )?;
            depth_buffers.push(depth_buffer);
            framebuffers.push(framebuffer);
        }

        Ok((depth_buffers, framebuffers))
    }

    /// Block until the device is idle
    ///
    /// The only way to drain pending frames; used before shutdown.
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.context
                .device()
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Drain in-flight frames; afterwards the fields tear down in
        // declaration order, the context (and with it the device) last.
        let _ = self.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_slots_cycle_through_all_indices() {
        let mut slot = 0;
        let mut visited = Vec::new();
        for _ in 0..(MAX_FRAMES_IN_FLIGHT * 3) {
            visited.push(slot);
            slot = next_frame_slot(slot);
        }

        // Over N cycles the slot sequence is 0,1,0,1,... and never leaves
        // the in-flight range.
        for (i, &s) in visited.iter().enumerate() {
            assert_eq!(s, i % MAX_FRAMES_IN_FLIGHT);
            assert!(s < MAX_FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn distinct_slots_used_over_n_frames() {
        // N presented frames touch exactly min(N, MAX_FRAMES_IN_FLIGHT)
        // distinct slots.
        for n in 1..=6 {
            let mut seen = std::collections::HashSet::new();
            let mut slot = 0;
            for _ in 0..n {
                seen.insert(slot);
                slot = next_frame_slot(slot);
            }
            assert_eq!(seen.len(), n.min(MAX_FRAMES_IN_FLIGHT));
        }
    }
}
