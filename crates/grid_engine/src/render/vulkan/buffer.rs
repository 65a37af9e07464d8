//! Buffer management and the staged-upload protocol
//!
//! Steady-state vertex/index buffers live in device-local memory and are
//! never mapped; data reaches them through a host-visible staging buffer and
//! a one-shot transfer submission that is waited on before the staging buffer
//! is destroyed. Per-frame uniform buffers are host-visible, host-coherent
//! and persistently mapped.

use ash::{vk, Device, Instance};
use bytemuck::Pod;
use std::marker::PhantomData;

use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Find a memory type satisfying both the resource's type filter and the
/// requested property flags. No match is a fatal configuration fault.
pub(crate) fn find_memory_type(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let mem_properties =
        unsafe { instance.get_physical_device_memory_properties(physical_device) };

    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// Buffer plus its backing memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer with a fresh memory allocation bound to it
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = find_memory_type(
            instance,
            physical_device,
            mem_requirements.memory_type_bits,
            properties,
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
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(VulkanError::Api)?;
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Map the backing memory for host access
    ///
    /// Only valid for host-visible allocations.
    pub fn map_memory(&self) -> VulkanResult<*mut std::ffi::c_void> {
        unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)
        }
    }

    /// Unmap the backing memory
    pub fn unmap_memory(&self) {
        unsafe {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Map, copy `data` in, unmap
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        let data_ptr = self.map_memory()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), data_ptr as *mut u8, data.len());
        }
        self.unmap_memory();
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get allocation size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host-visible scratch buffer used only as a transfer source
pub struct StagingBuffer {
    buffer: Buffer,
}

impl StagingBuffer {
    /// Create a staging buffer pre-filled with `data`
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        data: &[u8],
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(data)?;
        Ok(Self { buffer })
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Get size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

/// Device-local buffer filled through the staging pattern
///
/// The target is allocated with `usage | TRANSFER_DST`, the copy is recorded
/// into a one-shot command buffer, and the submission is waited on before the
/// staging buffer is destroyed. Uploads are a setup-time cost, not a
/// steady-state one.
pub struct DeviceLocalBuffer {
    buffer: Buffer,
}

impl DeviceLocalBuffer {
    /// Upload `data` into fresh device-local memory
    pub fn from_bytes(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: &CommandPool,
        queue: vk::Queue,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let staging = StagingBuffer::new(device.clone(), instance, physical_device, data)?;

        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let mut recorder = command_pool.begin_single_time()?;
        let copy_region = vk::BufferCopy::builder()
            .src_offset(0)
            .dst_offset(0)
            .size(data.len() as vk::DeviceSize)
            .build();
        recorder.cmd_copy_buffer(staging.handle(), buffer.handle(), &[copy_region]);
        let command_buffer = recorder.end()?;

        command_pool.submit_and_wait(command_buffer, queue)?;

        // Staging buffer drops here, after the transfer completed.
        Ok(Self { buffer })
    }

    /// Copy the buffer's contents back to host memory via a second staging
    /// buffer
    ///
    /// Requires the buffer to have been created with `TRANSFER_SRC` in its
    /// usage flags. Used to verify upload round-trips on real hardware.
    pub fn read_back(
        &self,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: &CommandPool,
        queue: vk::Queue,
    ) -> VulkanResult<Vec<u8>> {
        let size = self.buffer.size();
        let readback = Buffer::new(
            self.buffer.device.clone(),
            instance,
            physical_device,
            size,
            vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mut recorder = command_pool.begin_single_time()?;
        let copy_region = vk::BufferCopy::builder()
            .src_offset(0)
            .dst_offset(0)
            .size(size)
            .build();
        recorder.cmd_copy_buffer(self.buffer.handle(), readback.handle(), &[copy_region]);
        let command_buffer = recorder.end()?;
        command_pool.submit_and_wait(command_buffer, queue)?;

        let mut data = vec![0u8; size as usize];
        let ptr = readback.map_memory()?;
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, data.as_mut_ptr(), size as usize);
        }
        readback.unmap_memory();
        Ok(data)
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Get size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

/// Device-local vertex buffer
pub struct VertexBuffer {
    buffer: DeviceLocalBuffer,
}

impl VertexBuffer {
    /// Upload vertex data into device-local memory
    pub fn new<T: Pod>(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: &CommandPool,
        queue: vk::Queue,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let buffer = DeviceLocalBuffer::from_bytes(
            device,
            instance,
            physical_device,
            command_pool,
            queue,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        Ok(Self { buffer })
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Device-local index buffer
pub struct IndexBuffer {
    buffer: DeviceLocalBuffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload index data into device-local memory
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        command_pool: &CommandPool,
        queue: vk::Queue,
        indices: &[u32],
    ) -> VulkanResult<Self> {
        let buffer = DeviceLocalBuffer::from_bytes(
            device,
            instance,
            physical_device,
            command_pool,
            queue,
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices in the buffer
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Persistently mapped uniform buffer for one frame slot
///
/// The memory is host-coherent, so per-frame writes through the mapped
/// pointer are visible to the GPU without an explicit map/unmap or flush.
pub struct UniformBuffer<T: Pod> {
    buffer: Buffer,
    mapped: *mut T,
    _phantom: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Create the buffer and map it for the lifetime of the slot
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            instance,
            physical_device,
            std::mem::size_of::<T>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = buffer.map_memory()? as *mut T;

        Ok(Self {
            buffer,
            mapped,
            _phantom: PhantomData,
        })
    }

    /// Write new uniform data in place
    ///
    /// Only safe against GPU reads because each frame slot's buffer is read
    /// exclusively by that slot's commands, gated by the slot's fence.
    pub fn write(&self, data: &T) {
        unsafe {
            std::ptr::copy_nonoverlapping(data, self.mapped, 1);
        }
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the uniform block in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl<T: Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        // Unmap before the inner buffer frees its memory.
        self.buffer.unmap_memory();
    }
}
