//! Staging upload round-trip against real hardware
//!
//! Exercises the staged-upload protocol end to end: host bytes go into a
//! device-local buffer through a staging copy, then come back through a
//! second staging copy. Needs a Vulkan-capable host, so the test is ignored
//! by default; run with `cargo test -- --ignored` on a machine with a GPU.

use ash::{vk, Entry};
use grid_engine::render::vulkan::{CommandPool, DeviceLocalBuffer};
use std::ffi::CString;

#[test]
#[ignore = "requires a Vulkan-capable GPU"]
fn staged_upload_round_trips_byte_for_byte() {
    let entry = unsafe { Entry::load() }.expect("Vulkan runtime available");

    let app_name = CString::new("grid_engine upload test").unwrap();
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .api_version(vk::API_VERSION_1_0);
    let create_info = vk::InstanceCreateInfo::builder().application_info(&app_info);
    let instance =
        unsafe { entry.create_instance(&create_info, None) }.expect("instance creation");

    let physical_devices =
        unsafe { instance.enumerate_physical_devices() }.expect("device enumeration");
    let (physical_device, queue_family) = physical_devices
        .iter()
        .find_map(|&device| {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(device) };
            families
                .iter()
                .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|index| (device, index as u32))
        })
        .expect("a graphics-capable device");

    let priorities = [1.0];
    let queue_info = vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities)
        .build();
    let device_create_info =
        vk::DeviceCreateInfo::builder().queue_create_infos(std::slice::from_ref(&queue_info));
    let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
        .expect("logical device creation");
    let queue = unsafe { device.get_device_queue(queue_family, 0) };

    {
        let command_pool =
            CommandPool::new(device.clone(), queue_family).expect("command pool creation");

        // [0..255] repeated to fill 64 KiB.
        let data: Vec<u8> = (0u8..=255).cycle().take(64 * 1024).collect();

        // TRANSFER_SRC on top of the steady-state usage so the contents can
        // be copied back out for verification.
        let buffer = DeviceLocalBuffer::from_bytes(
            device.clone(),
            &instance,
            physical_device,
            &command_pool,
            queue,
            &data,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
        )
        .expect("staged upload");

        let read_back = buffer
            .read_back(&instance, physical_device, &command_pool, queue)
            .expect("staged read back");

        assert_eq!(read_back, data);
    }

    unsafe {
        device.destroy_device(None);
        instance.destroy_instance(None);
    }
}
