//! Vulkan context management
//!
//! Instance creation, adapter (physical device) negotiation, logical device
//! and queue setup. Selection is first-match over the platform's enumeration
//! order: the first adapter satisfying every requirement wins, ties resolved
//! by order.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
#[cfg(debug_assertions)]
use ash::extensions::ext::DebugUtils;
use ash::{vk, Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::render::vulkan::swapchain::Swapchain;
use crate::render::vulkan::window::Window;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context or resource initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested property filter
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// An image layout transition pair the uploader does not know about
    #[error("Unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is transitioning from
        old: vk::ImageLayout,
        /// Layout the image is transitioning to
        new: vk::ImageLayout,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Adapter capabilities the application insists on
///
/// The discrete-GPU and geometry-shader checks are configuration rather than
/// hardcoded constraints so that integrated GPUs stay usable.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRequirements {
    /// Only accept discrete GPUs
    pub require_discrete_gpu: bool,
    /// Require geometry shader support
    pub require_geometry_shader: bool,
    /// Require anisotropic sampling (the texture sampler uses it)
    pub require_anisotropy: bool,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            require_discrete_gpu: false,
            require_geometry_shader: false,
            require_anisotropy: true,
        }
    }
}

/// Queue family indices probed for one adapter
///
/// The graphics-capable family and the family able to present to the surface
/// may differ; an adapter is only usable when both were found.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    /// First family exposing `QueueFlags::GRAPHICS`
    pub graphics_family: Option<u32>,
    /// First family reporting presentation support for the surface
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both required families were found
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    fn find(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut indices = Self::default();
        for (index, family) in queue_families.iter().enumerate() {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && indices.graphics_family.is_none()
            {
                indices.graphics_family = Some(index);
            }

            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .map_err(VulkanError::Api)?
            };
            if present_support && indices.present_family.is_none() {
                indices.present_family = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }
}

/// Everything probed about one adapter that the suitability check needs
#[derive(Debug, Clone)]
struct AdapterCapabilities {
    device_type: vk::PhysicalDeviceType,
    features: vk::PhysicalDeviceFeatures,
    indices: QueueFamilyIndices,
    extensions_supported: bool,
    surface_format_count: usize,
    present_mode_count: usize,
}

impl AdapterCapabilities {
    /// Placeholder for an adapter whose probe failed; never suitable
    fn unusable() -> Self {
        Self {
            device_type: vk::PhysicalDeviceType::OTHER,
            features: vk::PhysicalDeviceFeatures::default(),
            indices: QueueFamilyIndices::default(),
            extensions_supported: false,
            surface_format_count: 0,
            present_mode_count: 0,
        }
    }
}

/// The suitability predicate: an adapter qualifies iff its queue families are
/// complete, it meets the configured type/feature requirements, it lists all
/// required extensions, and the surface yields at least one format and one
/// present mode.
fn is_adapter_suitable(requirements: &DeviceRequirements, caps: &AdapterCapabilities) -> bool {
    if !caps.indices.is_complete() {
        return false;
    }
    if requirements.require_discrete_gpu
        && caps.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
    {
        return false;
    }
    if requirements.require_geometry_shader && caps.features.geometry_shader != vk::TRUE {
        return false;
    }
    if requirements.require_anisotropy && caps.features.sampler_anisotropy != vk::TRUE {
        return false;
    }
    caps.extensions_supported && caps.surface_format_count > 0 && caps.present_mode_count > 0
}

fn first_suitable(
    requirements: &DeviceRequirements,
    candidates: &[AdapterCapabilities],
) -> Option<usize> {
    candidates
        .iter()
        .position(|caps| is_adapter_suitable(requirements, caps))
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    /// Debug utilities extension (debug builds)
    #[cfg(debug_assertions)]
    pub debug_utils: Option<DebugUtils>,
    /// Debug messenger handle (debug builds)
    #[cfg(debug_assertions)]
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, with validation layers in debug builds
    pub fn new(window: &Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e))
        })?;

        let app_name_cstr = CString::new(app_name).unwrap();
        let engine_name_cstr = CString::new("GridEngine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.get_required_instance_extensions().map_err(|e| {
            VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e))
        })?;

        let cstr_extensions: Vec<CString> = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        #[allow(unused_mut)] // Mutable in debug builds for adding debug extensions
        let mut extensions: Vec<*const i8> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        #[cfg(debug_assertions)]
        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let layer_names = if cfg!(debug_assertions) && enable_validation {
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        } else {
            vec![]
        };
        let layer_names_ptrs: Vec<*const i8> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        #[cfg(debug_assertions)]
        let (debug_utils, debug_messenger) = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let debug_messenger = Self::setup_debug_messenger(&debug_utils)?;
            (Some(debug_utils), Some(debug_messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            #[cfg(debug_assertions)]
            debug_utils,
            #[cfg(debug_assertions)]
            debug_messenger,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(
        debug_utils: &DebugUtils,
    ) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let (Some(debug_utils), Some(debug_messenger)) =
                (&self.debug_utils, &self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(*debug_messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback routing validation messages into the logger
#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Selected adapter and its cached capabilities
///
/// Immutable after selection; owned by the context for its entire lifetime.
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the first adapter satisfying `requirements`, or fail
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        if devices.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "No GPUs with Vulkan support found".to_string(),
            ));
        }

        // A candidate that fails its probe is skipped, not fatal; selection
        // only fails when no candidate qualifies.
        let candidates: Vec<AdapterCapabilities> = devices
            .iter()
            .map(
                |&device| match Self::probe(instance, device, surface, surface_loader) {
                    Ok(caps) => caps,
                    Err(e) => {
                        log::warn!("Skipping adapter that failed its capability probe: {}", e);
                        AdapterCapabilities::unusable()
                    }
                },
            )
            .collect();

        let chosen = first_suitable(requirements, &candidates).ok_or_else(|| {
            VulkanError::InitializationFailed("No suitable GPU found".to_string())
        })?;
        let device = devices[chosen];
        let caps = &candidates[chosen];

        let (graphics_family, present_family) =
            match (caps.indices.graphics_family, caps.indices.present_family) {
                (Some(graphics), Some(present)) => (graphics, present),
                _ => {
                    return Err(VulkanError::InitializationFailed(
                        "Selected adapter lost its queue families".to_string(),
                    ))
                }
            };

        let properties = unsafe { instance.get_physical_device_properties(device) };
        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
        });

        Ok(Self {
            device,
            properties,
            features: caps.features,
            graphics_family,
            present_family,
        })
    }

    /// Probe one adapter's capabilities against the surface
    fn probe(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<AdapterCapabilities> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let indices = QueueFamilyIndices::find(instance, device, surface, surface_loader)?;

        let available_extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let required_extensions = [SwapchainLoader::name()];
        let extensions_supported = required_extensions.iter().all(|required| {
            available_extensions.iter().any(|available| {
                let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
                name == *required
            })
        });

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };

        Ok(AdapterCapabilities {
            device_type: properties.device_type,
            features,
            indices,
            extensions_supported,
            surface_format_count: formats.len(),
            present_mode_count: present_modes.len(),
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue (may alias the graphics queue)
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a new logical device with graphics and present queues
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let unique_families: std::collections::HashSet<u32> = [
            physical_device_info.graphics_family,
            physical_device_info.present_family,
        ]
        .iter()
        .cloned()
        .collect();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&[1.0])
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(requirements.require_anisotropy)
            .geometry_shader(requirements.require_geometry_shader)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::Api)?
        };

        let graphics_queue =
            unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue =
            unsafe { device.get_device_queue(physical_device_info.present_family, 0) };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device_info.graphics_family,
            present_family: physical_device_info.present_family,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // All queues must be drained before the device goes away.
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context owning the core execution resources
///
/// Field order matters: fields drop in declaration order's reverse, so the
/// instance outlives the device, which outlives the swapchain.
pub struct VulkanContext {
    /// Vulkan surface for rendering
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader
    pub surface_loader: Surface,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Swapchain for presenting frames
    pub swapchain: Option<Swapchain>,
    /// Logical device for operations
    pub device: LogicalDevice,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a new Vulkan context for the window
    pub fn new(
        window: &mut Window,
        app_name: &str,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, app_name, cfg!(debug_assertions))?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {}", e)))?;

        let physical_device =
            PhysicalDeviceInfo::select(&instance.instance, surface, &surface_loader, requirements)?;

        let device = LogicalDevice::new(&instance.instance, &physical_device, requirements)?;

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            &instance.instance,
            device.device.clone(),
            surface,
            &surface_loader,
            &physical_device,
            vk::Extent2D { width, height },
        )?;

        Ok(Self {
            instance,
            surface,
            surface_loader,
            physical_device,
            device,
            swapchain: Some(swapchain),
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get a clone of the raw device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the swapchain
    pub fn swapchain(&self) -> &Swapchain {
        self.swapchain
            .as_ref()
            .expect("swapchain present outside recreation")
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Get the graphics queue family index
    pub fn graphics_queue_family(&self) -> u32 {
        self.physical_device.graphics_family
    }

    /// Rebuild the swapchain against current surface capabilities
    ///
    /// Must only be called between frames; waits for the device to go idle
    /// before touching presentation resources.
    pub fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::Api)?;
        }

        let old_swapchain = self
            .swapchain
            .as_ref()
            .map(|s| s.handle())
            .unwrap_or(vk::SwapchainKHR::null());

        let new_swapchain = Swapchain::recreate(
            &self.instance.instance,
            self.device.device.clone(),
            self.surface,
            &self.surface_loader,
            &self.physical_device,
            extent,
            old_swapchain,
        )?;

        // The old chain drops here, after the new one was linked to it.
        self.swapchain = Some(new_swapchain);

        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();

            // The swapchain must go before the surface it presents to.
            drop(self.swapchain.take());

            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in reverse declaration order: device before
        // instance.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable_adapter() -> AdapterCapabilities {
        AdapterCapabilities {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            features: vk::PhysicalDeviceFeatures {
                geometry_shader: vk::TRUE,
                sampler_anisotropy: vk::TRUE,
                ..Default::default()
            },
            indices: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
            extensions_supported: true,
            surface_format_count: 3,
            present_mode_count: 2,
        }
    }

    #[test]
    fn queue_family_indices_complete_only_with_both() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        indices.graphics_family = Some(0);
        assert!(!indices.is_complete());
        indices.present_family = Some(2);
        assert!(indices.is_complete());
    }

    #[test]
    fn selects_first_suitable_adapter_in_order() {
        let requirements = DeviceRequirements {
            require_discrete_gpu: true,
            ..Default::default()
        };

        let mut integrated = capable_adapter();
        integrated.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;

        // Two qualifying discrete adapters after one integrated: the first
        // qualifying one wins, by enumeration order.
        let candidates = vec![integrated, capable_adapter(), capable_adapter()];
        assert_eq!(first_suitable(&requirements, &candidates), Some(1));
    }

    #[test]
    fn no_qualifying_adapter_yields_none() {
        let requirements = DeviceRequirements::default();

        let mut no_present = capable_adapter();
        no_present.indices.present_family = None;

        let mut no_extensions = capable_adapter();
        no_extensions.extensions_supported = false;

        let mut no_formats = capable_adapter();
        no_formats.surface_format_count = 0;

        let candidates = vec![no_present, no_extensions, no_formats];
        assert_eq!(first_suitable(&requirements, &candidates), None);
    }

    #[test]
    fn integrated_gpu_accepted_when_not_required_discrete() {
        let requirements = DeviceRequirements::default();
        let mut caps = capable_adapter();
        caps.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        assert!(is_adapter_suitable(&requirements, &caps));
    }

    #[test]
    fn feature_requirements_are_enforced() {
        let requirements = DeviceRequirements {
            require_geometry_shader: true,
            require_anisotropy: true,
            require_discrete_gpu: false,
        };

        let mut caps = capable_adapter();
        caps.features.geometry_shader = vk::FALSE;
        assert!(!is_adapter_suitable(&requirements, &caps));

        caps.features.geometry_shader = vk::TRUE;
        caps.features.sampler_anisotropy = vk::FALSE;
        assert!(!is_adapter_suitable(&requirements, &caps));
    }

    #[test]
    fn empty_present_modes_disqualify() {
        let requirements = DeviceRequirements::default();
        let mut caps = capable_adapter();
        caps.present_mode_count = 0;
        assert!(!is_adapter_suitable(&requirements, &caps));
    }
}
