//! Logical device creation and queue access.
//!
//! [`Device`] wraps the `VkDevice` together with its graphics and present
//! queues and a cached copy of the physical device's memory properties (the
//! input to [`crate::memory::find_memory_type`]). Every GPU resource in this
//! crate holds an `Arc<Device>`, which keeps the device alive until the last
//! resource is gone.
//!
//! # Example
//!
//! ```no_run
//! use aurora_rhi::device::Device;
//! use aurora_rhi::instance::Instance;
//! use aurora_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(false, &[])?;
//! let surface = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let gpu = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! let device = Device::new(&instance, &gpu)?;
//!
//! let graphics = device.graphics_queue();
//! let present = device.present_queue();
//! # Ok::<(), aurora_rhi::RhiError>(())
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Device extensions the renderer cannot run without.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Logical device plus the queues and memory properties derived from it.
///
/// Shared across the crate as `Arc<Device>`; the handle types inside are all
/// plain Vulkan handles, so the wrapper is `Send + Sync`.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    /// Snapshot of the memory heaps/types, taken once at selection time.
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates the logical device and fetches one queue per required family.
    ///
    /// Requests the swapchain extension and the `samplerAnisotropy` feature.
    /// When the graphics and present families coincide, a single queue serves
    /// both roles.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSuitableGpu`] if `physical_device_info` is
    /// missing a graphics or present family, or the underlying Vulkan error
    /// if `vkCreateDevice` fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, RhiError> {
        let families = &physical_device_info.queue_families;
        let graphics_family = families.graphics_family.ok_or(RhiError::NoSuitableGpu)?;
        let present_family = families.present_family.ok_or(RhiError::NoSuitableGpu)?;

        // One queue per distinct family; priorities are irrelevant with a
        // single queue each.
        let priorities = [1.0f32];
        let queue_infos: Vec<_> = families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        debug!(
            graphics_family,
            present_family,
            queues = queue_infos.len(),
            "requesting device queues"
        );

        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let extensions: Vec<*const i8> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        info!(
            shared_queue = (graphics_family == present_family),
            "logical device ready"
        );

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            memory_properties: physical_device_info.memory_properties,
            graphics_queue,
            present_queue,
            queue_families: physical_device_info.queue_families,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Memory heap/type table used for manual allocation decisions.
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Blocks until every queue on the device has drained.
    ///
    /// Called before teardown and before swapchain recreation, where pending
    /// work may still reference resources about to be destroyed.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue, signalling `fence` on completion.
    ///
    /// # Safety
    ///
    /// Command buffers in `submit_infos` must be fully recorded and must not
    /// be re-recorded until the submission completes; `fence` must be
    /// unsignalled and not in use by another submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            // Outstanding submissions must finish before the handle dies.
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("device_wait_idle failed during teardown: {e:?}");
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: every field is either a raw Vulkan handle (Copy, externally
// synchronized per-call) or plain data; ash::Device itself is Send + Sync.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_extension_is_required() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<Device>>();
    }
}
