//! GPU enumeration and selection.
//!
//! Every Vulkan-capable device is checked against the renderer's
//! requirements (graphics and present queues, sampler anisotropy,
//! Vulkan 1.1) and the survivors are scored. Discrete GPUs dominate the
//! score; resolution limits and VRAM break ties.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue families the renderer submits to.
///
/// Graphics and present are usually the same family; they are tracked
/// separately because Vulkan allows them to differ.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Family accepting graphics command buffers.
    pub graphics_family: Option<u32>,
    /// Family able to present to the target surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// True once both required families are found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// The distinct family indices, for queue creation.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = [self.graphics_family, self.present_family]
            .into_iter()
            .flatten()
            .collect();
        families.dedup();
        families
    }
}

/// A selected GPU and everything device creation needs from it.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// The physical device handle.
    pub device: vk::PhysicalDevice,
    /// Properties, including limits such as max sampler anisotropy.
    pub properties: vk::PhysicalDeviceProperties,
    /// Feature support reported by the driver.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types, cached for allocation decisions.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue families resolved against the target surface.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// The device name reported by the driver.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("unknown device")
        }
    }

    /// Total bytes across device-local memory heaps.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.properties.device_type)
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Picks the best GPU that meets the renderer's requirements.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] when no device offers graphics
/// and present queues, sampler anisotropy, and Vulkan 1.1.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    debug!("Enumerated {} physical device(s)", devices.len());

    let best = devices
        .into_iter()
        .filter_map(|device| examine_device(instance, device, surface, surface_loader))
        .max_by_key(|info| score_device(info));

    match best {
        Some(info) => {
            info!(
                "Selected GPU '{}' ({:?}, {} MiB device-local)",
                info.device_name(),
                info.properties.device_type,
                info.device_local_memory() / (1024 * 1024)
            );
            Ok(info)
        }
        None => {
            warn!("No GPU satisfies the renderer's requirements");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

/// Checks one device against the requirements.
///
/// Returns `None` with a debug log naming the failed requirement, so a
/// rejected machine can be diagnosed from the log alone.
fn examine_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("unknown")
            .to_owned()
    };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!("'{}' rejected: no graphics+present queue families", name);
        return None;
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!("'{}' rejected: sampler anisotropy unsupported", name);
        return None;
    }

    let version = properties.api_version;
    if (vk::api_version_major(version), vk::api_version_minor(version)) < (1, 1) {
        debug!(
            "'{}' rejected: Vulkan {}.{} < 1.1",
            name,
            vk::api_version_major(version),
            vk::api_version_minor(version)
        );
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(index);
        }

        if indices.present_family.is_none() {
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            };
            if supported {
                indices.present_family = Some(index);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// Scores a device; higher is better.
///
/// Device type dominates so a discrete GPU always beats an integrated
/// one. Within a type, texture resolution limits and VRAM decide.
fn score_device(info: &PhysicalDeviceInfo) -> u32 {
    let type_score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    let vram_mib = (info.device_local_memory() / (1024 * 1024)) as u32;

    type_score + info.properties.limits.max_image_dimension2_d + vram_mib.min(16_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(
        device_type: vk::PhysicalDeviceType,
        max_dimension: u32,
    ) -> PhysicalDeviceInfo {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;
        properties.limits.max_image_dimension2_d = max_dimension;

        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties,
            features: Default::default(),
            memory_properties: Default::default(),
            queue_families: QueueFamilyIndices::default(),
        }
    }

    #[test]
    fn test_indices_incomplete_until_both_found() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics_family = Some(0);
        assert!(!indices.is_complete());

        indices.present_family = Some(0);
        assert!(indices.is_complete());
    }

    #[test]
    fn test_shared_family_reported_once() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(1),
            present_family: Some(1),
        };
        assert_eq!(indices.unique_families(), vec![1]);
    }

    #[test]
    fn test_split_families_reported_separately() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_discrete_gpu_outscores_integrated() {
        let discrete = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = info_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);

        // Type dominates even when the integrated part has bigger limits
        assert!(score_device(&discrete) > score_device(&integrated));
    }

    #[test]
    fn test_resolution_limit_breaks_type_ties() {
        let small = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let large = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);

        assert!(score_device(&large) > score_device(&small));
    }
}
