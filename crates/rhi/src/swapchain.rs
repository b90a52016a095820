//! Swapchain creation, recreation, and presentation.
//!
//! The swapchain is rebuilt whenever the surface changes size or the
//! driver reports it out of date; [`Swapchain::recreate`] chains the new
//! swapchain to the retired one so the driver can reuse its images.
//!
//! Selection policy is fixed rather than configurable:
//!
//! - format: `B8G8R8A8_SRGB` + `SRGB_NONLINEAR`, else the first format
//!   the surface offers
//! - present mode: FIFO, the only mode Vulkan guarantees, which also
//!   paces the render loop to the display
//! - image count: double buffered, clamped to the surface limits

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// Images requested before clamping to what the surface allows.
const PREFERRED_IMAGE_COUNT: u32 = 2;

/// What a surface supports, queried per physical device.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Min/max image counts and extents, current transform.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Format and color space pairs the surface accepts.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Present modes the surface accepts.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Queries surface support for a physical device.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the three surface queries fails.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let support = unsafe {
            Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            }
        };

        debug!(
            "Surface support: {} format(s), {} present mode(s), {}..{} images",
            support.formats.len(),
            support.present_modes.len(),
            support.capabilities.min_image_count,
            support.capabilities.max_image_count,
        );

        Ok(support)
    }

    /// True when the surface offers at least one format and one present
    /// mode, the minimum a swapchain needs.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The swapchain and the image views rendering attaches to.
///
/// Images belong to the swapchain and are never destroyed directly; the
/// views are owned here and destroyed on drop or recreation.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a swapchain for `surface` at roughly `width` x `height`.
    ///
    /// The actual extent may differ: when the surface reports a fixed
    /// current extent that wins, otherwise the request is clamped to the
    /// surface limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface reports no formats or present
    /// modes, or if swapchain or image view creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self, RhiError> {
        Self::build(instance, device, surface, width, height, vk::SwapchainKHR::null())
    }

    /// Replaces the swapchain after a resize or an out-of-date report.
    ///
    /// Waits for the device to go idle, then builds the replacement with
    /// the retired swapchain as `old_swapchain` so the driver can carry
    /// its images over. The retired handle is destroyed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait or the rebuild fails. On rebuild
    /// failure the old image views are already gone and the swapchain
    /// must not be used again.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<(), RhiError> {
        self.device.wait_idle()?;
        self.destroy_image_views();

        let mut replacement = Self::build(
            instance,
            Arc::clone(&self.device),
            surface,
            width,
            height,
            self.swapchain,
        )?;
        std::mem::swap(self, &mut replacement);

        // `replacement` now holds the retired swapchain; dropping it
        // destroys the handle the new swapchain was chained from.
        Ok(())
    }

    fn build(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader =
            ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support = SurfaceSupport::query(device.physical_device(), surface, &surface_loader)?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Surface reports no formats or no present modes".to_string(),
            ));
        }

        let surface_format = select_format(&support.formats);
        let format = surface_format.format;
        let color_space = surface_format.color_space;
        let extent = select_extent(&support.capabilities, width, height);
        let image_count = select_image_count(&support.capabilities);

        let families = device.queue_families();
        let graphics = families.graphics_family.ok_or(RhiError::NoSuitableGpu)?;
        let present = families.present_family.ok_or(RhiError::NoSuitableGpu)?;
        let family_indices = [graphics, present];

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format)
            .image_color_space(color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // Images shared across distinct graphics and present families
        // need CONCURRENT mode; the common single-family case keeps the
        // faster EXCLUSIVE default.
        if graphics != present {
            create_info = create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices);
        }

        let swapchain = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = unsafe { loader.get_swapchain_images(swapchain)? };
        let image_views = create_image_views(&device, &images, format)?;

        info!(
            "Swapchain ready: {}x{} {:?}, {} image(s), FIFO",
            extent.width,
            extent.height,
            format,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format,
            color_space,
            extent,
        })
    }

    /// Acquires the next image, signalling `semaphore` when it is usable.
    ///
    /// Returns the image index and whether the swapchain is suboptimal
    /// for the surface. `ERROR_OUT_OF_DATE_KHR` is passed through for the
    /// caller to trigger recreation.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Presents `image_index` once `wait_semaphore` signals.
    ///
    /// Returns true when the swapchain is suboptimal and should be
    /// recreated after this frame. `ERROR_OUT_OF_DATE_KHR` is passed
    /// through for the caller.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the number of images the driver actually created.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns one view per swapchain image, in image order.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for view in self.image_views.drain(..) {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        debug!(
            "Swapchain destroyed ({}x{})",
            self.extent.width, self.extent.height
        );
    }
}

/// Picks B8G8R8A8_SRGB with a nonlinear SRGB color space when offered.
///
/// Any surface that lacks the pair still works: the first advertised
/// format is used as is, with a warning so unexpected output has a trail.
fn select_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let wanted = formats.iter().copied().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match wanted {
        Some(format) => format,
        None => {
            warn!(
                "Surface lacks B8G8R8A8_SRGB, falling back to {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// Resolves the swapchain extent for a window-size request.
///
/// Surfaces that fix their extent report it in `current_extent` and that
/// value must be used verbatim. A `u32::MAX` sentinel means the surface
/// follows the swapchain, so the request is clamped to the allowed range.
fn select_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Clamps the preferred double-buffer count to the surface's range.
///
/// A `max_image_count` of zero means the surface imposes no upper bound.
fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let upper = match capabilities.max_image_count {
        0 => u32::MAX,
        max => max,
    };

    PREFERRED_IMAGE_COUNT.clamp(capabilities.min_image_count, upper)
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );

            let view = unsafe { device.handle().create_image_view(&create_info, None)? };
            Ok(view)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn image_count_caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn test_srgb_format_wins_over_earlier_entries() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
        ];

        assert_eq!(select_format(&formats).format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_format_fallback_is_first_entry() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];

        assert_eq!(select_format(&formats).format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_fixed_extent_overrides_request() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let extent = select_extent(&capabilities, 640, 480);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_flexible_extent_clamps_request() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            max_image_extent: vk::Extent2D {
                width: 1600,
                height: 1600,
            },
            ..Default::default()
        };

        let too_big = select_extent(&capabilities, 4000, 4000);
        assert_eq!((too_big.width, too_big.height), (1600, 1600));

        let too_small = select_extent(&capabilities, 10, 10);
        assert_eq!((too_small.width, too_small.height), (200, 200));

        let in_range = select_extent(&capabilities, 800, 600);
        assert_eq!((in_range.width, in_range.height), (800, 600));
    }

    #[test]
    fn test_image_count_prefers_double_buffering() {
        assert_eq!(select_image_count(&image_count_caps(1, 8)), 2);
    }

    #[test]
    fn test_image_count_raised_to_surface_minimum() {
        assert_eq!(select_image_count(&image_count_caps(3, 8)), 3);
    }

    #[test]
    fn test_image_count_capped_at_surface_maximum() {
        assert_eq!(select_image_count(&image_count_caps(1, 1)), 1);
    }

    #[test]
    fn test_image_count_with_unbounded_maximum() {
        assert_eq!(select_image_count(&image_count_caps(2, 0)), 2);
    }

    #[test]
    fn test_support_adequacy_needs_formats_and_modes() {
        let both = SurfaceSupport {
            capabilities: Default::default(),
            formats: vec![surface_format(vk::Format::B8G8R8A8_SRGB)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(both.is_adequate());

        let missing_formats = SurfaceSupport {
            formats: vec![],
            ..both.clone()
        };
        assert!(!missing_formats.is_adequate());

        let missing_modes = SurfaceSupport {
            present_modes: vec![],
            ..both
        };
        assert!(!missing_modes.is_adequate());
    }
}
