//! GPU image management.
//!
//! This module handles creation of 2D images, depth attachments, and
//! cubemaps. Each image owns a dedicated device-local memory allocation
//! and a matching image view.
//!
//! # Overview
//!
//! - [`Image::new_2d`] creates a sampled 2D image (textures)
//! - [`Image::new_depth`] creates a depth attachment
//! - [`Image::new_cubemap`] creates a 6-layer cube-compatible image
//!
//! # Resource Destruction
//!
//! Resources are destroyed in the following order:
//! 1. Image view
//! 2. Image
//! 3. Memory allocation

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory::find_memory_type;

/// GPU image wrapper with manually allocated memory.
///
/// The image, its device-local memory, and its view share one lifetime.
/// Layout transitions and data uploads are the caller's responsibility
/// (see the texture module).
pub struct Image {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Backing memory allocation.
    memory: vk::DeviceMemory,
    /// Vulkan image view handle.
    view: vk::ImageView,
    /// Image format.
    format: vk::Format,
    /// Image dimensions.
    extent: vk::Extent2D,
    /// Number of array layers (6 for cubemaps).
    layers: u32,
}

impl Image {
    /// Creates a 2D image with the given usage.
    ///
    /// The image uses optimal tiling and device-local memory. Typical
    /// usage for textures is `TRANSFER_DST | SAMPLED`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero, no device-local
    /// memory type exists, or image/view creation fails.
    pub fn new_2d(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> RhiResult<Self> {
        Self::create(
            device,
            width,
            height,
            format,
            usage,
            1,
            vk::ImageCreateFlags::empty(),
            vk::ImageViewType::TYPE_2D,
            vk::ImageAspectFlags::COLOR,
        )
    }

    /// Creates a depth attachment image.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or creation fails.
    pub fn new_depth(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        Self::create(
            device,
            width,
            height,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            1,
            vk::ImageCreateFlags::empty(),
            vk::ImageViewType::TYPE_2D,
            vk::ImageAspectFlags::DEPTH,
        )
    }

    /// Creates a cube-compatible image with six array layers.
    ///
    /// `width` and `height` are the dimensions of a single face. The view
    /// is created with `VIEW_TYPE_CUBE` covering all six layers.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or creation fails.
    pub fn new_cubemap(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> RhiResult<Self> {
        Self::create(
            device,
            width,
            height,
            format,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            6,
            vk::ImageCreateFlags::CUBE_COMPATIBLE,
            vk::ImageViewType::CUBE,
            vk::ImageAspectFlags::COLOR,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn create(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        layers: u32,
        flags: vk::ImageCreateFlags,
        view_type: vk::ImageViewType,
        aspect: vk::ImageAspectFlags,
    ) -> RhiResult<Self> {
        if width == 0 || height == 0 {
            return Err(RhiError::InvalidHandle(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        // Get memory requirements and allocate device-local memory
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let memory_type_index = match find_memory_type(
            device.memory_properties(),
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.handle().allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e.into());
            }
        };

        unsafe {
            device.handle().bind_image_memory(image, memory, 0)?;
        }

        // Create image view
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(layers),
            );

        let view = match unsafe { device.handle().create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.handle().destroy_image(image, None);
                    device.handle().free_memory(memory, None);
                }
                return Err(e.into());
            }
        };

        debug!(
            "Created image: {}x{} ({:?}, {} layer(s))",
            width, height, format, layers
        );

        Ok(Self {
            device,
            image,
            memory,
            view,
            format,
            extent,
            layers,
        })
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent (width and height).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Returns the height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Returns the number of array layers.
    #[inline]
    pub fn layers(&self) -> u32 {
        self.layers
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
            self.device.handle().free_memory(self.memory, None);
        }

        debug!(
            "Destroyed image: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_is_send_sync() {
        // Compile-time check that Image is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Image>();
    }
}
