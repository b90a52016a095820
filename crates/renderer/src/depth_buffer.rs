//! Depth attachment backing the forward pass.

use std::sync::Arc;

use aurora_rhi::device::Device;
use aurora_rhi::image::Image;
use aurora_rhi::{RhiResult, vk};
use tracing::debug;

/// Depth format used by the renderer.
///
/// `D32_SFLOAT` is universally supported for depth attachments and avoids
/// the precision artifacts of 24-bit formats on large scenes.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// A depth image matching the swapchain extent.
///
/// One depth buffer is shared by all framebuffers; only a single frame
/// writes depth at a time because the render pass serializes access.
/// It must be recreated together with the swapchain whenever the window
/// size changes.
pub struct DepthBuffer {
    image: Image,
}

impl DepthBuffer {
    /// Creates a depth buffer with the given dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if image or view creation fails.
    pub fn new(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        let image = Image::new_depth(device, width, height, DEPTH_FORMAT)?;
        debug!("Created {}x{} depth buffer ({:?})", width, height, DEPTH_FORMAT);
        Ok(Self { image })
    }

    /// Returns the depth image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    /// Returns the depth image view.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Returns the depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// Returns the depth buffer extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}
