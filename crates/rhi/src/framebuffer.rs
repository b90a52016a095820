//! Framebuffer management.
//!
//! One framebuffer is created per swapchain image view, all sharing a single
//! depth attachment. Only one frame renders into the depth buffer at a time,
//! so the depth view does not need to be duplicated per image.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiError;

/// Set of framebuffers, one per swapchain image.
pub struct Framebuffers {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Framebuffer handles, indexed by swapchain image index
    framebuffers: Vec<vk::Framebuffer>,
    /// Framebuffer extent
    extent: vk::Extent2D,
}

impl Framebuffers {
    /// Creates framebuffers for a set of swapchain image views.
    ///
    /// Every framebuffer pairs one color view with the shared `depth_view`.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - The render pass the framebuffers must be compatible with
    /// * `color_views` - Swapchain image views, one framebuffer is created per view
    /// * `depth_view` - Depth attachment view shared by all framebuffers
    /// * `extent` - Framebuffer dimensions (must match the swapchain extent)
    ///
    /// # Errors
    ///
    /// Returns an error if any framebuffer creation fails. Framebuffers
    /// created before the failure are destroyed.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        color_views: &[vk::ImageView],
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<Self, RhiError> {
        let mut framebuffers = Vec::with_capacity(color_views.len());

        for &color_view in color_views {
            let attachments = [color_view, depth_view];

            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = match unsafe {
                device.handle().create_framebuffer(&create_info, None)
            } {
                Ok(framebuffer) => framebuffer,
                Err(e) => {
                    for &created in &framebuffers {
                        unsafe {
                            device.handle().destroy_framebuffer(created, None);
                        }
                    }
                    return Err(RhiError::VulkanError(e));
                }
            };

            framebuffers.push(framebuffer);
        }

        debug!(
            "Created {} framebuffers ({}x{})",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(Self {
            device,
            framebuffers,
            extent,
        })
    }

    /// Returns the framebuffer for a swapchain image index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    /// Returns the number of framebuffers.
    #[inline]
    pub fn count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Returns the framebuffer extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for &framebuffer in &self.framebuffers {
            unsafe {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
        }
        debug!("Destroyed {} framebuffers", self.framebuffers.len());
    }
}
