//! Texture sampler management.
//!
//! Samplers describe how shaders filter and address texture reads. The
//! renderer uses linear filtering everywhere; repeat addressing for mesh
//! textures and clamp-to-edge for cubemaps, where wrapping would bleed
//! across face seams.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan sampler wrapper.
pub struct Sampler {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan sampler handle.
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a sampler with the given filtering and addressing modes.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `filter` - Filter for magnification and minification
    /// * `address_mode` - Addressing mode applied to all three coordinates
    /// * `max_anisotropy` - Anisotropic filtering level, or None to disable.
    ///   Must not exceed the device's `max_sampler_anisotropy` limit.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(
        device: Arc<Device>,
        filter: vk::Filter,
        address_mode: vk::SamplerAddressMode,
        max_anisotropy: Option<f32>,
    ) -> RhiResult<Self> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(max_anisotropy.is_some())
            .max_anisotropy(max_anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);

        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!(
            "Created sampler (filter: {:?}, address mode: {:?}, anisotropy: {:?})",
            filter, address_mode, max_anisotropy
        );

        Ok(Self { device, sampler })
    }

    /// Creates a linear sampler with repeat addressing.
    ///
    /// This is the default sampler for mesh textures.
    pub fn linear_repeat(device: Arc<Device>, max_anisotropy: Option<f32>) -> RhiResult<Self> {
        Self::new(
            device,
            vk::Filter::LINEAR,
            vk::SamplerAddressMode::REPEAT,
            max_anisotropy,
        )
    }

    /// Creates a linear sampler with clamp-to-edge addressing.
    ///
    /// Used for cubemaps.
    pub fn linear_clamped(device: Arc<Device>) -> RhiResult<Self> {
        Self::new(
            device,
            vk::Filter::LINEAR,
            vk::SamplerAddressMode::CLAMP_TO_EDGE,
            None,
        )
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
        debug!("Destroyed sampler");
    }
}
