//! Sampled textures.
//!
//! A [`Texture`] pairs a device-local [`Image`] with a [`Sampler`] and
//! handles the staged upload path: pixel data is written to a host-visible
//! staging buffer, copied into the image on the graphics queue, and the
//! image is transitioned to `SHADER_READ_ONLY_OPTIMAL`. The upload blocks
//! until the copy completes, so staging resources are released before the
//! constructor returns.
//!
//! All textures use `R8G8B8A8_SRGB`, which matches the 8-bit color data
//! the asset pipeline produces.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{self, CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::Image;
use crate::sampler::Sampler;

/// Texture format used for all sampled color images.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A sampled texture: device-local image plus sampler.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Creates a 2D texture from tightly packed RGBA8 pixel data.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `pool` - Command pool used for the upload commands
    /// * `width` - Texture width in pixels
    /// * `height` - Texture height in pixels
    /// * `pixels` - RGBA8 pixel data, must be exactly `width * height * 4` bytes
    /// * `max_anisotropy` - Anisotropic filtering level for the sampler, or None
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel data length does not match the
    /// dimensions or if any GPU operation fails.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        pixels: &[u8],
        max_anisotropy: Option<f32>,
    ) -> RhiResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RhiError::TextureError(format!(
                "Pixel data is {} bytes but {}x{} RGBA8 needs {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }

        let image = Image::new_2d(
            device.clone(),
            width,
            height,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        )?;

        upload_pixels(&device, pool, &image, pixels)?;

        let sampler = Sampler::linear_repeat(device, max_anisotropy)?;

        info!("Created {}x{} texture", width, height);

        Ok(Self { image, sampler })
    }

    /// Creates a 1x1 texture of a single color.
    ///
    /// Used as a fallback when a material has no texture.
    pub fn solid_color(device: Arc<Device>, pool: &CommandPool, rgba: [u8; 4]) -> RhiResult<Self> {
        Self::from_rgba8(device, pool, 1, 1, &rgba, None)
    }

    /// Creates a cubemap texture from six tightly packed RGBA8 faces.
    ///
    /// Face order follows the Vulkan convention: +X, -X, +Y, -Y, +Z, -Z.
    /// Every face must be `width * height * 4` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if any face has the wrong length or if any GPU
    /// operation fails.
    pub fn cubemap_from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        width: u32,
        height: u32,
        faces: &[&[u8]; 6],
    ) -> RhiResult<Self> {
        let face_bytes = width as usize * height as usize * 4;
        for (i, face) in faces.iter().enumerate() {
            if face.len() != face_bytes {
                return Err(RhiError::TextureError(format!(
                    "Cubemap face {} is {} bytes but {}x{} RGBA8 needs {}",
                    i,
                    face.len(),
                    width,
                    height,
                    face_bytes
                )));
            }
        }

        let image = Image::new_cubemap(device.clone(), width, height, TEXTURE_FORMAT)?;

        // Pack all six faces into one staging buffer, layer by layer
        let staging = Buffer::new(
            device.clone(),
            BufferUsage::Staging,
            (face_bytes * 6) as vk::DeviceSize,
        )?;
        for (i, face) in faces.iter().enumerate() {
            staging.write_data((i * face_bytes) as vk::DeviceSize, face)?;
        }

        let raw = command::begin_single_time_commands(&device, pool)?;
        let cmd = CommandBuffer::from_handle(device.clone(), raw);

        transition_layout(
            &cmd,
            &image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        // One region covers all six layers since the buffer is tightly packed
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(6),
            )
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });
        cmd.copy_buffer_to_image(
            staging.handle(),
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        transition_layout(
            &cmd,
            &image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        command::end_single_time_commands(&device, pool, raw)?;

        let sampler = Sampler::linear_clamped(device)?;

        info!("Created {}x{} cubemap texture", width, height);

        Ok(Self { image, sampler })
    }

    /// Returns the underlying image.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Returns the sampler handle.
    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Returns the descriptor image info for binding this texture.
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .sampler(self.sampler.handle())
            .image_view(self.image.view())
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }
}

/// Uploads pixel data into a single-layer image via a staging buffer.
fn upload_pixels(
    device: &Arc<Device>,
    pool: &CommandPool,
    image: &Image,
    pixels: &[u8],
) -> RhiResult<()> {
    let staging = Buffer::new(
        device.clone(),
        BufferUsage::Staging,
        pixels.len() as vk::DeviceSize,
    )?;
    staging.write_data(0, pixels)?;

    let raw = command::begin_single_time_commands(device, pool)?;
    let cmd = CommandBuffer::from_handle(device.clone(), raw);

    transition_layout(
        &cmd,
        image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;

    let region = vk::BufferImageCopy::default()
        .buffer_offset(0)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_extent(vk::Extent3D {
            width: image.width(),
            height: image.height(),
            depth: 1,
        });
    cmd.copy_buffer_to_image(
        staging.handle(),
        image.handle(),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        &[region],
    );

    transition_layout(
        &cmd,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;

    command::end_single_time_commands(device, pool, raw)
}

/// Records a layout transition barrier covering all layers of an image.
fn transition_layout(
    cmd: &CommandBuffer,
    image: &Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> RhiResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => {
            return Err(RhiError::TextureError(format!(
                "Unsupported layout transition: {:?} -> {:?}",
                old_layout, new_layout
            )));
        }
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image.handle())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(image.layers()),
        )
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]);

    debug!("Transitioned image layout: {:?} -> {:?}", old_layout, new_layout);

    Ok(())
}
