//! Per-frame resources and frame pacing.
//!
//! The renderer keeps [`MAX_FRAMES_IN_FLIGHT`] frame slots and cycles
//! through them. Each slot owns its synchronization primitives, command
//! buffer, and camera uniform buffer, so the CPU can record frame N+1
//! while the GPU still works on frame N.

use std::sync::Arc;

use aurora_rhi::buffer::{Buffer, BufferUsage};
use aurora_rhi::command::{CommandBuffer, CommandPool};
use aurora_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout};
use aurora_rhi::device::Device;
use aurora_rhi::swapchain::Swapchain;
use aurora_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use aurora_rhi::{RhiResult, vk};
use tracing::{debug, info, warn};

use crate::ubo::CameraUbo;

/// How an image acquire turned out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; render normally.
    Acquired,
    /// An image was acquired but the swapchain no longer matches the
    /// surface exactly. Render this frame, then recreate the swapchain.
    Suboptimal,
    /// No image could be acquired. Recreate the swapchain and skip the
    /// frame. The slot's fence has not been reset, so the next attempt
    /// will not deadlock waiting on it.
    OutOfDate,
}

/// Resources owned by one frame slot.
pub struct FrameSlot {
    sync: FrameSync,
    command_buffer: CommandBuffer,
    camera_ubo: Buffer,
    descriptor_set: vk::DescriptorSet,
}

impl FrameSlot {
    /// Returns the slot's synchronization primitives.
    #[inline]
    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }

    /// Returns the slot's command buffer.
    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// Returns the camera descriptor set for this slot (set 0).
    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Writes camera data into this slot's uniform buffer.
    ///
    /// The buffer is persistently mapped, so this is a plain memory copy.
    pub fn update_camera(&self, camera: &CameraUbo) -> RhiResult<()> {
        self.camera_ubo.write_data(0, bytemuck::bytes_of(camera))
    }
}

/// Index of the slot that follows `current` in the frame cycle.
#[inline]
fn next_frame_index(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// Cycles frame slots and drives the acquire, submit, and present steps.
///
/// The expected call sequence per frame is:
///
/// 1. [`wait_for_frame`](Self::wait_for_frame)
/// 2. [`acquire_image`](Self::acquire_image)
/// 3. [`begin_frame`](Self::begin_frame) (resets the fence, so it must
///    only run once an image is acquired and the frame will be submitted)
/// 4. record commands
/// 5. [`end_frame`](Self::end_frame), [`submit`](Self::submit),
///    [`present`](Self::present)
/// 6. [`next_frame`](Self::next_frame)
pub struct FrameManager {
    device: Arc<Device>,
    slots: Vec<FrameSlot>,
    current_frame: usize,
    image_index: u32,
}

impl FrameManager {
    /// Creates frame slots with their sync objects, command buffers,
    /// camera uniform buffers, and camera descriptor sets.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object creation or descriptor
    /// allocation fails.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        camera_layout: &DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let layouts = vec![camera_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for descriptor_set in descriptor_sets {
            let sync = FrameSync::new(device.clone())?;
            let command_buffer = CommandBuffer::new(device.clone(), command_pool)?;
            let camera_ubo = Buffer::new(device.clone(), BufferUsage::Uniform, CameraUbo::SIZE)?;

            let buffer_infos = [descriptor::buffer_info(
                camera_ubo.handle(),
                0,
                CameraUbo::SIZE,
            )];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos);
            descriptor::update_descriptor_sets(&device, &[write]);

            slots.push(FrameSlot {
                sync,
                command_buffer,
                camera_ubo,
                descriptor_set,
            });
        }

        info!("Created {} frame slots", slots.len());

        Ok(Self {
            device,
            slots,
            current_frame: 0,
            image_index: 0,
        })
    }

    /// Returns the current frame slot.
    #[inline]
    pub fn current_slot(&self) -> &FrameSlot {
        &self.slots[self.current_frame]
    }

    /// Returns the index of the current frame slot.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Returns the swapchain image index of the last successful acquire.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Returns the number of frame slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until the current slot's previous submission has retired.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the fence fails.
    pub fn wait_for_frame(&self) -> RhiResult<()> {
        self.current_slot().sync.in_flight_fence().wait(u64::MAX)
    }

    /// Acquires the next swapchain image using the current slot's
    /// image-available semaphore.
    ///
    /// Out-of-date and suboptimal results are reported through
    /// [`AcquireOutcome`] rather than as errors; only fatal results such
    /// as device loss are returned as `Err`.
    pub fn acquire_image(&mut self, swapchain: &Swapchain) -> RhiResult<AcquireOutcome> {
        match swapchain.acquire_next_image(self.current_slot().sync.image_available_handle()) {
            Ok((index, false)) => {
                self.image_index = index;
                Ok(AcquireOutcome::Acquired)
            }
            Ok((index, true)) => {
                self.image_index = index;
                debug!("Acquired suboptimal swapchain image {}", index);
                Ok(AcquireOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date at acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => {
                warn!("Failed to acquire swapchain image: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Resets the slot's fence and starts command buffer recording.
    ///
    /// Must only be called after a successful acquire: resetting the fence
    /// earlier would deadlock the next [`wait_for_frame`] if this frame is
    /// skipped without submitting.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence or command buffer reset fails.
    pub fn begin_frame(&self) -> RhiResult<()> {
        let slot = self.current_slot();
        slot.sync.in_flight_fence().reset()?;
        slot.command_buffer.reset()?;
        slot.command_buffer.begin()
    }

    /// Ends command buffer recording for the current slot.
    ///
    /// # Errors
    ///
    /// Returns an error if ending the command buffer fails.
    pub fn end_frame(&self) -> RhiResult<()> {
        self.current_slot().command_buffer.end()
    }

    /// Writes camera data into the current slot's uniform buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the write exceeds the buffer size.
    pub fn update_camera(&self, camera: &CameraUbo) -> RhiResult<()> {
        self.current_slot().update_camera(camera)
    }

    /// Submits the current slot's command buffer to the graphics queue.
    ///
    /// The submission waits for the image-available semaphore at the
    /// color-attachment-output stage, signals the render-finished
    /// semaphore, and signals the slot's fence on completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue submission fails.
    pub fn submit(&self) -> RhiResult<()> {
        let slot = self.current_slot();

        let wait_semaphores = [slot.sync.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [slot.command_buffer.handle()];
        let signal_semaphores = [slot.sync.render_finished_handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot.sync.in_flight_fence_handle(),
            )?;
        }

        Ok(())
    }

    /// Presents the acquired image, waiting on the render-finished
    /// semaphore.
    ///
    /// Returns `true` when the swapchain should be recreated, either
    /// because presentation reported it out of date or suboptimal.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal presentation failures such as device
    /// loss.
    pub fn present(&self, swapchain: &Swapchain) -> RhiResult<bool> {
        let slot = self.current_slot();

        match swapchain.present(
            self.device.present_queue(),
            self.image_index,
            slot.sync.render_finished_handle(),
        ) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date at present");
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to present swapchain image: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Advances to the next frame slot.
    #[inline]
    pub fn next_frame(&mut self) {
        self.current_frame = next_frame_index(self.current_frame);
    }

    /// Blocks until every slot's in-flight work has retired.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on any fence fails.
    pub fn wait_for_all_frames(&self) -> RhiResult<()> {
        for slot in &self.slots {
            slot.sync.in_flight_fence().wait(u64::MAX)?;
        }
        Ok(())
    }

    /// Replaces every slot's sync objects.
    ///
    /// After a swapchain recreation the old image-available semaphores may
    /// reference retired swapchain images, so all sync objects are created
    /// fresh. All frames must have retired before calling this.
    ///
    /// # Errors
    ///
    /// Returns an error if creating the new sync objects fails.
    pub fn reset_sync_objects(&mut self) -> RhiResult<()> {
        for slot in &mut self.slots {
            slot.sync = FrameSync::new(self.device.clone())?;
        }
        debug!("Recreated sync objects for {} frame slots", self.slots.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_frame_index_wraps() {
        assert_eq!(next_frame_index(0), 1);
        assert_eq!(next_frame_index(MAX_FRAMES_IN_FLIGHT - 1), 0);
    }

    #[test]
    fn test_next_frame_index_stays_in_range() {
        let mut index = 0;
        for _ in 0..10 {
            index = next_frame_index(index);
            assert!(index < MAX_FRAMES_IN_FLIGHT);
        }
    }
}
