//! Semaphores, fences, and the per-frame sync bundle.
//!
//! Semaphores order work between queue operations on the GPU; fences
//! let the host wait for the GPU. [`FrameSync`] bundles the three
//! objects one frame slot needs to run through acquire, submit, and
//! present.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// How many frames the CPU may record ahead of the GPU.
///
/// Two slots let the CPU record frame N+1 while the GPU draws frame N.
/// More slots add latency without helping a FIFO-paced loop.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// GPU-to-GPU ordering primitive.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates an unsignaled binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Returns the semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// GPU-to-CPU completion primitive.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled.
    ///
    /// Frame fences start signaled so the first wait on a slot that has
    /// never submitted returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    /// Returns the fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence signals or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or device loss.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?;
        }
        Ok(())
    }

    /// Returns the fence to the unsignaled state.
    ///
    /// Must not be called while a submission still references the fence.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// The synchronization objects owned by one frame slot.
///
/// A frame runs: wait on the fence, acquire an image (signals the
/// image-available semaphore), submit (waits on image-available,
/// signals render-finished and the fence), present (waits on
/// render-finished).
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    /// Creates the semaphore pair and a pre-signaled fence.
    ///
    /// # Errors
    ///
    /// Returns an error if any object creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let sync = Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        };

        debug!("Frame sync objects created");
        Ok(sync)
    }

    /// The semaphore acquire signals when its image is usable.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    /// The semaphore submit signals when rendering finishes.
    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    /// The fence submit signals when the slot's work completes.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight
    }

    /// Raw handle of the in-flight fence, for submit info.
    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.in_flight.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn require_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_cpu_records_at_most_one_frame_ahead() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn test_sync_objects_are_send_sync() {
        require_send_sync::<Semaphore>();
        require_send_sync::<Fence>();
        require_send_sync::<FrameSync>();
    }
}
