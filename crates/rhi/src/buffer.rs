//! Buffers with manually allocated backing memory.
//!
//! Every [`Buffer`] owns a dedicated `VkDeviceMemory` allocation whose type
//! is chosen by [`find_memory_type`] from the buffer's usage. Host-visible
//! usages (uniform, staging) are mapped once at creation and stay mapped;
//! device-local usages (vertex, index) are filled through a temporary
//! staging buffer and a blocking one-shot copy.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use aurora_rhi::buffer::{Buffer, BufferUsage};
//! use aurora_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), aurora_rhi::RhiError> {
//! // Uniform buffers are written through their persistent mapping.
//! let ubo = Buffer::new(device, BufferUsage::Uniform, 256)?;
//! ubo.write_data(0, &[0u8; 64])?;
//! # Ok(())
//! # }
//! ```

use std::ffi::c_void;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::command::{CommandPool, begin_single_time_commands, end_single_time_commands};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::memory::find_memory_type;

/// What a buffer is for; decides its usage flags and where it lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local, filled once through a staging copy.
    Vertex,
    /// Device-local, filled once through a staging copy.
    Index,
    /// Host-visible and coherent, rewritten every frame.
    Uniform,
    /// Host-visible transfer source for uploads.
    Staging,
    /// Host-visible transfer destination for GPU-to-CPU readback.
    Readback,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        // Device-local usages carry TRANSFER_SRC too, so their contents can
        // be copied back out of VRAM.
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::TRANSFER_SRC
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
            BufferUsage::Readback => vk::BufferUsageFlags::TRANSFER_DST,
        }
    }

    /// Memory properties the allocation must provide for this usage.
    pub fn memory_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            BufferUsage::Uniform | BufferUsage::Staging | BufferUsage::Readback => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Whether the CPU can write this buffer directly.
    pub fn is_host_visible(self) -> bool {
        self.memory_flags()
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }
}

impl std::fmt::Display for BufferUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
            BufferUsage::Readback => "readback",
        })
    }
}

/// A `VkBuffer` bound to its own memory allocation.
///
/// Host-visible buffers keep a persistent mapping from creation to drop,
/// so per-frame writes are a plain memcpy with no map/unmap traffic.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    usage: BufferUsage,
    /// Set for host-visible usages, `None` for device-local ones.
    mapped: Option<*mut c_void>,
}

impl Buffer {
    /// Allocates an uninitialized buffer of `size` bytes.
    ///
    /// For host-visible usages the memory is mapped before returning.
    ///
    /// # Errors
    ///
    /// Fails on a zero size, when no memory type satisfies the usage's
    /// requirements, or when any Vulkan call fails. Partially created
    /// resources are destroyed before the error is returned.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "refusing to create a zero-sized {usage} buffer"
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            device.memory_properties(),
            requirements.memory_type_bits,
            usage.memory_flags(),
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.handle().allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        unsafe {
            device.handle().bind_buffer_memory(buffer, memory, 0)?;
        }

        let mapped = if usage.is_host_visible() {
            let ptr = unsafe {
                device
                    .handle()
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
            };
            Some(ptr)
        } else {
            None
        };

        debug!(size, "{usage} buffer allocated");

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            usage,
            mapped,
        })
    }

    /// Allocates a buffer and fills it with `data`.
    ///
    /// Host-visible usages are written through their mapping. Device-local
    /// usages go through a throwaway staging buffer and a one-shot copy
    /// submitted on `command_pool`; the call blocks until the copy lands.
    ///
    /// # Errors
    ///
    /// Fails when either allocation or the transfer submission fails.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use aurora_rhi::buffer::{Buffer, BufferUsage};
    /// use aurora_rhi::command::CommandPool;
    /// use aurora_rhi::device::Device;
    ///
    /// # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), aurora_rhi::RhiError> {
    /// let indices: [u32; 3] = [0, 1, 2];
    /// let ibo = Buffer::new_with_data(
    ///     device,
    ///     pool,
    ///     BufferUsage::Index,
    ///     bytemuck::cast_slice(&indices),
    /// )?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new_with_data(
        device: Arc<Device>,
        command_pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;

        if usage.is_host_visible() {
            let buffer = Self::new(device, usage, size)?;
            buffer.write_data(0, data)?;
            return Ok(buffer);
        }

        let staging = Self::new(device.clone(), BufferUsage::Staging, size)?;
        staging.write_data(0, data)?;

        let buffer = Self::new(device.clone(), usage, size)?;

        let command_buffer = begin_single_time_commands(&device, command_pool)?;
        let region = vk::BufferCopy::default().size(size);
        unsafe {
            device
                .handle()
                .cmd_copy_buffer(command_buffer, staging.handle(), buffer.buffer, &[region]);
        }
        end_single_time_commands(&device, command_pool, command_buffer)?;

        debug!(size, "{usage} buffer filled via staging copy");

        Ok(buffer)
    }

    /// Copies `data` into the mapping at `offset` bytes.
    ///
    /// Only valid for host-visible buffers; device-local ones take their
    /// contents at creation through [`Buffer::new_with_data`].
    ///
    /// # Errors
    ///
    /// Fails when the buffer has no mapping or the write would run past
    /// the end of the buffer.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "write of {} bytes at offset {offset} overruns {} byte {} buffer",
                data.len(),
                self.size,
                self.usage
            )));
        }

        let mapped = self.mapped.ok_or_else(|| {
            RhiError::InvalidHandle(format!("{} buffer has no host mapping", self.usage))
        })?;

        unsafe {
            let dst = (mapped as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Copies `out.len()` bytes from the mapping at `offset` into `out`.
    ///
    /// The GPU side of any transfer into this buffer must have completed;
    /// callers go through a device-idle or fence wait first.
    ///
    /// # Errors
    ///
    /// Fails when the buffer has no mapping or the read would run past the
    /// end of the buffer.
    pub fn read_data(&self, offset: vk::DeviceSize, out: &mut [u8]) -> RhiResult<()> {
        if out.is_empty() {
            return Ok(());
        }

        let end = offset + out.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "read of {} bytes at offset {offset} overruns {} byte {} buffer",
                out.len(),
                self.size,
                self.usage
            )));
        }

        let mapped = self.mapped.ok_or_else(|| {
            RhiError::InvalidHandle(format!("{} buffer has no host mapping", self.usage))
        })?;

        unsafe {
            let src = (mapped as *const u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(src, out.as_mut_ptr(), out.len());
        }

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.handle().unmap_memory(self.memory);
            }
            self.device.handle().destroy_buffer(self.buffer, None);
            self.device.handle().free_memory(self.memory, None);
        }

        debug!("{} buffer destroyed", self.usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_USAGES: [BufferUsage; 5] = [
        BufferUsage::Vertex,
        BufferUsage::Index,
        BufferUsage::Uniform,
        BufferUsage::Staging,
        BufferUsage::Readback,
    ];

    #[test]
    fn test_device_local_usages_are_transfer_destinations() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index] {
            assert!(
                usage
                    .to_vk_usage()
                    .contains(vk::BufferUsageFlags::TRANSFER_DST),
                "{usage} must accept staging copies"
            );
            assert_eq!(usage.memory_flags(), vk::MemoryPropertyFlags::DEVICE_LOCAL);
            assert!(!usage.is_host_visible());
        }
    }

    #[test]
    fn test_host_visible_usages_are_coherent() {
        for usage in [
            BufferUsage::Uniform,
            BufferUsage::Staging,
            BufferUsage::Readback,
        ] {
            assert!(usage.is_host_visible(), "{usage} must be mappable");
            assert!(
                usage
                    .memory_flags()
                    .contains(vk::MemoryPropertyFlags::HOST_COHERENT),
                "{usage} access must not need explicit flushes"
            );
        }
    }

    #[test]
    fn test_usage_flags_match_role() {
        let cases = [
            (BufferUsage::Vertex, vk::BufferUsageFlags::VERTEX_BUFFER),
            (BufferUsage::Index, vk::BufferUsageFlags::INDEX_BUFFER),
            (BufferUsage::Uniform, vk::BufferUsageFlags::UNIFORM_BUFFER),
            (BufferUsage::Staging, vk::BufferUsageFlags::TRANSFER_SRC),
            (BufferUsage::Readback, vk::BufferUsageFlags::TRANSFER_DST),
        ];
        for (usage, flag) in cases {
            assert!(usage.to_vk_usage().contains(flag));
        }
    }

    #[test]
    fn test_display_names_are_distinct() {
        let mut names: Vec<String> = ALL_USAGES.iter().map(|u| u.to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_USAGES.len());
    }
}
