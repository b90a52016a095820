//! Device memory selection and allocation.
//!
//! Buffers and images follow the same pattern: create the resource,
//! query its memory requirements, pick a memory type with
//! [`find_memory_type`], allocate with [`allocate_memory`], bind.

use ash::vk;
use tracing::trace;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Selects a memory type index for a resource.
///
/// Returns the first index `i` such that bit `i` is set in `type_filter`
/// and the memory type's property flags contain all of `properties`.
/// No scoring beyond first match.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableMemoryType`] when no memory type
/// satisfies both conditions. Callers must treat this as fatal for the
/// allocation; there is no safe fallback index.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        let type_supported = (type_filter & (1 << i)) != 0;
        let flags = memory_properties.memory_types[i as usize].property_flags;

        if type_supported && flags.contains(properties) {
            trace!(
                "Selected memory type {} (flags {:?}) for filter {:#b}",
                i, flags, type_filter
            );
            return Ok(i);
        }
    }

    Err(RhiError::NoSuitableMemoryType {
        type_filter,
        properties,
    })
}

/// Allocates device memory for a resource.
///
/// # Errors
///
/// Returns an error if no memory type satisfies the requirements or the
/// allocation itself fails.
pub fn allocate_memory(
    device: &Device,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> RhiResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(
        device.memory_properties(),
        requirements.memory_type_bits,
        properties,
    )?;

    let alloc_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe { device.handle().allocate_memory(&alloc_info, None)? };

    trace!(
        "Allocated {} bytes from memory type {}",
        requirements.size, memory_type_index
    );

    Ok(memory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_memory_properties(
        types: &[vk::MemoryPropertyFlags],
    ) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, &flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn test_first_matching_index_wins() {
        let props = mock_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        // All types allowed by the filter; index 1 is the first host-visible one.
        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_type_filter_excludes_indices() {
        let props = mock_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Filter only allows bit 1, so index 0 must be skipped even
        // though its flags match.
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_property_superset_required() {
        let props = mock_memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        // Index 0 lacks HOST_COHERENT; index 1 is a strict superset and matches.
        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_no_match_is_an_error_not_index_zero() {
        let props = mock_memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        match result {
            Err(RhiError::NoSuitableMemoryType {
                type_filter,
                properties,
            }) => {
                assert_eq!(type_filter, 0b1);
                assert_eq!(properties, vk::MemoryPropertyFlags::HOST_VISIBLE);
            }
            other => panic!("expected NoSuitableMemoryType, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_empty_filter_never_matches() {
        let props = mock_memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        assert!(find_memory_type(&props, 0, vk::MemoryPropertyFlags::empty()).is_err());
    }
}
