//! Vertex format shared by every mesh pipeline.

use std::mem::offset_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Interleaved mesh vertex: position, normal, UV, and vertex color.
///
/// `#[repr(C)]` keeps the layout fixed at 48 bytes so the attribute
/// descriptions below stay valid:
///
/// | location | field       | format              | offset |
/// |----------|-------------|---------------------|--------|
/// | 0        | `position`  | `R32G32B32_SFLOAT`  | 0      |
/// | 1        | `normal`    | `R32G32B32_SFLOAT`  | 12     |
/// | 2        | `tex_coord` | `R32G32_SFLOAT`     | 24     |
/// | 3        | `color`     | `R32G32B32A32_SFLOAT` | 32   |
///
/// Meshes without a color attribute fill `color` with opaque white so the
/// shader can multiply it in unconditionally.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
    pub color: Vec4,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, tex_coord: Vec2, color: Vec4) -> Self {
        Self {
            position,
            normal,
            tex_coord,
            color,
        }
    }

    /// Stride of one vertex in bytes.
    #[inline]
    pub const fn stride() -> u32 {
        std::mem::size_of::<Self>() as u32
    }

    /// Binding description for binding 0, advancing per vertex.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(Self::stride())
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Attribute descriptions matching the table in the type docs.
    ///
    /// Offsets come from `offset_of!`, so reordering fields would be caught
    /// by the layout test rather than silently corrupting attributes.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        let attr = |location: u32, format: vk::Format, offset: usize| {
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(location)
                .format(format)
                .offset(offset as u32)
        };

        [
            attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attr(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
            attr(
                3,
                vk::Format::R32G32B32A32_SFLOAT,
                offset_of!(Vertex, color),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_48_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        assert_eq!(Vertex::stride(), 48);

        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 12);
        assert_eq!(offset_of!(Vertex, tex_coord), 24);
        assert_eq!(offset_of!(Vertex, color), 32);
    }

    #[test]
    fn test_binding_advances_per_vertex() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 48);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attributes_cover_all_fields() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 4);

        let expected = [
            (0u32, vk::Format::R32G32B32_SFLOAT, 0u32),
            (1, vk::Format::R32G32B32_SFLOAT, 12),
            (2, vk::Format::R32G32_SFLOAT, 24),
            (3, vk::Format::R32G32B32A32_SFLOAT, 32),
        ];
        for (attr, (location, format, offset)) in attrs.iter().zip(expected) {
            assert_eq!(attr.binding, 0);
            assert_eq!(attr.location, location);
            assert_eq!(attr.format, format);
            assert_eq!(attr.offset, offset);
        }
    }

    #[test]
    fn test_pod_cast_preserves_fields() {
        let vertex = Vertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::Y,
            Vec2::splat(0.5),
            Vec4::ONE,
        );

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 48);

        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(back.position, vertex.position);
        assert_eq!(back.normal, vertex.normal);
        assert_eq!(back.tex_coord, vertex.tex_coord);
        assert_eq!(back.color, vertex.color);
    }
}
