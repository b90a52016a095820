//! Uniform buffer structures shared with the shaders.
//!
//! Structures here are `#[repr(C)]` and follow std140 layout rules so they
//! can be copied into uniform buffers byte for byte:
//! - `Mat4` is 64 bytes
//! - `Vec3` occupies 12 bytes and must be padded to a 16 byte boundary

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-frame camera data bound at set 0, binding 0.
///
/// # Memory Layout (std140)
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | view |
/// | 64     | 64   | projection |
/// | 128    | 64   | view_projection |
/// | 192    | 12   | position |
/// | 204    | 4    | _padding |
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUbo {
    /// World to camera space.
    pub view: Mat4,
    /// Camera to clip space.
    pub projection: Mat4,
    /// Combined view-projection matrix.
    pub view_projection: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
    /// Padding to align the struct size to 16 bytes.
    pub _padding: f32,
}

impl CameraUbo {
    /// Size of this structure in bytes.
    pub const SIZE: u64 = size_of::<Self>() as u64;

    /// Builds camera data from view and projection matrices.
    ///
    /// The combined view-projection matrix is computed here once rather
    /// than per vertex in the shader.
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
            position,
            _padding: 0.0,
        }
    }
}

impl Default for CameraUbo {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_ubo_size() {
        // Three Mat4 (192) + Vec3 (12) + padding (4)
        assert_eq!(size_of::<CameraUbo>(), 208);
        assert_eq!(CameraUbo::SIZE, 208);
    }

    #[test]
    fn test_camera_ubo_alignment() {
        // std140 requires the struct size to be a multiple of 16
        assert_eq!(size_of::<CameraUbo>() % 16, 0);
        assert_eq!(align_of::<CameraUbo>() % 4, 0);
    }

    #[test]
    fn test_camera_ubo_combines_matrices() {
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);

        let ubo = CameraUbo::new(view, projection, Vec3::new(0.0, 0.0, 5.0));

        assert_eq!(ubo.view_projection, projection * view);
    }

    #[test]
    fn test_camera_ubo_bytes_roundtrip() {
        let ubo = CameraUbo::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::X);
        let bytes: &[u8] = bytemuck::bytes_of(&ubo);

        assert_eq!(bytes.len(), 208);

        let restored: &CameraUbo = bytemuck::from_bytes(bytes);
        assert_eq!(restored.position, Vec3::X);
    }
}
