//! Texture and cubemap loading.
//!
//! All pixel data is normalized to tightly packed RGBA8 so the renderer
//! has a single upload path.

use std::path::{Path, PathBuf};

use crate::error::{AssetError, AssetResult};

/// Cubemap face file names, in Vulkan layer order (+X, -X, +Y, -Y, +Z, -Z).
pub const FACE_NAMES: [&str; 6] = ["posx", "negx", "posy", "negy", "posz", "negz"];

/// File extensions tried for each cubemap face, in order.
const FACE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// RGBA8 pixel data for a single 2D image.
#[derive(Debug, Clone, Default)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Loads an image file and converts it to RGBA8.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be decoded.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        let image = image::open(path)?.to_rgba8();
        Ok(Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }

    /// Converts pixel data decoded by the glTF importer to RGBA8.
    ///
    /// # Errors
    ///
    /// Returns an error for pixel formats other than 8-bit gray, RGB,
    /// and RGBA.
    pub fn from_gltf_image(data: &gltf::image::Data) -> AssetResult<Self> {
        let pixels = match data.format {
            gltf::image::Format::R8G8B8A8 => data.pixels.clone(),
            gltf::image::Format::R8G8B8 => rgb_to_rgba(&data.pixels),
            gltf::image::Format::R8 => gray_to_rgba(&data.pixels),
            other => {
                return Err(AssetError::UnsupportedTextureFormat(format!("{:?}", other)));
            }
        };

        Ok(Self {
            width: data.width,
            height: data.height,
            pixels,
        })
    }
}

/// RGBA8 pixel data for the six faces of a cubemap.
#[derive(Debug, Clone, Default)]
pub struct CubemapData {
    pub width: u32,
    pub height: u32,
    /// Face pixels in [`FACE_NAMES`] order.
    pub faces: [Vec<u8>; 6],
}

impl CubemapData {
    /// Loads six cubemap faces from a directory.
    ///
    /// Each face is looked up as `<dir>/<face>.<ext>` using the names in
    /// [`FACE_NAMES`] and the extensions png, jpg, and jpeg.
    ///
    /// # Errors
    ///
    /// Returns an error if a face file is missing, fails to decode, or
    /// has different dimensions than the first face.
    pub fn load_dir(dir: &Path) -> AssetResult<Self> {
        let mut width = 0;
        let mut height = 0;
        let mut faces: [Vec<u8>; 6] = Default::default();

        for (i, face) in FACE_NAMES.iter().enumerate() {
            let path =
                find_face(dir, face).ok_or_else(|| AssetError::FileNotFound(dir.join(face)))?;
            let texture = TextureData::load(&path)?;

            if i == 0 {
                width = texture.width;
                height = texture.height;
            } else if texture.width != width || texture.height != height {
                return Err(AssetError::CubemapFaceMismatch {
                    face: face.to_string(),
                    width: texture.width,
                    height: texture.height,
                    expected_width: width,
                    expected_height: height,
                });
            }

            faces[i] = texture.pixels;
        }

        Ok(Self {
            width,
            height,
            faces,
        })
    }

    /// Borrows the face pixels as slices, in [`FACE_NAMES`] order.
    pub fn face_refs(&self) -> [&[u8]; 6] {
        std::array::from_fn(|i| self.faces[i].as_slice())
    }
}

fn find_face(dir: &Path, face: &str) -> Option<PathBuf> {
    FACE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", face, ext)))
        .find(|path| path.exists())
}

fn rgb_to_rgba(pixels: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
    for rgb in pixels.chunks_exact(3) {
        rgba.extend_from_slice(rgb);
        rgba.push(u8::MAX);
    }
    rgba
}

fn gray_to_rgba(pixels: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixels.len() * 4);
    for &gray in pixels {
        rgba.extend_from_slice(&[gray, gray, gray, u8::MAX]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_rgba_adds_opaque_alpha() {
        let rgba = rgb_to_rgba(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(rgba, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_gray_to_rgba_replicates_channels() {
        let rgba = gray_to_rgba(&[7, 200]);
        assert_eq!(rgba, vec![7, 7, 7, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn test_from_gltf_image_passes_rgba_through() {
        let data = gltf::image::Data {
            pixels: vec![9, 8, 7, 6],
            format: gltf::image::Format::R8G8B8A8,
            width: 1,
            height: 1,
        };

        let texture = TextureData::from_gltf_image(&data).unwrap();
        assert_eq!(texture.pixels, vec![9, 8, 7, 6]);
        assert_eq!((texture.width, texture.height), (1, 1));
    }

    #[test]
    fn test_from_gltf_image_rejects_16_bit() {
        let data = gltf::image::Data {
            pixels: vec![0; 8],
            format: gltf::image::Format::R16G16B16A16,
            width: 1,
            height: 1,
        };

        let result = TextureData::from_gltf_image(&data);
        assert!(matches!(
            result,
            Err(AssetError::UnsupportedTextureFormat(_))
        ));
    }

    #[test]
    fn test_face_refs_order_matches_faces() {
        let cubemap = CubemapData {
            width: 1,
            height: 1,
            faces: std::array::from_fn(|i| vec![i as u8; 4]),
        };

        let refs = cubemap.face_refs();
        for (i, face) in refs.iter().enumerate() {
            assert_eq!(face[0], i as u8);
        }
    }
}
