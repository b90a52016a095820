//! Material definitions extracted from glTF.

use glam::Vec4;
use tracing::warn;

use crate::texture::TextureData;

/// Material properties used by the renderer.
#[derive(Debug, Clone)]
pub struct MaterialData {
    /// Material name from the file, possibly empty.
    pub name: String,
    /// Base color (albedo) factor.
    pub base_color: Vec4,
    /// Base color texture, if the material has one.
    pub base_color_texture: Option<TextureData>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec4::ONE,
            base_color_texture: None,
        }
    }
}

impl MaterialData {
    /// Extracts the renderer-relevant properties from a glTF material.
    ///
    /// A base color texture in an unsupported pixel format is dropped with
    /// a warning; the base color factor still applies.
    pub fn from_gltf(material: &gltf::Material, images: &[gltf::image::Data]) -> Self {
        let name = material.name().unwrap_or("").to_string();
        let pbr = material.pbr_metallic_roughness();

        let base_color_texture = pbr.base_color_texture().and_then(|info| {
            let image = images.get(info.texture().source().index())?;
            match TextureData::from_gltf_image(image) {
                Ok(texture) => Some(texture),
                Err(e) => {
                    warn!("Ignoring base color texture of material '{}': {}", name, e);
                    None
                }
            }
        });

        Self {
            name,
            base_color: Vec4::from(pbr.base_color_factor()),
            base_color_texture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material_is_plain_white() {
        let material = MaterialData::default();
        assert_eq!(material.base_color, Vec4::ONE);
        assert!(material.base_color_texture.is_none());
    }
}
