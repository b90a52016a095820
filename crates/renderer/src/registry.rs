//! Name-keyed storage for scene GPU resources.
//!
//! Render objects reference meshes and materials by name instead of holding
//! GPU resources directly. Lookups that miss return `None` so the caller can
//! skip the draw instead of failing the frame.

use std::collections::HashMap;

use aurora_rhi::buffer::Buffer;
use aurora_rhi::texture::Texture;
use aurora_rhi::vk;
use glam::{Mat4, Vec4};
use tracing::{debug, warn};

/// Mesh buffers uploaded to GPU memory.
pub struct GpuMesh {
    /// Vertex buffer in device-local memory.
    pub vertex_buffer: Buffer,
    /// Index buffer in device-local memory (`u32` indices).
    pub index_buffer: Buffer,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Material parameters plus the descriptor set binding its texture.
pub struct Material {
    /// Base color factor multiplied with the sampled texture.
    pub base_color: Vec4,
    /// Set 1 descriptor set with the base color texture at binding 0.
    ///
    /// The set is allocated from the renderer's descriptor pool and freed
    /// with it; the registry does not own it.
    pub descriptor_set: vk::DescriptorSet,
}

/// One instance of a mesh placed in the world.
#[derive(Clone, Debug)]
pub struct RenderObject {
    /// Registry name of the mesh to draw.
    pub mesh: String,
    /// Registry name of the material to draw with.
    pub material: String,
    /// Model matrix.
    pub transform: Mat4,
}

/// Registry of GPU resources addressable by name.
///
/// Dropping the registry drops the contained buffers and textures, so it
/// must not be cleared while any in-flight frame still references them.
/// Use [`SceneRegistry::drain`] to hand resources to a deletion queue when
/// frames may still be in flight.
#[derive(Default)]
pub struct SceneRegistry {
    meshes: HashMap<String, GpuMesh>,
    materials: HashMap<String, Material>,
    textures: HashMap<String, Texture>,
}

impl SceneRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mesh under the given name, replacing any previous entry.
    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: GpuMesh) {
        let name = name.into();
        debug!("Registered mesh '{}' ({} indices)", name, mesh.index_count);
        if self.meshes.insert(name.clone(), mesh).is_some() {
            warn!("Mesh '{}' was replaced; old buffers dropped immediately", name);
        }
    }

    /// Inserts a material under the given name, replacing any previous entry.
    pub fn add_material(&mut self, name: impl Into<String>, material: Material) {
        let name = name.into();
        debug!("Registered material '{}'", name);
        self.materials.insert(name, material);
    }

    /// Inserts a texture under the given name, replacing any previous entry.
    pub fn add_texture(&mut self, name: impl Into<String>, texture: Texture) {
        let name = name.into();
        debug!("Registered texture '{}'", name);
        if self.textures.insert(name.clone(), texture).is_some() {
            warn!("Texture '{}' was replaced; old image dropped immediately", name);
        }
    }

    /// Looks up a mesh by name.
    pub fn mesh(&self, name: &str) -> Option<&GpuMesh> {
        self.meshes.get(name)
    }

    /// Looks up a material by name.
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Looks up a texture by name.
    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.get(name)
    }

    /// Removes a mesh, returning it so the caller controls when it drops.
    pub fn remove_mesh(&mut self, name: &str) -> Option<GpuMesh> {
        self.meshes.remove(name)
    }

    /// Removes a texture, returning it so the caller controls when it drops.
    pub fn remove_texture(&mut self, name: &str) -> Option<Texture> {
        self.textures.remove(name)
    }

    /// Number of registered meshes.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of registered materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Number of registered textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Empties the registry, returning every owned GPU resource.
    ///
    /// The returned vectors keep the resources alive until dropped, which
    /// lets the caller defer destruction until in-flight frames retire.
    pub fn drain(&mut self) -> (Vec<GpuMesh>, Vec<Texture>) {
        self.materials.clear();
        let meshes = self.meshes.drain().map(|(_, m)| m).collect();
        let textures = self.textures.drain().map(|(_, t)| t).collect();
        (meshes, textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_material() -> Material {
        Material {
            base_color: Vec4::ONE,
            descriptor_set: vk::DescriptorSet::null(),
        }
    }

    #[test]
    fn test_empty_registry_returns_none() {
        let registry = SceneRegistry::new();
        assert!(registry.mesh("missing").is_none());
        assert!(registry.material("missing").is_none());
        assert!(registry.texture("missing").is_none());
    }

    #[test]
    fn test_material_lookup_by_name() {
        let mut registry = SceneRegistry::new();
        registry.add_material("wood", test_material());

        assert!(registry.material("wood").is_some());
        assert!(registry.material("metal").is_none());
        assert_eq!(registry.material_count(), 1);
    }

    #[test]
    fn test_material_replacement_keeps_single_entry() {
        let mut registry = SceneRegistry::new();
        registry.add_material("wood", test_material());
        registry.add_material(
            "wood",
            Material {
                base_color: Vec4::new(0.5, 0.5, 0.5, 1.0),
                descriptor_set: vk::DescriptorSet::null(),
            },
        );

        assert_eq!(registry.material_count(), 1);
        let material = registry.material("wood").unwrap();
        assert_eq!(material.base_color, Vec4::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_render_object_references_by_name() {
        let object = RenderObject {
            mesh: "cube".to_string(),
            material: "wood".to_string(),
            transform: Mat4::IDENTITY,
        };

        let registry = SceneRegistry::new();
        // Both lookups miss; the caller is expected to skip this object
        assert!(registry.mesh(&object.mesh).is_none());
        assert!(registry.material(&object.material).is_none());
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = SceneRegistry::new();
        registry.add_material("a", test_material());
        registry.add_material("b", test_material());

        let (meshes, textures) = registry.drain();
        assert!(meshes.is_empty());
        assert!(textures.is_empty());
        assert_eq!(registry.material_count(), 0);
    }
}
