//! Model and mesh loading from glTF files.
//!
//! [`Model::load`] imports a `.gltf` or `.glb` file into CPU-side arrays
//! that the renderer uploads verbatim. The scene hierarchy is kept as a
//! flat node arena; [`Model::global_transform`] walks the parent chain to
//! produce world matrices.

use std::collections::HashSet;
use std::path::Path;

use glam::{Mat4, Vec3, Vec4};
use tracing::{debug, warn};

use crate::error::{AssetError, AssetResult};
use crate::material::MaterialData;

/// Vertex and index data for a single triangle primitive.
///
/// The loader guarantees that `normals`, `tex_coords`, and `colors` have
/// the same length as `positions`, filling in defaults for attributes the
/// file does not provide.
#[derive(Debug, Default)]
pub struct MeshData {
    /// Mesh name from the file, possibly empty.
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<[f32; 2]>,
    pub colors: Vec<Vec4>,
    /// Triangle list indices into the vertex arrays.
    pub indices: Vec<u32>,
    /// Index into [`Model::materials`], if the primitive has a material.
    pub material: Option<usize>,
}

/// A node in the scene hierarchy.
///
/// Nodes form an arena: `parent` and `children` are indices into
/// [`Model::nodes`]. A glTF mesh with multiple primitives produces one
/// [`MeshData`] per primitive, so a node may reference several meshes.
#[derive(Debug, Default)]
pub struct Node {
    /// Node name from the file, possibly empty.
    pub name: String,
    /// Parent node index, or `None` for root nodes.
    pub parent: Option<usize>,
    /// Child node indices.
    pub children: Vec<usize>,
    /// Transform relative to the parent node.
    pub transform: Mat4,
    /// Indices into [`Model::meshes`] attached to this node.
    pub meshes: Vec<usize>,
}

/// A model containing meshes, materials, and the node hierarchy.
#[derive(Debug, Default)]
pub struct Model {
    /// Meshes in this model, one per triangle primitive.
    pub meshes: Vec<MeshData>,
    /// Materials referenced by the meshes.
    pub materials: Vec<MaterialData>,
    /// Scene nodes in arena form.
    pub nodes: Vec<Node>,
    /// Indices of nodes without a parent.
    pub roots: Vec<usize>,
    /// Axis-aligned bounding box minimum, in model space.
    pub aabb_min: Vec3,
    /// Axis-aligned bounding box maximum, in model space.
    pub aabb_max: Vec3,
}

impl Model {
    /// Loads a model from a glTF file.
    ///
    /// Non-triangle primitives are skipped with a warning. Missing
    /// normals, texture coordinates, and vertex colors are filled with
    /// defaults; missing indices become a sequential triangle list.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the .gltf or .glb file
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, fails to parse, has a
    /// triangle primitive without positions, or contains no meshes.
    pub fn load(path: &Path) -> AssetResult<Self> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        let (document, buffers, images) =
            gltf::import(path).map_err(|e| AssetError::GltfLoad {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut meshes = Vec::new();
        let mut aabb_min = Vec3::splat(f32::INFINITY);
        let mut aabb_max = Vec3::splat(f32::NEG_INFINITY);
        let mut used_names = HashSet::new();

        // One MeshData per triangle primitive; mesh_entries maps each glTF
        // mesh index to the MeshData indices it produced
        let mut mesh_entries: Vec<Vec<usize>> = vec![Vec::new(); document.meshes().len()];
        for mesh in document.meshes() {
            let primitive_count = mesh.primitives().len();
            for (k, primitive) in mesh.primitives().enumerate() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    warn!(
                        "Skipping primitive with mode {:?} in mesh '{}'",
                        primitive.mode(),
                        mesh.name().unwrap_or("")
                    );
                    continue;
                }

                let reader = primitive
                    .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

                let positions: Vec<Vec3> = reader
                    .read_positions()
                    .ok_or(AssetError::NoPositionData)?
                    .map(Vec3::from)
                    .collect();

                let mut normals: Vec<Vec3> = reader
                    .read_normals()
                    .map(|iter| iter.map(Vec3::from).collect())
                    .unwrap_or_default();
                normals.resize(positions.len(), Vec3::Z);

                let mut tex_coords: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|tc| tc.into_f32().collect())
                    .unwrap_or_default();
                tex_coords.resize(positions.len(), [0.0, 0.0]);

                let mut colors: Vec<Vec4> = reader
                    .read_colors(0)
                    .map(|c| c.into_rgba_f32().map(Vec4::from).collect())
                    .unwrap_or_default();
                colors.resize(positions.len(), Vec4::ONE);

                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|ix| ix.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                for position in &positions {
                    aabb_min = aabb_min.min(*position);
                    aabb_max = aabb_max.max(*position);
                }

                let base_name = mesh.name().unwrap_or("");
                let name = if base_name.is_empty() {
                    String::new()
                } else if primitive_count > 1 {
                    unique_name(&mut used_names, &format!("{}.{}", base_name, k))
                } else {
                    unique_name(&mut used_names, base_name)
                };

                debug!(
                    "Loaded primitive '{}': {} vertices, {} indices",
                    name,
                    positions.len(),
                    indices.len()
                );

                mesh_entries[mesh.index()].push(meshes.len());
                meshes.push(MeshData {
                    name,
                    positions,
                    normals,
                    tex_coords,
                    colors,
                    indices,
                    material: primitive.material().index(),
                });
            }
        }

        if meshes.is_empty() {
            return Err(AssetError::NoMeshes(path.to_path_buf()));
        }

        let materials = document
            .materials()
            .map(|material| MaterialData::from_gltf(&material, &images))
            .collect();

        let mut nodes: Vec<Node> = document
            .nodes()
            .map(|node| Node {
                name: node.name().unwrap_or("").to_string(),
                parent: None,
                children: Vec::new(),
                transform: Mat4::from_cols_array_2d(&node.transform().matrix()),
                meshes: node
                    .mesh()
                    .map(|mesh| mesh_entries[mesh.index()].clone())
                    .unwrap_or_default(),
            })
            .collect();

        for node in document.nodes() {
            let parent_index = node.index();
            for child in node.children() {
                let child_index = child.index();
                nodes[child_index].parent = Some(parent_index);
                nodes[parent_index].children.push(child_index);
            }
        }

        let roots = (0..nodes.len())
            .filter(|&i| nodes[i].parent.is_none())
            .collect();

        Ok(Self {
            meshes,
            materials,
            nodes,
            roots,
            aabb_min,
            aabb_max,
        })
    }

    /// Computes the world transform of a node by walking its parent chain.
    ///
    /// # Panics
    ///
    /// Panics if `node_index` is out of bounds.
    pub fn global_transform(&self, node_index: usize) -> Mat4 {
        let mut transform = self.nodes[node_index].transform;
        let mut current = self.nodes[node_index].parent;
        while let Some(parent_index) = current {
            let parent = &self.nodes[parent_index];
            transform = parent.transform * transform;
            current = parent.parent;
        }
        transform
    }

    /// Center of the bounding box in model space.
    pub fn center(&self) -> Vec3 {
        (self.aabb_min + self.aabb_max) * 0.5
    }

    /// Extent of the bounding box in model space.
    pub fn size(&self) -> Vec3 {
        self.aabb_max - self.aabb_min
    }

    /// Total vertex count across all meshes.
    pub fn total_vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.positions.len()).sum()
    }

    /// Total triangle count across all meshes.
    pub fn total_triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices.len() / 3).sum()
    }
}

/// Returns `candidate`, suffixed if needed so it has not been seen before.
fn unique_name(used: &mut HashSet<String>, candidate: &str) -> String {
    if used.insert(candidate.to_string()) {
        return candidate.to_string();
    }
    let mut suffix = 1;
    loop {
        let name = format!("{}.{}", candidate, suffix);
        if used.insert(name.clone()) {
            return name;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, y, z))
    }

    fn arena_model(nodes: Vec<Node>) -> Model {
        let roots = (0..nodes.len())
            .filter(|&i| nodes[i].parent.is_none())
            .collect();
        Model {
            nodes,
            roots,
            ..Model::default()
        }
    }

    #[test]
    fn test_global_transform_of_root_is_local() {
        let model = arena_model(vec![Node {
            transform: translation(1.0, 2.0, 3.0),
            ..Node::default()
        }]);

        let global = model.global_transform(0);
        assert_eq!(global, translation(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_global_transform_composes_parent_chain() {
        let model = arena_model(vec![
            Node {
                transform: translation(1.0, 0.0, 0.0),
                children: vec![1],
                ..Node::default()
            },
            Node {
                transform: translation(0.0, 2.0, 0.0),
                parent: Some(0),
                children: vec![2],
                ..Node::default()
            },
            Node {
                transform: translation(0.0, 0.0, 3.0),
                parent: Some(1),
                ..Node::default()
            },
        ]);

        let global = model.global_transform(2);
        let position = global.transform_point3(Vec3::ZERO);
        assert_eq!(position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_roots_are_parentless_nodes() {
        let model = arena_model(vec![
            Node::default(),
            Node {
                parent: Some(0),
                ..Node::default()
            },
            Node::default(),
        ]);

        assert_eq!(model.roots, vec![0, 2]);
    }

    #[test]
    fn test_center_and_size() {
        let model = Model {
            aabb_min: Vec3::new(-1.0, 0.0, -2.0),
            aabb_max: Vec3::new(3.0, 4.0, 2.0),
            ..Model::default()
        };

        assert_eq!(model.center(), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(model.size(), Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn test_total_counts_sum_over_meshes() {
        let model = Model {
            meshes: vec![
                MeshData {
                    positions: vec![Vec3::ZERO; 3],
                    indices: vec![0, 1, 2],
                    ..MeshData::default()
                },
                MeshData {
                    positions: vec![Vec3::ZERO; 4],
                    indices: vec![0, 1, 2, 2, 3, 0],
                    ..MeshData::default()
                },
            ],
            ..Model::default()
        };

        assert_eq!(model.total_vertex_count(), 7);
        assert_eq!(model.total_triangle_count(), 3);
    }

    #[test]
    fn test_unique_name_suffixes_duplicates() {
        let mut used = HashSet::new();
        assert_eq!(unique_name(&mut used, "Cube"), "Cube");
        assert_eq!(unique_name(&mut used, "Cube"), "Cube.1");
        assert_eq!(unique_name(&mut used, "Cube"), "Cube.2");
        assert_eq!(unique_name(&mut used, "Sphere"), "Sphere");
    }
}
