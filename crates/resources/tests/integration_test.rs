//! Loads a real glTF file from disk and checks the invariants the renderer
//! relies on when uploading the result.

use std::path::Path;

use aurora_resources::Model;

const SAMPLE_PATH: &str = "../../assets/models/sample/scene.gltf";

/// Assets are not checked in; tests skip quietly when the sample is absent.
fn sample_model() -> Option<Model> {
    let path = Path::new(SAMPLE_PATH);
    if !path.exists() {
        eprintln!("skipping: no sample model at {}", path.display());
        return None;
    }
    Some(Model::load(path).expect("sample model should load"))
}

#[test]
fn meshes_have_equal_length_attributes() {
    let Some(model) = sample_model() else { return };

    assert!(!model.meshes.is_empty(), "sample has at least one mesh");
    for (i, mesh) in model.meshes.iter().enumerate() {
        let n = mesh.positions.len();
        assert!(n > 0, "mesh {i} has no positions");
        assert_eq!(mesh.normals.len(), n, "mesh {i}: normals length");
        assert_eq!(mesh.tex_coords.len(), n, "mesh {i}: tex_coords length");
        assert_eq!(mesh.colors.len(), n, "mesh {i}: colors length");
    }
}

#[test]
fn indices_form_in_bounds_triangles() {
    let Some(model) = sample_model() else { return };

    for (i, mesh) in model.meshes.iter().enumerate() {
        assert!(!mesh.indices.is_empty(), "mesh {i} has no indices");
        assert_eq!(mesh.indices.len() % 3, 0, "mesh {i}: partial triangle");

        let vertex_count = mesh.positions.len();
        let max = mesh.indices.iter().copied().max().unwrap() as usize;
        assert!(max < vertex_count, "mesh {i}: index {max} out of bounds");

        if let Some(material) = mesh.material {
            assert!(
                material < model.materials.len(),
                "mesh {i}: material {material} out of bounds"
            );
        }
    }
}

#[test]
fn node_graph_is_a_consistent_tree() {
    let Some(model) = sample_model() else { return };

    for (i, node) in model.nodes.iter().enumerate() {
        for &child in &node.children {
            assert_eq!(
                model.nodes[child].parent,
                Some(i),
                "child {child} does not point back at node {i}"
            );
        }
        for &mesh in &node.meshes {
            assert!(mesh < model.meshes.len(), "node {i}: mesh out of bounds");
        }
        assert!(
            model.global_transform(i).is_finite(),
            "node {i}: non-finite global transform"
        );
    }

    assert!(
        model.roots.iter().all(|&r| model.nodes[r].parent.is_none()),
        "a root node has a parent"
    );
}

#[test]
fn bounds_enclose_a_non_degenerate_volume() {
    let Some(model) = sample_model() else { return };

    assert!(model.aabb_min.x < model.aabb_max.x);
    assert!(model.aabb_min.y < model.aabb_max.y);
    assert!(model.aabb_min.z < model.aabb_max.z);

    eprintln!(
        "sample: {} meshes, {} vertices, {} triangles, {} materials, {} nodes ({} roots)",
        model.meshes.len(),
        model.total_vertex_count(),
        model.total_triangle_count(),
        model.materials.len(),
        model.nodes.len(),
        model.roots.len(),
    );
}
