//! Draw list planning and command recording.
//!
//! Draws are planned on the CPU before any command is recorded: the draw
//! list is sorted by pipeline, then material, then mesh, and each entry
//! notes which bindings actually change. Recording then walks the plan and
//! only issues the state changes the plan asked for.

use ash::vk::{self, Handle};
use aurora_rhi::command::CommandBuffer;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Everything needed to record one indexed draw.
#[derive(Clone, Copy)]
pub struct DrawItem {
    /// Graphics pipeline to draw with.
    pub pipeline: vk::Pipeline,
    /// Vertex buffer; also identifies the mesh for state sorting.
    pub vertex_buffer: vk::Buffer,
    /// Index buffer with `u32` indices.
    pub index_buffer: vk::Buffer,
    /// Number of indices to draw.
    pub index_count: u32,
    /// Material descriptor set bound at set 1.
    pub material_set: vk::DescriptorSet,
    /// Model matrix pushed as a constant.
    pub transform: Mat4,
    /// Base color factor pushed as a constant.
    pub base_color: Vec4,
}

/// Push constant block shared by all pipelines.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PushConstants {
    /// Model matrix.
    pub model: Mat4,
    /// Base color factor.
    pub base_color: Vec4,
}

impl PushConstants {
    /// Size of this block in bytes. Fits in the 128 byte minimum that
    /// Vulkan guarantees for push constants.
    pub const SIZE: u32 = size_of::<Self>() as u32;
}

/// Shader stages that read the push constant block.
///
/// Must match the range the pipeline layout is created with.
pub fn push_constant_stages() -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
}

/// One planned draw: the index of its [`DrawItem`] plus which state has to
/// be bound before the draw is issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedDraw {
    /// Index into the draw item slice passed to [`plan_draws`].
    pub item: usize,
    /// Whether the pipeline differs from the previous draw.
    pub bind_pipeline: bool,
    /// Whether the material descriptor set must be (re)bound.
    pub bind_material: bool,
    /// Whether the vertex and index buffers must be bound.
    pub bind_mesh: bool,
}

/// Orders draws to minimize state changes.
///
/// The returned plan visits every item exactly once, grouped by pipeline,
/// then material, then vertex buffer. Sorting is stable, so items with
/// identical state keep their submission order.
pub fn plan_draws(items: &[DrawItem]) -> Vec<PlannedDraw> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by_key(|&i| {
        (
            items[i].pipeline.as_raw(),
            items[i].material_set.as_raw(),
            items[i].vertex_buffer.as_raw(),
        )
    });

    let mut plan = Vec::with_capacity(items.len());
    let mut last_pipeline = vk::Pipeline::null();
    let mut last_material = vk::DescriptorSet::null();
    let mut last_vertex_buffer = vk::Buffer::null();

    for index in order {
        let item = &items[index];
        let bind_pipeline = item.pipeline != last_pipeline;
        // Descriptor bindings are not guaranteed to survive a pipeline
        // switch, so a new pipeline forces the material to rebind.
        let bind_material = bind_pipeline || item.material_set != last_material;
        let bind_mesh = item.vertex_buffer != last_vertex_buffer;

        plan.push(PlannedDraw {
            item: index,
            bind_pipeline,
            bind_material,
            bind_mesh,
        });

        last_pipeline = item.pipeline;
        last_material = item.material_set;
        last_vertex_buffer = item.vertex_buffer;
    }

    plan
}

/// Records the planned draws into a command buffer.
///
/// The command buffer must be inside a render pass with viewport and
/// scissor already set, and the camera descriptor set bound at set 0.
pub fn record_draws(
    cmd: &CommandBuffer,
    layout: vk::PipelineLayout,
    items: &[DrawItem],
    plan: &[PlannedDraw],
) {
    for planned in plan {
        let item = &items[planned.item];

        if planned.bind_pipeline {
            cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, item.pipeline);
        }
        if planned.bind_material {
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                1,
                &[item.material_set],
                &[],
            );
        }
        if planned.bind_mesh {
            cmd.bind_vertex_buffers(0, &[item.vertex_buffer], &[0]);
            cmd.bind_index_buffer(item.index_buffer, 0, vk::IndexType::UINT32);
        }

        let push = PushConstants {
            model: item.transform,
            base_color: item.base_color,
        };
        cmd.push_constants(layout, push_constant_stages(), 0, &push);
        cmd.draw_indexed(item.index_count, 1, 0, 0, 0);
    }
}

/// Records extra draw commands after the scene geometry.
///
/// The renderer invokes the overlay once per frame with the command
/// buffer still inside the active render pass, after all scene draws.
/// Implementations manage their own pipelines and resources; the only
/// coupling is this call.
pub trait Overlay {
    /// Records the overlay's draw commands.
    fn record(&mut self, cmd: &CommandBuffer);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pipeline: u64, vertex_buffer: u64, material_set: u64) -> DrawItem {
        DrawItem {
            pipeline: vk::Pipeline::from_raw(pipeline),
            vertex_buffer: vk::Buffer::from_raw(vertex_buffer),
            index_buffer: vk::Buffer::from_raw(vertex_buffer + 1),
            index_count: 3,
            material_set: vk::DescriptorSet::from_raw(material_set),
            transform: Mat4::IDENTITY,
            base_color: Vec4::ONE,
        }
    }

    #[test]
    fn test_push_constants_fit_128_byte_minimum() {
        // Mat4 + Vec4; 128 is the smallest maxPushConstantsSize Vulkan permits.
        assert_eq!(PushConstants::SIZE, 80);
        assert!(PushConstants::SIZE <= 128);
    }

    #[test]
    fn test_empty_draw_list_plans_nothing() {
        assert!(plan_draws(&[]).is_empty());
    }

    #[test]
    fn test_first_draw_binds_everything() {
        let items = [item(1, 10, 100)];
        let plan = plan_draws(&items);

        assert_eq!(
            plan,
            vec![PlannedDraw {
                item: 0,
                bind_pipeline: true,
                bind_material: true,
                bind_mesh: true,
            }]
        );
    }

    #[test]
    fn test_shared_pipeline_binds_once() {
        // Two meshes drawn with the same pipeline and material
        let items = [item(1, 10, 100), item(1, 11, 100)];
        let plan = plan_draws(&items);

        assert_eq!(plan.len(), 2);
        assert!(plan[0].bind_pipeline);
        assert!(!plan[1].bind_pipeline);
        assert!(!plan[1].bind_material);
        assert!(plan[1].bind_mesh);
    }

    #[test]
    fn test_repeated_mesh_needs_no_binds() {
        // The same mesh drawn twice with different transforms
        let items = [item(1, 10, 100), item(1, 10, 100)];
        let plan = plan_draws(&items);

        assert!(!plan[1].bind_pipeline);
        assert!(!plan[1].bind_material);
        assert!(!plan[1].bind_mesh);
    }

    #[test]
    fn test_interleaved_pipelines_are_grouped() {
        let items = [item(1, 10, 100), item(2, 12, 100), item(1, 11, 100)];
        let plan = plan_draws(&items);

        // Both pipeline-1 items come before the pipeline-2 item
        assert_eq!(plan[0].item, 0);
        assert_eq!(plan[1].item, 2);
        assert_eq!(plan[2].item, 1);

        let pipeline_binds = plan.iter().filter(|p| p.bind_pipeline).count();
        assert_eq!(pipeline_binds, 2);
    }

    #[test]
    fn test_pipeline_switch_rebinds_material() {
        // Same material set on both pipelines; the switch still rebinds it
        let items = [item(1, 10, 100), item(2, 10, 100)];
        let plan = plan_draws(&items);

        assert!(plan[1].bind_pipeline);
        assert!(plan[1].bind_material);
        // The vertex buffer is command buffer state and survives the switch
        assert!(!plan[1].bind_mesh);
    }

    #[test]
    fn test_material_change_within_pipeline() {
        let items = [item(1, 10, 100), item(1, 10, 200)];
        let plan = plan_draws(&items);

        assert!(!plan[1].bind_pipeline);
        assert!(plan[1].bind_material);
    }

    #[test]
    fn test_equal_state_preserves_submission_order() {
        let items = [item(1, 10, 100), item(1, 10, 100), item(1, 10, 100)];
        let plan = plan_draws(&items);

        let visited: Vec<usize> = plan.iter().map(|p| p.item).collect();
        assert_eq!(visited, vec![0, 1, 2]);
    }
}
