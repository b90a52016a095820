//! Pipeline layouts and graphics pipeline construction.
//!
//! [`GraphicsPipelineBuilder`] exposes the state this renderer actually
//! varies between pipelines: shaders, vertex layout, culling, depth
//! behavior, and blending. Everything else is fixed: triangle lists,
//! filled polygons, counter-clockwise front faces, one sample per pixel.
//! Viewport and scissor are always dynamic so pipelines survive window
//! resizes without a rebuild.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Descriptor set layouts and push constant ranges shared by pipelines.
///
/// Pipelines created against the same layout keep compatible descriptor
/// bindings across pipeline switches.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a pipeline layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Pipeline layout created ({} set layout(s), {} push range(s))",
            set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// An immutable compiled graphics pipeline.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Returns the pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Which triangle faces the rasterizer discards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Keep every face. Needed when geometry is viewed from inside.
    None,
    /// Discard front faces.
    Front,
    /// Discard back faces.
    #[default]
    Back,
}

impl CullMode {
    /// The equivalent Vulkan flag.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Depth test comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    /// Pass fragments closer than the stored depth.
    #[default]
    Less,
    /// Also pass fragments at exactly the stored depth. Used by the
    /// skybox, which renders at the far plane.
    LessOrEqual,
    /// Pass unconditionally.
    Always,
}

impl CompareOp {
    /// The equivalent Vulkan op.
    pub fn to_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

/// Builds graphics pipelines.
///
/// Defaults suit opaque scene geometry: back-face culling, depth test
/// and write on with [`CompareOp::Less`], no blending. The two shaders
/// and a render pass must be supplied.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: CullMode,
    depth_test: bool,
    depth_write: bool,
    depth_compare: CompareOp,
    alpha_blend: bool,
    render_pass: vk::RenderPass,
    subpass: u32,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a builder with opaque-geometry defaults.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            alpha_blend: false,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }

    /// Sets the vertex stage. Required.
    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    /// Sets the fragment stage. Required.
    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Adds a vertex buffer binding.
    pub fn vertex_binding(mut self, binding: vk::VertexInputBindingDescription) -> Self {
        self.vertex_bindings.push(binding);
        self
    }

    /// Adds attribute descriptions for the bound vertex buffers.
    pub fn vertex_attributes(mut self, attributes: &[vk::VertexInputAttributeDescription]) -> Self {
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    /// Sets face culling.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Toggles the depth test.
    pub fn depth_test(mut self, enable: bool) -> Self {
        self.depth_test = enable;
        self
    }

    /// Toggles depth writes.
    pub fn depth_write(mut self, enable: bool) -> Self {
        self.depth_write = enable;
        self
    }

    /// Sets the depth comparison.
    pub fn depth_compare(mut self, op: CompareOp) -> Self {
        self.depth_compare = op;
        self
    }

    /// Enables standard `src_alpha, one_minus_src_alpha` blending.
    pub fn alpha_blend(mut self, enable: bool) -> Self {
        self.alpha_blend = enable;
        self
    }

    /// Sets the render pass the pipeline draws in. Required.
    pub fn render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    /// Sets the subpass index.
    pub fn subpass(mut self, subpass: u32) -> Self {
        self.subpass = subpass;
        self
    }

    /// Compiles the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] when a shader or the render
    /// pass is missing, or when the driver rejects the pipeline.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let vertex_shader = self
            .vertex_shader
            .ok_or_else(|| RhiError::PipelineError("missing vertex shader".to_string()))?;
        let fragment_shader = self
            .fragment_shader
            .ok_or_else(|| RhiError::PipelineError("missing fragment shader".to_string()))?;
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError("missing render pass".to_string()));
        }

        let stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);

        // Counts only; the actual rects are set at record time.
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare.to_vk());

        let attachment = blend_attachment(self.alpha_blend);
        let attachments = [attachment];
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| result)?[0]
        };

        info!(
            "Graphics pipeline created (cull {:?}, depth {:?}, blend {})",
            self.cull_mode, self.depth_compare, self.alpha_blend
        );

        Ok(Pipeline { device, pipeline })
    }
}

/// Blend state for the single color attachment.
fn blend_attachment(alpha_blend: bool) -> vk::PipelineColorBlendAttachmentState {
    let state = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA);

    if alpha_blend {
        state
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
    } else {
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode_mapping() {
        let cases = [
            (CullMode::None, vk::CullModeFlags::NONE),
            (CullMode::Front, vk::CullModeFlags::FRONT),
            (CullMode::Back, vk::CullModeFlags::BACK),
        ];
        for (mode, flags) in cases {
            assert_eq!(mode.to_vk(), flags);
        }
    }

    #[test]
    fn test_compare_op_mapping() {
        let cases = [
            (CompareOp::Less, vk::CompareOp::LESS),
            (CompareOp::LessOrEqual, vk::CompareOp::LESS_OR_EQUAL),
            (CompareOp::Always, vk::CompareOp::ALWAYS),
        ];
        for (op, vk_op) in cases {
            assert_eq!(op.to_vk(), vk_op);
        }
    }

    #[test]
    fn test_builder_defaults_suit_opaque_geometry() {
        let builder = GraphicsPipelineBuilder::new();

        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert!(builder.depth_test);
        assert!(builder.depth_write);
        assert_eq!(builder.depth_compare, CompareOp::Less);
        assert!(!builder.alpha_blend);
        assert_eq!(builder.render_pass, vk::RenderPass::null());
    }

    #[test]
    fn test_builder_skybox_configuration() {
        let builder = GraphicsPipelineBuilder::new()
            .cull_mode(CullMode::None)
            .depth_write(false)
            .depth_compare(CompareOp::LessOrEqual);

        assert_eq!(builder.cull_mode, CullMode::None);
        assert!(builder.depth_test);
        assert!(!builder.depth_write);
        assert_eq!(builder.depth_compare, CompareOp::LessOrEqual);
    }

    #[test]
    fn test_opaque_blend_state_writes_all_channels() {
        let state = blend_attachment(false);
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn test_alpha_blend_state_uses_source_alpha() {
        let state = blend_attachment(true);
        assert_eq!(state.blend_enable, vk::TRUE);
        assert_eq!(state.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(
            state.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
    }
}
