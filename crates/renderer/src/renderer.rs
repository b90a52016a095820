//! Renderer orchestration.
//!
//! [`Renderer`] owns every GPU object and drives the frame loop: waiting on
//! the frame slot, acquiring a swapchain image, recording the render pass,
//! submitting, and presenting. Swapchain loss is handled inline by
//! recreating the size-dependent resources.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use aurora_core::AppConfig;
use aurora_platform::{
    InputState, KeyCode, MouseButton, Surface, Window, required_surface_extensions,
};
use aurora_resources::model::Model;
use aurora_resources::texture::CubemapData;
use aurora_rhi::buffer::{Buffer, BufferUsage};
use aurora_rhi::command::CommandPool;
use aurora_rhi::deletion::DeletionQueue;
use aurora_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout};
use aurora_rhi::device::Device;
use aurora_rhi::framebuffer::Framebuffers;
use aurora_rhi::instance::Instance;
use aurora_rhi::physical_device::select_physical_device;
use aurora_rhi::pipeline::{
    CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use aurora_rhi::renderpass::RenderPass;
use aurora_rhi::shader::{Shader, ShaderStage};
use aurora_rhi::swapchain::Swapchain;
use aurora_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use aurora_rhi::texture::Texture;
use aurora_rhi::vertex::Vertex;
use aurora_rhi::{RhiError, RhiResult, vk};
use aurora_scene::{Camera, FpsController};
use glam::{Vec2, Vec3, Vec4};
use tracing::{debug, error, info, trace, warn};

use crate::depth_buffer::{DEPTH_FORMAT, DepthBuffer};
use crate::frame::{AcquireOutcome, FrameManager};
use crate::recorder::{self, DrawItem, Overlay, PushConstants};
use crate::registry::{GpuMesh, Material, RenderObject, SceneRegistry};
use crate::ubo::CameraUbo;

/// Background color of the color attachment.
const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// Material descriptor sets reserved in the shared pool.
const MAX_MATERIAL_SETS: u32 = 64;

/// Registry name of the 1x1 white fallback texture and its material.
const FALLBACK_MATERIAL: &str = "fallback";

/// Registry name of the skybox mesh, texture, and material.
const SKYBOX_NAME: &str = "skybox";

/// Owns all GPU state and renders frames.
///
/// Fields wrapped in [`ManuallyDrop`] are destroyed explicitly in
/// [`Drop`] so teardown follows reverse dependency order regardless of
/// declaration order.
pub struct Renderer {
    width: u32,
    height: u32,
    framebuffer_resized: bool,

    camera: Camera,
    fps_controller: FpsController,

    render_objects: Vec<RenderObject>,
    registry: SceneRegistry,
    deletion_queue: DeletionQueue,
    overlay: Option<Box<dyn Overlay>>,
    max_anisotropy: f32,

    frame_manager: ManuallyDrop<FrameManager>,
    command_pool: ManuallyDrop<CommandPool>,
    upload_pool: ManuallyDrop<CommandPool>,

    skybox_pipeline: Option<Pipeline>,
    mesh_pipeline: ManuallyDrop<Pipeline>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,

    descriptor_pool: ManuallyDrop<DescriptorPool>,
    material_set_layout: ManuallyDrop<DescriptorSetLayout>,
    camera_set_layout: ManuallyDrop<DescriptorSetLayout>,

    framebuffers: ManuallyDrop<Framebuffers>,
    depth_buffer: ManuallyDrop<DepthBuffer>,
    render_pass: ManuallyDrop<RenderPass>,
    swapchain: ManuallyDrop<Swapchain>,

    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl Renderer {
    /// Creates the renderer and loads the scene assets named in `config`.
    ///
    /// Asset failures are logged and skipped; only GPU setup failures are
    /// fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if instance, device, swapchain, pipeline, or
    /// frame resource creation fails.
    pub fn new(window: &Window, config: &AppConfig) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("No display handle: {}", e)))?;
        let surface_extensions = required_surface_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let instance = Instance::new(config.validation_enabled(), &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let max_anisotropy = device_info.properties.limits.max_sampler_anisotropy;
        let device = Device::new(&instance, &device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;
        let extent = swapchain.extent();

        let render_pass = RenderPass::new(device.clone(), swapchain.format(), DEPTH_FORMAT)?;
        let depth_buffer = DepthBuffer::new(device.clone(), extent.width, extent.height)?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            render_pass.handle(),
            swapchain.image_views(),
            depth_buffer.view(),
            extent,
        )?;

        let camera_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[descriptor::uniform_buffer_binding(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let material_set_layout = DescriptorSetLayout::new(
            device.clone(),
            &[descriptor::combined_image_sampler_binding(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(MAX_FRAMES_IN_FLIGHT as u32),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(MAX_MATERIAL_SETS),
        ];
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            MAX_FRAMES_IN_FLIGHT as u32 + MAX_MATERIAL_SETS,
            &pool_sizes,
        )?;

        let push_constant_ranges = [vk::PushConstantRange::default()
            .stage_flags(recorder::push_constant_stages())
            .offset(0)
            .size(PushConstants::SIZE)];
        let set_layouts = [camera_set_layout.handle(), material_set_layout.handle()];
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &set_layouts, &push_constant_ranges)?;

        let shader_dir = config.assets.shader_dir.as_path();
        let mesh_pipeline = Self::create_mesh_pipeline(
            device.clone(),
            &pipeline_layout,
            render_pass.handle(),
            shader_dir,
        )?;
        // The skybox is optional; without its shaders the scene still renders
        let skybox_pipeline = if config.assets.skybox_dir.is_some() {
            match Self::create_skybox_pipeline(
                device.clone(),
                &pipeline_layout,
                render_pass.handle(),
                shader_dir,
            ) {
                Ok(pipeline) => Some(pipeline),
                Err(e) => {
                    warn!("Disabling skybox: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let upload_pool = CommandPool::new_transient(device.clone(), graphics_family)?;
        let frame_manager = FrameManager::new(
            device.clone(),
            &command_pool,
            &descriptor_pool,
            &camera_set_layout,
        )?;

        let mut camera = Camera::new();
        camera.set_perspective(
            45.0_f32.to_radians(),
            extent.width as f32 / extent.height.max(1) as f32,
            0.01,
            1000.0,
        );
        let fps_controller = FpsController::with_settings(3.0, 0.002);

        info!(
            "Renderer initialized: {}x{}, {} swapchain images, {} frames in flight",
            extent.width,
            extent.height,
            swapchain.image_count(),
            frame_manager.frames_in_flight()
        );

        let mut renderer = Self {
            width,
            height,
            framebuffer_resized: false,
            camera,
            fps_controller,
            render_objects: Vec::new(),
            registry: SceneRegistry::new(),
            deletion_queue: DeletionQueue::new(),
            overlay: None,
            max_anisotropy,
            frame_manager: ManuallyDrop::new(frame_manager),
            command_pool: ManuallyDrop::new(command_pool),
            upload_pool: ManuallyDrop::new(upload_pool),
            skybox_pipeline,
            mesh_pipeline: ManuallyDrop::new(mesh_pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            material_set_layout: ManuallyDrop::new(material_set_layout),
            camera_set_layout: ManuallyDrop::new(camera_set_layout),
            framebuffers: ManuallyDrop::new(framebuffers),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            render_pass: ManuallyDrop::new(render_pass),
            swapchain: ManuallyDrop::new(swapchain),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        };

        renderer.create_fallback_material()?;

        if let Some(model_path) = &config.assets.model {
            renderer.load_model(model_path);
        }
        if let Some(skybox_dir) = &config.assets.skybox_dir {
            renderer.load_skybox(skybox_dir);
        }

        Ok(renderer)
    }

    fn create_mesh_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("mesh.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("mesh.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let attributes = Vertex::attribute_descriptions();
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&attributes)
            .cull_mode(CullMode::Back)
            .render_pass(render_pass)
            .build(device, layout)?;

        info!("Mesh pipeline created");
        Ok(pipeline)
    }

    fn create_skybox_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        render_pass: vk::RenderPass,
        shader_dir: &Path,
    ) -> RhiResult<Pipeline> {
        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("skybox.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("skybox.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        // The cube is seen from the inside, so no culling. Depth writes are
        // off and the compare is LESS_OR_EQUAL because the vertex shader
        // pins the skybox to the far plane.
        let attributes = Vertex::attribute_descriptions();
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&attributes)
            .cull_mode(CullMode::None)
            .depth_write(false)
            .depth_compare(CompareOp::LessOrEqual)
            .render_pass(render_pass)
            .build(device, layout)?;

        info!("Skybox pipeline created");
        Ok(pipeline)
    }

    /// Creates the 1x1 white texture and the material that objects without
    /// a material fall back to.
    fn create_fallback_material(&mut self) -> RhiResult<()> {
        let texture =
            Texture::solid_color(Arc::clone(&self.device), &self.upload_pool, [255; 4])?;
        let descriptor_set = self.allocate_material_set(&texture)?;

        self.registry.add_texture(FALLBACK_MATERIAL, texture);
        self.registry.add_material(
            FALLBACK_MATERIAL,
            Material {
                base_color: Vec4::ONE,
                descriptor_set,
            },
        );
        Ok(())
    }

    /// Allocates a material descriptor set and points it at `texture`.
    fn allocate_material_set(&self, texture: &Texture) -> RhiResult<vk::DescriptorSet> {
        let sets = self
            .descriptor_pool
            .allocate(&[self.material_set_layout.handle()])?;
        let set = sets[0];

        let image_infos = [texture.descriptor_info()];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos);
        descriptor::update_descriptor_sets(&self.device, &[write]);

        Ok(set)
    }

    /// Loads a glTF model and places its meshes in the scene.
    ///
    /// Failures are logged and the model is skipped; the renderer keeps
    /// whatever scene content it already has.
    pub fn load_model(&mut self, path: &Path) {
        info!("Loading model: {}", path.display());

        let model = match Model::load(path) {
            Ok(model) => model,
            Err(e) => {
                warn!("Skipping model {}: {}", path.display(), e);
                return;
            }
        };

        info!(
            "Model loaded: {} meshes, {} vertices, {} triangles",
            model.meshes.len(),
            model.total_vertex_count(),
            model.total_triangle_count()
        );

        if let Err(e) = self.upload_model(&model) {
            warn!("Failed to upload model {}: {}", path.display(), e);
            return;
        }

        // Place the camera so the whole model is in view. The controller
        // starts with zero yaw and pitch, so the camera faces -Z.
        let center = model.center();
        let distance = model.size().length().max(1.0);
        self.camera.position = center + Vec3::new(0.0, 0.0, distance);
    }

    /// Uploads model data to the GPU and registers the resulting resources.
    fn upload_model(&mut self, model: &Model) -> RhiResult<()> {
        // One material (and texture, if present) per glTF material
        let mut material_names = Vec::with_capacity(model.materials.len());
        for (i, data) in model.materials.iter().enumerate() {
            let mut name = if data.name.is_empty() {
                format!("material{}", i)
            } else {
                data.name.clone()
            };
            // Qualify names that would clobber an existing registry entry
            if self.registry.material(&name).is_some() {
                name = format!("{}.{}", name, i);
            }

            let descriptor_set = match &data.base_color_texture {
                Some(tex) => {
                    let texture = Texture::from_rgba8(
                        Arc::clone(&self.device),
                        &self.upload_pool,
                        tex.width,
                        tex.height,
                        &tex.pixels,
                        Some(self.max_anisotropy),
                    )?;
                    let set = self.allocate_material_set(&texture)?;
                    self.registry.add_texture(name.clone(), texture);
                    set
                }
                None => match self.registry.material(FALLBACK_MATERIAL) {
                    Some(fallback) => fallback.descriptor_set,
                    None => return Err(RhiError::InvalidHandle(FALLBACK_MATERIAL.to_string())),
                },
            };

            self.registry.add_material(
                name.clone(),
                Material {
                    base_color: data.base_color,
                    descriptor_set,
                },
            );
            material_names.push(name);
        }

        // Upload each mesh through a staging buffer into device-local memory
        let mut mesh_names = Vec::with_capacity(model.meshes.len());
        for (i, mesh) in model.meshes.iter().enumerate() {
            let vertices: Vec<Vertex> = (0..mesh.positions.len())
                .map(|j| {
                    Vertex::new(
                        mesh.positions[j],
                        mesh.normals[j],
                        Vec2::from(mesh.tex_coords[j]),
                        mesh.colors[j],
                    )
                })
                .collect();

            let vertex_buffer = Buffer::new_with_data(
                Arc::clone(&self.device),
                &self.upload_pool,
                BufferUsage::Vertex,
                bytemuck::cast_slice(&vertices),
            )?;
            let index_buffer = Buffer::new_with_data(
                Arc::clone(&self.device),
                &self.upload_pool,
                BufferUsage::Index,
                bytemuck::cast_slice(&mesh.indices),
            )?;

            debug!(
                "Mesh {}: {} vertices, {} indices",
                i,
                vertices.len(),
                mesh.indices.len()
            );

            let name = if mesh.name.is_empty() {
                format!("mesh{}", i)
            } else {
                mesh.name.clone()
            };
            self.registry.add_mesh(
                name.clone(),
                GpuMesh {
                    vertex_buffer,
                    index_buffer,
                    index_count: mesh.indices.len() as u32,
                },
            );
            mesh_names.push((name, mesh.material));
        }

        // Instantiate one render object per mesh referenced by a node
        let mut placed = 0;
        for (node_index, node) in model.nodes.iter().enumerate() {
            if node.meshes.is_empty() {
                continue;
            }
            let transform = model.global_transform(node_index);
            for &mesh_index in &node.meshes {
                let (mesh_name, material_index) = &mesh_names[mesh_index];
                let material_name = material_index
                    .map(|m| material_names[m].clone())
                    .unwrap_or_else(|| FALLBACK_MATERIAL.to_string());

                self.render_objects.push(RenderObject {
                    mesh: mesh_name.clone(),
                    material: material_name,
                    transform,
                });
                placed += 1;
            }
        }

        // Some exporters produce meshes without any node referencing them
        if placed == 0 {
            for (mesh_name, material_index) in &mesh_names {
                self.render_objects.push(RenderObject {
                    mesh: mesh_name.clone(),
                    material: material_index
                        .map(|m| material_names[m].clone())
                        .unwrap_or_else(|| FALLBACK_MATERIAL.to_string()),
                    transform: glam::Mat4::IDENTITY,
                });
            }
        }

        info!("Placed {} render objects", self.render_objects.len());
        Ok(())
    }

    /// Loads six cubemap faces from a directory and sets up the skybox.
    pub fn load_skybox(&mut self, dir: &Path) {
        if self.skybox_pipeline.is_none() {
            return;
        }

        info!("Loading skybox from {}", dir.display());
        let cubemap = match CubemapData::load_dir(dir) {
            Ok(cubemap) => cubemap,
            Err(e) => {
                warn!("Skipping skybox {}: {}", dir.display(), e);
                return;
            }
        };

        if let Err(e) = self.upload_skybox(&cubemap) {
            warn!("Failed to upload skybox {}: {}", dir.display(), e);
        }
    }

    fn upload_skybox(&mut self, cubemap: &CubemapData) -> RhiResult<()> {
        let texture = Texture::cubemap_from_rgba8(
            Arc::clone(&self.device),
            &self.upload_pool,
            cubemap.width,
            cubemap.height,
            &cubemap.face_refs(),
        )?;
        let descriptor_set = self.allocate_material_set(&texture)?;

        let (vertices, indices) = unit_cube();
        let vertex_buffer = Buffer::new_with_data(
            Arc::clone(&self.device),
            &self.upload_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            Arc::clone(&self.device),
            &self.upload_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(&indices),
        )?;

        self.registry.add_texture(SKYBOX_NAME, texture);
        self.registry.add_material(
            SKYBOX_NAME,
            Material {
                base_color: Vec4::ONE,
                descriptor_set,
            },
        );
        self.registry.add_mesh(
            SKYBOX_NAME,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: indices.len() as u32,
            },
        );

        info!("Skybox ready ({}x{} faces)", cubemap.width, cubemap.height);
        Ok(())
    }

    /// Removes all scene content, deferring GPU destruction.
    ///
    /// In-flight frames may still reference the buffers and textures, so
    /// they are parked in the deletion queue and destroyed at the next
    /// device-idle point (swapchain recreation or shutdown).
    pub fn clear_scene(&mut self) {
        self.render_objects.clear();
        let (meshes, textures) = self.registry.drain();
        info!(
            "Clearing scene: deferring {} meshes and {} textures",
            meshes.len(),
            textures.len()
        );
        for mesh in meshes {
            self.deletion_queue.push(move || drop(mesh));
        }
        for texture in textures {
            self.deletion_queue.push(move || drop(texture));
        }
    }

    /// Notifies the renderer that the window size changed.
    ///
    /// Zero-sized (minimized) windows pause rendering; the swapchain is
    /// recreated on the next rendered frame otherwise.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;

        if width == 0 || height == 0 {
            debug!("Window minimized, pausing rendering");
            return;
        }

        debug!("Resize requested: {}x{}", width, height);
        self.framebuffer_resized = true;
        self.camera.set_aspect(width as f32 / height as f32);
    }

    /// Updates the camera from the current input state.
    pub fn update(&mut self, input: &InputState, delta_time: f32) {
        let (dx, dy) = input.mouse_delta();
        let is_pressed = input.is_mouse_pressed(MouseButton::Right);
        let just_pressed = input.is_mouse_just_pressed(MouseButton::Right);

        // Skip the first held frame so the accumulated delta from moving
        // the cursor onto the window does not jerk the camera
        if is_pressed && !just_pressed {
            let max_delta = 100.0;
            let dx = dx.clamp(-max_delta, max_delta);
            let dy = dy.clamp(-max_delta, max_delta);
            self.fps_controller.process_mouse_movement(dx, dy);
        }

        let forward = axis_input(input, KeyCode::KeyW, KeyCode::KeyS);
        let right = axis_input(input, KeyCode::KeyD, KeyCode::KeyA);
        let up = axis_input(input, KeyCode::KeyQ, KeyCode::KeyE);

        self.fps_controller.set_movement_input(forward, right, up);
        self.fps_controller.update_camera(&mut self.camera, delta_time);
    }

    /// Renders one frame.
    ///
    /// Swapchain out-of-date and suboptimal conditions are handled by
    /// recreating the swapchain; they are not surfaced as errors.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal GPU failures such as device loss.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            trace!("Skipping frame while minimized");
            return Ok(());
        }

        if self.framebuffer_resized {
            debug!("Resize requested, recreating swapchain before acquire");
            self.recreate_swapchain()?;
        }

        self.frame_manager.wait_for_frame()?;

        let outcome = self.frame_manager.acquire_image(&self.swapchain)?;
        if outcome == AcquireOutcome::OutOfDate {
            // The fence was not reset, so skipping the frame is safe
            self.recreate_swapchain()?;
            return Ok(());
        }

        self.frame_manager.begin_frame()?;

        let ubo = CameraUbo::new(
            self.camera.view_matrix(),
            self.camera.projection_matrix(),
            self.camera.position,
        );
        self.frame_manager.update_camera(&ubo)?;

        self.record_commands();

        self.frame_manager.end_frame()?;
        self.frame_manager.submit()?;
        let present_needs_recreate = self.frame_manager.present(&self.swapchain)?;
        self.frame_manager.next_frame();

        if present_needs_recreate || outcome == AcquireOutcome::Suboptimal {
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Records the render pass for the current frame.
    fn record_commands(&mut self) {
        let cmd = self.frame_manager.current_slot().command_buffer();
        let extent = self.swapchain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        cmd.begin_render_pass(
            self.render_pass.handle(),
            self.framebuffers.get(self.frame_manager.image_index() as usize),
            extent,
            &clear_values,
        );

        let viewport = vk::Viewport::default()
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);
        cmd.set_viewport(&viewport);

        let scissor = vk::Rect2D::default().extent(extent);
        cmd.set_scissor(&scissor);

        // Set 0 (camera) is shared by every pipeline in the pass
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline_layout.handle(),
            0,
            &[self.frame_manager.current_slot().descriptor_set()],
            &[],
        );

        let items = self.build_draw_items();
        let plan = recorder::plan_draws(&items);
        recorder::record_draws(cmd, self.pipeline_layout.handle(), &items, &plan);

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.record(cmd);
        }

        cmd.end_render_pass();
    }

    /// Resolves render objects against the registry into draw items.
    ///
    /// Objects referencing missing resources are logged and skipped so one
    /// bad asset cannot take down the frame.
    fn build_draw_items(&self) -> Vec<DrawItem> {
        let mut items = Vec::with_capacity(self.render_objects.len() + 1);

        if let Some(skybox_pipeline) = &self.skybox_pipeline {
            if let (Some(mesh), Some(material)) = (
                self.registry.mesh(SKYBOX_NAME),
                self.registry.material(SKYBOX_NAME),
            ) {
                items.push(DrawItem {
                    pipeline: skybox_pipeline.handle(),
                    vertex_buffer: mesh.vertex_buffer.handle(),
                    index_buffer: mesh.index_buffer.handle(),
                    index_count: mesh.index_count,
                    material_set: material.descriptor_set,
                    transform: glam::Mat4::IDENTITY,
                    base_color: material.base_color,
                });
            }
        }

        for object in &self.render_objects {
            let Some(mesh) = self.registry.mesh(&object.mesh) else {
                warn!("Skipping object: unknown mesh '{}'", object.mesh);
                continue;
            };
            let Some(material) = self.registry.material(&object.material) else {
                warn!("Skipping object: unknown material '{}'", object.material);
                continue;
            };

            items.push(DrawItem {
                pipeline: self.mesh_pipeline.handle(),
                vertex_buffer: mesh.vertex_buffer.handle(),
                index_buffer: mesh.index_buffer.handle(),
                index_count: mesh.index_count,
                material_set: material.descriptor_set,
                transform: object.transform,
                base_color: material.base_color,
            });
        }

        items
    }

    /// Recreates the swapchain and everything sized to it.
    ///
    /// Waits for all in-flight frames, then replaces the swapchain, depth
    /// buffer, framebuffers, and per-frame sync objects.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            debug!("Deferring swapchain recreation while minimized");
            return Ok(());
        }

        info!("Recreating swapchain at {}x{}", self.width, self.height);

        self.frame_manager.wait_for_all_frames()?;
        self.device.wait_idle()?;

        // Anything parked for deletion is safe to destroy now
        self.deletion_queue.flush();

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), self.width, self.height)?;
        let extent = self.swapchain.extent();

        // Build the replacements before dropping the old attachments so a
        // failure leaves the renderer in a destructible state
        let depth_buffer =
            DepthBuffer::new(Arc::clone(&self.device), extent.width, extent.height)?;
        let framebuffers = Framebuffers::new(
            Arc::clone(&self.device),
            self.render_pass.handle(),
            self.swapchain.image_views(),
            depth_buffer.view(),
            extent,
        )?;

        // SAFETY: Both fields are re-initialized immediately below.
        unsafe {
            ManuallyDrop::drop(&mut self.framebuffers);
            ManuallyDrop::drop(&mut self.depth_buffer);
        }
        self.depth_buffer = ManuallyDrop::new(depth_buffer);
        self.framebuffers = ManuallyDrop::new(framebuffers);

        self.frame_manager.reset_sync_objects()?;

        self.camera
            .set_aspect(extent.width as f32 / extent.height.max(1) as f32);
        self.framebuffer_resized = false;

        Ok(())
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the swapchain color format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Returns a reference to the camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Returns a mutable reference to the camera.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Returns the objects drawn each frame.
    pub fn render_objects(&self) -> &[RenderObject] {
        &self.render_objects
    }

    /// Returns mutable access to the draw list.
    ///
    /// Names must match registry entries or the object is skipped at
    /// record time.
    pub fn render_objects_mut(&mut self) -> &mut Vec<RenderObject> {
        &mut self.render_objects
    }

    /// Returns the GPU resource registry.
    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    /// Installs an overlay recorded after the scene each frame.
    pub fn set_overlay(&mut self, overlay: Box<dyn Overlay>) {
        self.overlay = Some(overlay);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        // Deferred resources are safe to destroy once the device is idle
        self.deletion_queue.flush();

        // Scene resources release their device references here
        self.overlay = None;
        self.render_objects.clear();
        let _ = self.registry.drain();
        self.skybox_pipeline = None;

        // SAFETY: Each field is dropped exactly once, in reverse dependency
        // order. The device Arc is released before the surface and instance
        // so the device is destroyed first.
        unsafe {
            ManuallyDrop::drop(&mut self.frame_manager);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.upload_pool);
            ManuallyDrop::drop(&mut self.mesh_pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.material_set_layout);
            ManuallyDrop::drop(&mut self.camera_set_layout);
            ManuallyDrop::drop(&mut self.framebuffers);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

/// Maps a positive/negative key pair onto a `-1.0..=1.0` axis.
fn axis_input(input: &InputState, positive: KeyCode, negative: KeyCode) -> f32 {
    if input.is_key_pressed(positive) {
        1.0
    } else if input.is_key_pressed(negative) {
        -1.0
    } else {
        0.0
    }
}

/// Unit cube centered at the origin, used for the skybox.
///
/// Culling is disabled for the skybox pipeline, so winding order does
/// not matter here.
fn unit_cube() -> (Vec<Vertex>, Vec<u32>) {
    let corners = [
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];

    let vertices = corners
        .iter()
        .map(|&p| Vertex::new(p, p.normalize(), Vec2::ZERO, Vec4::ONE))
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2,  2, 3, 0, // back
        4, 6, 5,  6, 4, 7, // front
        0, 3, 7,  7, 4, 0, // left
        1, 5, 6,  6, 2, 1, // right
        3, 2, 6,  6, 7, 3, // top
        0, 4, 5,  5, 1, 0, // bottom
    ];

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_cube_is_closed() {
        let (vertices, indices) = unit_cube();

        assert_eq!(vertices.len(), 8);
        // 6 faces, 2 triangles each
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_clear_color_is_opaque() {
        assert_eq!(CLEAR_COLOR[3], 1.0);
    }
}
