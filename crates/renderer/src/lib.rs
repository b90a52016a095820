//! Main rendering pipeline.
//!
//! This crate orchestrates the rendering process:
//! - Frame pacing and synchronization
//! - Render pass recording and draw ordering
//! - Scene resource registration and deferred destruction

pub mod depth_buffer;
pub mod frame;
pub mod recorder;
pub mod registry;
pub mod renderer;
pub mod ubo;

pub use frame::{AcquireOutcome, FrameManager};
pub use recorder::Overlay;
pub use registry::{GpuMesh, Material, RenderObject, SceneRegistry};
pub use renderer::Renderer;

pub use aurora_rhi::sync::MAX_FRAMES_IN_FLIGHT;
