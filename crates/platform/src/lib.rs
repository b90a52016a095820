//! Platform layer for the Aurora renderer.
//!
//! This crate provides the pieces the renderer consumes from the
//! operating system:
//! - Window management via winit
//! - Vulkan surface creation
//! - Keyboard and mouse state tracking

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window, required_surface_extensions};
