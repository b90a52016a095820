//! Scene components.
//!
//! This crate provides the camera and its first-person controls.

pub mod camera;

pub use camera::{Camera, FpsController};
