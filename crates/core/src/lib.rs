//! Core utilities for the Aurora renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Application configuration
//! - Frame timing

mod config;
mod error;
mod logging;
mod timer;

pub use config::{AppConfig, AssetConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
