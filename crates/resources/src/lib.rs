//! Asset loading and management.
//!
//! This crate handles loading of external assets:
//! - glTF model loading with the scene hierarchy
//! - Image, texture, and cubemap loading
//! - Material definitions

pub mod error;
pub mod material;
pub mod model;
pub mod texture;

pub use error::{AssetError, AssetResult};
pub use material::MaterialData;
pub use model::{MeshData, Model, Node};
pub use texture::{CubemapData, TextureData};
