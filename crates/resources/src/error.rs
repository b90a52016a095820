//! Error types for asset loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for asset loading operations.
#[derive(Error, Debug)]
pub enum AssetError {
    /// Failed to load a glTF file.
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad {
        /// Path to the file that failed to load.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// glTF file contains no meshes.
    #[error("glTF file '{0}' contains no meshes")]
    NoMeshes(PathBuf),

    /// A mesh primitive has no position data.
    #[error("Mesh primitive has no position data")]
    NoPositionData,

    /// Texture pixel data uses a format the renderer cannot convert.
    #[error("Unsupported texture format: {0}")]
    UnsupportedTextureFormat(String),

    /// Cubemap faces do not share the same dimensions.
    #[error("Cubemap face '{face}' is {width}x{height}, expected {expected_width}x{expected_height}")]
    CubemapFaceMismatch {
        /// Name of the mismatched face.
        face: String,
        /// Actual width of the face.
        width: u32,
        /// Actual height of the face.
        height: u32,
        /// Expected width.
        expected_width: u32,
        /// Expected height.
        expected_height: u32,
    },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image loading error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
