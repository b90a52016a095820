//! Error types for the RHI layer.

use ash::vk;
use thiserror::Error;

/// Errors that can occur in the RHI layer.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Vulkan library loading error
    #[error("Failed to load Vulkan library: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// No device memory type satisfies the requested filter and properties
    #[error(
        "No suitable memory type: type_filter={type_filter:#b}, properties={properties:?}"
    )]
    NoSuitableMemoryType {
        /// Memory type bits from the resource's requirements.
        type_filter: u32,
        /// Property flags the caller required.
        properties: vk::MemoryPropertyFlags,
    },

    /// Shader loading or creation error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface-related error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain-related error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Texture upload error
    #[error("Texture error: {0}")]
    TextureError(String),

    /// Invalid handle or state
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = Result<T, RhiError>;
