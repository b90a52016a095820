//! Error types shared across the workspace.

use thiserror::Error;

/// Error type for platform and configuration failures.
///
/// GPU-level errors have their own type in the RHI crate; this enum
/// covers everything that happens before a device exists.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan calls made outside the RHI (surface creation).
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors.
    #[error("Window error: {0}")]
    Window(String),

    /// Configuration file errors.
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
