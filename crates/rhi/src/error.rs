//! Error type shared by every RHI wrapper.

use thiserror::Error;

/// Errors produced while creating or driving Vulkan objects.
#[derive(Error, Debug)]
pub enum RhiError {
    /// A Vulkan call returned a failure code.
    #[error("Vulkan call failed: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Could not load the Vulkan library: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// Every enumerated GPU failed the suitability checks.
    #[error("No GPU meets the device requirements")]
    NoSuitableGpu,

    /// A GPU was requested by rank but the rank does not exist.
    #[error("GPU index {index} out of range: {count} device(s) available")]
    DeviceIndexOutOfRange { index: usize, count: usize },

    /// SPIR-V loading or shader module creation failed.
    #[error("Shader setup failed: {0}")]
    ShaderError(String),

    /// A surface query produced unusable results.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain creation or per-image setup failed.
    #[error("Swapchain setup failed: {0}")]
    SwapchainError(String),

    /// A handle that must exist at this point was missing.
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline state was incomplete or creation failed.
    #[error("Pipeline construction failed: {0}")]
    PipelineError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
