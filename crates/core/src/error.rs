//! Workspace-level error type.
//!
//! The RHI crate carries its own error enum; this one covers everything
//! outside it, which at startup means configuration, logging, windowing,
//! and the surface plumbing that touches Vulkan before the wrappers do.

use thiserror::Error;

/// Failures reported by the non-RHI layers.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file existed but could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// Window creation failed, or a handle query against it did.
    #[error("Window error: {0}")]
    Window(String),

    /// A Vulkan call outside the RHI wrappers failed.
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// File access failed, typically while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
