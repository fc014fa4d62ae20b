//! Frame orchestration for the glimmer workspace.
//!
//! This crate ties the RHI building blocks into a renderer:
//! - Vulkan bootstrap from a window and configuration
//! - Per-frame command recording and submission
//! - Ordered teardown of the whole object graph

pub mod renderer;

pub use renderer::Renderer;
