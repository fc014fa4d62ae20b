//! Thin ownership wrappers around the Vulkan objects the renderer needs.
//!
//! Everything here follows one pattern: a constructor that fills out the
//! ash create-info and surfaces failures as [`RhiError`], an accessor for
//! the raw handle, and a `Drop` that destroys the object in the right
//! order. Modules are split by object kind, from instance bring-up down
//! to per-frame synchronization.

mod error;

pub mod command;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// The wrappers take and return raw `vk` types, so hand the module out too.
pub use ash::vk;
