//! Windowing layer: winit ownership and Vulkan surface plumbing.
//!
//! [`Window`] wraps the winit window and answers the two questions the
//! rest of the stack asks of it: which instance extensions presentation
//! needs, and how large the drawable area is. [`Surface`] owns the
//! `vk::SurfaceKHR` created against that window.

mod window;

pub use window::{Surface, Window};

// Downstream crates drive the event loop themselves.
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
