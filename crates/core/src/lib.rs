//! Shared foundation for the glimmer crates.
//!
//! Startup configuration, logging setup, frame timing, and the error type
//! the outer layers report through all live here, so that neither the
//! platform crate nor the renderer has to depend on the other for them.

mod config;
mod error;
mod frame_clock;
mod logging;

pub use config::{Config, DebugConfig, DeviceConfig, GraphicsConfig, WindowConfig};
pub use error::{Error, Result};
pub use frame_clock::FrameClock;
pub use logging::LogContext;
