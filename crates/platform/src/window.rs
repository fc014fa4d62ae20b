//! Window creation and Vulkan surface plumbing.
//!
//! [`Window`] wraps a winit window and answers the two questions the
//! renderer asks of it: which instance extensions does presenting to this
//! window require, and how many pixels does it currently cover. [`Surface`]
//! is the RAII handle for the `vk::SurfaceKHR` created against it.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use glimmer_core::{Error, Result};

/// Owns a `vk::SurfaceKHR` and destroys it on drop.
///
/// The instance the surface was created from must outlive this wrapper.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle. Valid only while this wrapper is alive.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for surface capability, format, and present mode queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: handle and loader both came from the same live instance,
        // and nothing else destroys this surface.
        unsafe { self.loader.destroy_surface(self.handle, None) };
        tracing::debug!("Surface destroyed");
    }
}

/// A fixed-size window for the renderer to present into.
///
/// Resizing is disabled at creation: the swapchain negotiated against this
/// window is never rebuilt, so the drawable area has to stay put for the
/// lifetime of the process.
pub struct Window {
    inner: Arc<WinitWindow>,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let size = PhysicalSize::new(width, height);
        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(size)
            .with_resizable(false);
        let inner = event_loop
            .create_window(attributes)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{} \"{}\"", width, height, title);

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Current drawable size in pixels.
    ///
    /// Feeds swapchain extent negotiation when the surface leaves the
    /// extent up to the application.
    pub fn drawable_size(&self) -> (u32, u32) {
        let size = self.inner.inner_size();
        (size.width, size.height)
    }

    pub fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    /// Instance extensions needed to present to this window.
    ///
    /// The returned pointers reference static, null-terminated strings
    /// owned by the Vulkan loader.
    ///
    /// # Errors
    ///
    /// Fails when the display handle is unavailable or the platform cannot
    /// report its surface extensions.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        let display = self
            .inner
            .display_handle()
            .map_err(|e| Error::Window(format!("Display handle unavailable: {}", e)))?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|e| Error::Vulkan(format!("Surface extension query failed: {}", e)))?;

        let names: Vec<_> = extensions
            .iter()
            // SAFETY: the loader hands out static, null-terminated names.
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect();
        tracing::debug!("Surface needs instance extensions: {:?}", names);

        Ok(extensions.to_vec())
    }

    /// Creates a Vulkan surface targeting this window.
    ///
    /// The instance must outlive the returned [`Surface`].
    ///
    /// # Errors
    ///
    /// Fails when a raw handle is unavailable or surface creation itself
    /// fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display = self
            .inner
            .display_handle()
            .map_err(|e| Error::Window(format!("Display handle unavailable: {}", e)))?;
        let window = self
            .inner
            .window_handle()
            .map_err(|e| Error::Window(format!("Window handle unavailable: {}", e)))?;

        // SAFETY: entry and instance are live, the raw handles come from the
        // live winit window, and Surface::drop is the sole destroy site.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
                .map_err(|e| Error::Vulkan(format!("Surface creation failed: {}", e)))?
        };
        let loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface { handle, loader })
    }
}
