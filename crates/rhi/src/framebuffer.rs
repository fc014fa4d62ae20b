//! Framebuffer management.
//!
//! This module handles VkFramebuffer creation. One framebuffer is created
//! per swapchain image view, binding that view as the single color
//! attachment of the render pass.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan framebuffer wrapper.
///
/// Binds one swapchain image view to a render pass at the swapchain extent.
/// The wrapper owns the VkFramebuffer handle and destroys it on drop.
pub struct Framebuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan framebuffer handle.
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Creates a new framebuffer for a swapchain image view.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - The render pass this framebuffer is compatible with
    /// * `image_view` - The swapchain image view used as color attachment
    /// * `extent` - The swapchain extent
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let attachments = [image_view];

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        debug!("Framebuffer created ({}x{})", extent.width, extent.height);

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
        debug!("Framebuffer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_is_send_sync() {
        // Compile-time check that Framebuffer is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Framebuffer>();
    }
}
