//! Render pass management.
//!
//! This module handles VkRenderPass creation for the forward pass that
//! draws directly into swapchain images.
//!
//! # Overview
//!
//! The [`RenderPass`] struct wraps a single-subpass render pass with one
//! color attachment. The attachment is cleared on load, stored on completion,
//! and transitioned from UNDEFINED to PRESENT_SRC_KHR so the image can be
//! handed straight to the presentation engine.
//!
//! A subpass dependency from EXTERNAL orders the color attachment output
//! stage against the swapchain image acquisition, so rendering does not
//! begin until the image is actually available.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use glimmer_rhi::device::Device;
//! use glimmer_rhi::render_pass::RenderPass;
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), glimmer_rhi::RhiError> {
//! let render_pass = RenderPass::new(device, vk::Format::B8G8R8A8_SRGB)?;
//! let handle = render_pass.handle();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan render pass wrapper.
///
/// Describes a single subpass rendering into one color attachment with the
/// swapchain image format. The wrapper owns the VkRenderPass handle and
/// destroys it on drop.
pub struct RenderPass {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan render pass handle.
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Creates a new render pass for the given color attachment format.
    ///
    /// The color attachment is:
    /// - Cleared at the start of the pass and stored at the end
    /// - Single-sampled
    /// - Transitioned from UNDEFINED to PRESENT_SRC_KHR
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `color_format` - Format of the swapchain images this pass renders to
    ///
    /// # Errors
    ///
    /// Returns an error if render pass creation fails.
    pub fn new(device: Arc<Device>, color_format: vk::Format) -> RhiResult<Self> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_attachment_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)];

        // Wait for the presentation engine to release the image before the
        // color attachment output stage writes to it
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let attachments = [color_attachment];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.handle().create_render_pass(&create_info, None)? };

        info!("Render pass created for format {:?}", color_format);

        Ok(Self {
            device,
            render_pass,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
        info!("Render pass destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pass_is_send_sync() {
        // Compile-time check that RenderPass is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderPass>();
    }
}
