//! Command pool and command buffer recording.
//!
//! [`CommandPool`] allocates from a single queue family; [`CommandBuffer`]
//! exposes exactly the recording operations the frame loop needs (render
//! pass begin/end, pipeline bind, dynamic viewport/scissor, draw).

use std::slice;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::device::Device;
use crate::error::RhiResult;

/// Pool the frame's command buffer is allocated from.
///
/// Created with `RESET_COMMAND_BUFFER` so individual buffers can be reset
/// and re-recorded without touching the pool. Pools are externally
/// synchronized; this one is only ever driven by the render thread.
pub struct CommandPool {
    device: Arc<Device>,
    raw: vk::CommandPool,
    family_index: u32,
}

impl CommandPool {
    /// Creates a pool for buffers submitted to `family_index`.
    pub fn new(device: Arc<Device>, family_index: u32) -> RhiResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(family_index);

        let raw = unsafe { device.handle().create_command_pool(&create_info, None)? };
        info!("Command pool created (queue family {})", family_index);

        Ok(Self { device, raw, family_index })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.raw
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_command_pool(self.raw, None) };
        info!("Command pool destroyed (queue family {})", self.family_index);
    }
}

/// Recording interface over a pool-owned `vk::CommandBuffer`.
///
/// The handle is freed together with its pool, so this type has no `Drop`;
/// it must simply not outlive the [`CommandPool`] it came from.
pub struct CommandBuffer {
    device: Arc<Device>,
    raw: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Allocates one primary buffer from `pool`.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let raw = unsafe { device.handle().allocate_command_buffers(&alloc_info)? }[0];
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.raw
    }

    /// Starts recording.
    ///
    /// No usage flags: the buffer is reset and fully re-recorded every
    /// frame, so one-time-submit or simultaneous-use hints buy nothing.
    pub fn begin(&self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.raw, &begin_info)?
        };
        Ok(())
    }

    /// Finishes recording, leaving the buffer ready for submission.
    pub fn end(&self) -> RhiResult<()> {
        unsafe { self.device.handle().end_command_buffer(self.raw)? };
        Ok(())
    }

    /// Returns the buffer to its initial state for re-recording.
    pub fn reset(&self) -> RhiResult<()> {
        let flags = vk::CommandBufferResetFlags::empty();
        unsafe { self.device.handle().reset_command_buffer(self.raw, flags)? };
        Ok(())
    }

    /// Opens a render pass instance over the whole `extent`, clearing the
    /// color attachment to `clear_color`. Subpass contents are inline.
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        let device = self.device.handle();
        unsafe { device.cmd_begin_render_pass(self.raw, &begin_info, vk::SubpassContents::INLINE) };
    }

    pub fn end_render_pass(&self) {
        unsafe { self.device.handle().cmd_end_render_pass(self.raw) };
    }

    pub fn bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        let device = self.device.handle();
        unsafe { device.cmd_bind_pipeline(self.raw, bind_point, pipeline) };
    }

    /// Sets the dynamic viewport (slot 0).
    pub fn set_viewport(&self, viewport: &vk::Viewport) {
        let device = self.device.handle();
        unsafe { device.cmd_set_viewport(self.raw, 0, slice::from_ref(viewport)) };
    }

    /// Sets the dynamic scissor rectangle (slot 0).
    pub fn set_scissor(&self, scissor: &vk::Rect2D) {
        let device = self.device.handle();
        unsafe { device.cmd_set_scissor(self.raw, 0, slice::from_ref(scissor)) };
    }

    /// Records a non-indexed draw.
    pub fn draw(&self, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32) {
        let device = self.device.handle();
        unsafe { device.cmd_draw(self.raw, vertices, instances, first_vertex, first_instance) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_command_types_are_send() {
        assert_send::<CommandPool>();
        assert_send::<CommandBuffer>();
    }
}
