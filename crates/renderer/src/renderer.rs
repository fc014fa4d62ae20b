//! High-level renderer that owns the full Vulkan object graph.
//!
//! The [`Renderer`] wires the pieces from `glimmer-rhi` into a working frame
//! loop: instance, surface, device, swapchain, render pass, framebuffers,
//! graphics pipeline, command recording, and frame synchronization.
//!
//! # Frame Model
//!
//! Exactly one frame is in flight at a time. A single command buffer is
//! reset and re-recorded every frame, and a single [`FrameSync`] set gates
//! the CPU on the previous frame's completion. The swapchain is never
//! recreated: the window is fixed-size, so any acquire or present failure is
//! reported as a fatal error instead of triggering a rebuild.

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use glimmer_core::Config;
use glimmer_platform::{Surface, Window};
use glimmer_rhi::RhiError;
use glimmer_rhi::command::{CommandBuffer, CommandPool};
use glimmer_rhi::device::Device;
use glimmer_rhi::framebuffer::Framebuffer;
use glimmer_rhi::instance::Instance;
use glimmer_rhi::physical_device::select_physical_device;
use glimmer_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use glimmer_rhi::render_pass::RenderPass;
use glimmer_rhi::shader::{Shader, ShaderStage};
use glimmer_rhi::swapchain::Swapchain;
use glimmer_rhi::sync::FrameSync;

const VERTEX_SHADER_PATH: &str = "assets/shaders/triangle.vert.spv";
const FRAGMENT_SHADER_PATH: &str = "assets/shaders/triangle.frag.spv";

/// Vulkan renderer drawing a single triangle.
///
/// # Teardown Order
///
/// Vulkan requires child objects to be destroyed before their parents, so
/// every field sits in a [`ManuallyDrop`] and [`Drop`] releases them
/// explicitly, in reverse creation order:
///
/// 1. Frame synchronization objects
/// 2. Command buffer and pool
/// 3. Graphics pipeline and pipeline layout
/// 4. Framebuffers
/// 5. Render pass
/// 6. Swapchain
/// 7. Logical device
/// 8. Surface
/// 9. Instance
pub struct Renderer {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    swapchain: ManuallyDrop<Swapchain>,
    render_pass: ManuallyDrop<RenderPass>,
    framebuffers: Vec<Framebuffer>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    pipeline: ManuallyDrop<Pipeline>,
    command_pool: ManuallyDrop<CommandPool>,
    command_buffer: ManuallyDrop<CommandBuffer>,
    frame_sync: ManuallyDrop<FrameSync>,
    clear_color: [f32; 4],
}

impl Renderer {
    /// Creates the renderer for the given window.
    ///
    /// Builds the full Vulkan stack in order: instance (with the surface
    /// extensions the window reports), surface, physical-device selection
    /// driven by `config.device.index`, logical device, swapchain sized to
    /// the window's drawable size, render pass, one framebuffer per
    /// swapchain image view, the triangle pipeline, a command pool and
    /// buffer on the graphics family, and the frame synchronization set.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage of Vulkan initialization fails,
    /// including when no suitable GPU exists or `config.device.index` is out
    /// of range.
    pub fn new(window: &Window, config: &Config) -> Result<Self, RhiError> {
        let (width, height) = window.drawable_size();
        info!("Initializing renderer for a {}x{} surface", width, height);

        let surface_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(&surface_extensions, config.debug.validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|err| RhiError::SurfaceError(err.to_string()))?;

        let physical_device_info = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            config.device.index,
        )?;

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(device.clone(), render_pass.handle(), view, swapchain.extent())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (pipeline_layout, pipeline) = Self::create_pipeline(device.clone(), &render_pass)?;

        let command_pool = CommandPool::new(device.clone(), device.graphics_family())?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;

        let frame_sync = FrameSync::new(device.clone())?;

        info!(
            "Renderer initialized: {} swapchain image(s), {:?}",
            swapchain.image_count(),
            swapchain.format()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass: ManuallyDrop::new(render_pass),
            framebuffers,
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            pipeline: ManuallyDrop::new(pipeline),
            command_pool: ManuallyDrop::new(command_pool),
            command_buffer: ManuallyDrop::new(command_buffer),
            frame_sync: ManuallyDrop::new(frame_sync),
            clear_color: config.graphics.clear_color,
        })
    }

    /// Creates the triangle graphics pipeline.
    ///
    /// The shader modules are dropped when this function returns; Vulkan
    /// allows that once the pipeline has been created.
    fn create_pipeline(
        device: Arc<Device>,
        render_pass: &RenderPass,
    ) -> Result<(PipelineLayout, Pipeline), RhiError> {
        let vert = Shader::from_spirv_file(
            device.clone(),
            Path::new(VERTEX_SHADER_PATH),
            ShaderStage::Vertex,
            "main",
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            Path::new(FRAGMENT_SHADER_PATH),
            ShaderStage::Fragment,
            "main",
        )?;

        // No descriptor sets or push constants; the triangle is baked into
        // the vertex shader.
        let pipeline_layout = PipelineLayout::new(device.clone(), &[], &[])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .render_pass(render_pass.handle())
            .build(device, &pipeline_layout)?;

        info!("Triangle pipeline created");

        Ok((pipeline_layout, pipeline))
    }

    /// Renders one frame.
    ///
    /// Waits for the previous frame's fence, acquires a swapchain image,
    /// re-records the command buffer for that image, submits it to the
    /// graphics queue, and queues the image for presentation.
    ///
    /// # Errors
    ///
    /// Any Vulkan failure is fatal, including `ERROR_OUT_OF_DATE_KHR` from
    /// acquire or present: the fixed-size swapchain is never recreated. A
    /// suboptimal-but-successful acquire or present is logged and tolerated.
    pub fn render_frame(&mut self) -> Result<(), RhiError> {
        self.frame_sync.in_flight_fence().wait(u64::MAX)?;
        self.frame_sync.in_flight_fence().reset()?;

        let (image_index, suboptimal) = match self
            .swapchain
            .acquire_next_image(self.frame_sync.image_available_handle())
        {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to acquire swapchain image: {:?}", e);
                return Err(RhiError::VulkanError(e));
            }
        };
        if suboptimal {
            debug!("Acquired an image from a suboptimal swapchain");
        }

        self.record_commands(image_index)?;

        let waits = [self.frame_sync.image_available_handle()];
        let stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let buffers = [self.command_buffer.handle()];
        let signals = [self.frame_sync.render_finished_handle()];

        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&waits)
            .wait_dst_stage_mask(&stages)
            .command_buffers(&buffers)
            .signal_semaphores(&signals);

        // SAFETY: The command buffer has finished recording, the semaphores
        // and fence belong to this frame, and the fence was reset above.
        unsafe {
            self.device
                .submit_graphics(&[submit], self.frame_sync.in_flight_fence_handle())?;
        }

        match self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.frame_sync.render_finished_handle(),
        ) {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Swapchain is suboptimal for the surface");
                }
            }
            Err(e) => {
                error!("Failed to present swapchain image: {:?}", e);
                return Err(RhiError::VulkanError(e));
            }
        }

        Ok(())
    }

    /// Records the command buffer for the given swapchain image.
    fn record_commands(&self, image_index: u32) -> Result<(), RhiError> {
        let framebuffer = self.framebuffers.get(image_index as usize).ok_or_else(|| {
            RhiError::InvalidHandle(format!("No framebuffer for swapchain image {image_index}"))
        })?;

        self.command_buffer.reset()?;
        self.command_buffer.begin()?;

        let extent = self.swapchain.extent();

        self.command_buffer.begin_render_pass(
            self.render_pass.handle(),
            framebuffer.handle(),
            extent,
            self.clear_color,
        );

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.command_buffer.set_viewport(&viewport);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        self.command_buffer.set_scissor(&scissor);

        self.command_buffer
            .bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());

        // Three vertices, one instance; positions come from gl_VertexIndex.
        self.command_buffer.draw(3, 1, 0, 0);

        self.command_buffer.end_render_pass();
        self.command_buffer.end()?;

        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        // SAFETY: Each field is dropped exactly once, in reverse creation
        // order. Dropping the device Arc here releases the last strong
        // reference: every device-owning wrapper has already been dropped,
        // so the logical device is destroyed before the surface and
        // instance.
        unsafe {
            ManuallyDrop::drop(&mut self.frame_sync);
            ManuallyDrop::drop(&mut self.command_buffer);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            self.framebuffers.clear();
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer torn down");
    }
}
