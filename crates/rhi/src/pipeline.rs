//! Pipeline layout and graphics pipeline assembly.
//!
//! [`GraphicsPipelineBuilder`] gathers the two shader stages and the
//! fixed-function state, defaulting everything to what the triangle pass
//! needs. [`PipelineLayout`] is created separately because it outlives the
//! builder and could be shared across pipelines.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Resource interface of a pipeline: descriptor set layouts plus push
/// constant ranges. The triangle pass passes empty slices for both.
pub struct PipelineLayout {
    device: Arc<Device>,
    handle: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(
        device: Arc<Device>,
        set_layouts: &[vk::DescriptorSetLayout],
        push_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_ranges);
        let handle = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Pipeline layout created ({} set layout(s), {} push constant range(s))",
            set_layouts.len(),
            push_ranges.len()
        );

        Ok(Self { device, handle })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline_layout(self.handle, None) };
        debug!("Pipeline layout released");
    }
}

/// A compiled graphics pipeline. Immutable once created.
pub struct Pipeline {
    device: Arc<Device>,
    handle: vk::Pipeline,
}

impl Pipeline {
    fn from_create_info(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        // On failure ash hands back (pipelines, error); for a batch of one
        // only the error matters.
        let batch = [*create_info];
        let cache = vk::PipelineCache::null();
        let compiled = unsafe { device.handle().create_graphics_pipelines(cache, &batch, None) };
        let handle = compiled.map_err(|(_, code)| code)?[0];

        info!("Graphics pipeline created");

        Ok(Self { device, handle })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_pipeline(self.handle, None) };
        info!("Graphics pipeline destroyed");
    }
}

/// Assembles the state for a graphics pipeline.
///
/// The vertex shader, fragment shader, and render pass must be set; the
/// rest defaults to the triangle pass configuration: no vertex input,
/// triangle-list topology, fill mode, back-face culling with clockwise
/// front faces, one sample, blending off with a full RGBA write mask, and
/// dynamic viewport/scissor.
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    render_pass: Option<vk::RenderPass>,
    subpass: u32,
    topology: vk::PrimitiveTopology,
    polygon: vk::PolygonMode,
    cull: vk::CullModeFlags,
    front: vk::FrontFace,
    line_width: f32,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            render_pass: None,
            subpass: 0,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon: vk::PolygonMode::FILL,
            cull: vk::CullModeFlags::BACK,
            front: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
        }
    }

    /// Sets the vertex stage. Required.
    pub fn vertex_shader(mut self, stage: &'a Shader) -> Self {
        self.vertex_shader = Some(stage);
        self
    }

    /// Sets the fragment stage. Required.
    pub fn fragment_shader(mut self, stage: &'a Shader) -> Self {
        self.fragment_shader = Some(stage);
        self
    }

    /// Sets the render pass the pipeline executes within. Required.
    pub fn render_pass(mut self, pass: vk::RenderPass) -> Self {
        self.render_pass = Some(pass);
        self
    }

    /// Selects a subpass other than the first.
    pub fn subpass(mut self, index: u32) -> Self {
        self.subpass = index;
        self
    }

    pub fn topology(mut self, value: vk::PrimitiveTopology) -> Self {
        self.topology = value;
        self
    }

    pub fn polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.polygon = mode;
        self
    }

    pub fn cull_mode(mut self, mode: vk::CullModeFlags) -> Self {
        self.cull = mode;
        self
    }

    pub fn front_face(mut self, face: vk::FrontFace) -> Self {
        self.front = face;
        self
    }

    pub fn line_width(mut self, value: f32) -> Self {
        self.line_width = value;
        self
    }

    /// Creates the pipeline.
    ///
    /// # Errors
    ///
    /// Fails with a pipeline error when a required field was never set, or
    /// with the driver's error when creation itself fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        let Some(vert) = self.vertex_shader else {
            return Err(RhiError::PipelineError("Vertex shader is required".into()));
        };
        let Some(frag) = self.fragment_shader else {
            return Err(RhiError::PipelineError("Fragment shader is required".into()));
        };
        let Some(pass) = self.render_pass else {
            return Err(RhiError::PipelineError("Render pass is required".into()));
        };

        let stages = [vert.stage_create_info(), frag.stage_create_info()];

        // No bindings or attributes; the vertex shader generates positions.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only their counts are baked in.
        let viewports = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let raster = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(self.polygon)
            .cull_mode(self.cull)
            .front_face(self.front)
            .line_width(self.line_width)
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .depth_bias_enable(false);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        // One color attachment, blending off, all channels written.
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];

        let blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamics = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamics);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewports)
            .rasterization_state(&raster)
            .multisample_state(&multisample)
            .color_blend_state(&blend)
            .dynamic_state(&dynamic)
            .layout(layout.handle())
            .render_pass(pass)
            .subpass(self.subpass);

        Pipeline::from_create_info(device, &create_info)
    }
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_the_triangle_pass() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert!(builder.render_pass.is_none());
        assert_eq!(builder.subpass, 0);
        assert_eq!(builder.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(builder.polygon, vk::PolygonMode::FILL);
        assert_eq!(builder.cull, vk::CullModeFlags::BACK);
        assert_eq!(builder.front, vk::FrontFace::CLOCKWISE);
        assert_eq!(builder.line_width, 1.0);
    }

    #[test]
    fn test_builder_setters_override_defaults() {
        let builder = GraphicsPipelineBuilder::new()
            .render_pass(vk::RenderPass::null())
            .subpass(1)
            .topology(vk::PrimitiveTopology::LINE_LIST)
            .polygon_mode(vk::PolygonMode::LINE)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(2.0);

        assert!(builder.render_pass.is_some());
        assert_eq!(builder.subpass, 1);
        assert_eq!(builder.topology, vk::PrimitiveTopology::LINE_LIST);
        assert_eq!(builder.polygon, vk::PolygonMode::LINE);
        assert_eq!(builder.cull, vk::CullModeFlags::NONE);
        assert_eq!(builder.front, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(builder.line_width, 2.0);
    }
}
