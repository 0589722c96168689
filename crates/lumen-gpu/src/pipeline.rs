//! Graphics pipelines for a single-subpass render pass.

use std::ffi::CStr;

use ash::vk;

use crate::error::{GpuError, Result};

const ENTRY_POINT: &CStr = c"main";

/// How a pipeline uses the depth attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthMode {
    Disabled,
    /// Compare against depth but leave it untouched.
    ReadOnly,
    /// Nearer fragments win and overwrite depth.
    #[default]
    ReadWrite,
}

impl DepthMode {
    fn state(self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self != Self::Disabled)
            .depth_write_enable(self == Self::ReadWrite)
            .depth_compare_op(vk::CompareOp::LESS)
    }
}

/// Fixed-function and shader state for [`GraphicsPipeline::new`].
///
/// Viewport and scissor are never part of this: they are always dynamic.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_shader: Vec<u32>,
    pub fragment_shader: Vec<u32>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth: DepthMode,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_shader: Vec::new(),
            fragment_shader: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth: DepthMode::default(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
        }
    }
}

impl GraphicsPipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.render_pass == vk::RenderPass::null() {
            return Err(GpuError::Pipeline("no render pass set".into()));
        }
        if self.vertex_shader.is_empty() || self.fragment_shader.is_empty() {
            return Err(GpuError::Pipeline("both shader stages are required".into()));
        }
        Ok(())
    }
}

/// Vertex and fragment modules, alive only while the pipeline is built.
struct StageModules<'a> {
    device: &'a ash::Device,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
}

impl<'a> StageModules<'a> {
    unsafe fn load(device: &'a ash::Device, config: &GraphicsPipelineConfig) -> Result<Self> {
        let vertex = unsafe { shader_module(device, &config.vertex_shader, "vertex")? };
        match unsafe { shader_module(device, &config.fragment_shader, "fragment") } {
            Ok(fragment) => Ok(Self {
                device,
                vertex,
                fragment,
            }),
            Err(e) => {
                unsafe { device.destroy_shader_module(vertex, None) };
                Err(e)
            }
        }
    }

    fn stages(&self) -> [vk::PipelineShaderStageCreateInfo<'static>; 2] {
        [
            (vk::ShaderStageFlags::VERTEX, self.vertex),
            (vk::ShaderStageFlags::FRAGMENT, self.fragment),
        ]
        .map(|(stage, module)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(stage)
                .module(module)
                .name(ENTRY_POINT)
        })
    }
}

impl Drop for StageModules<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vertex, None);
            self.device.destroy_shader_module(self.fragment, None);
        }
    }
}

unsafe fn shader_module(
    device: &ash::Device,
    code: &[u32],
    stage: &'static str,
) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(code);
    unsafe { device.create_shader_module(&info, None) }.map_err(|e| GpuError::Shader {
        stage,
        reason: e.to_string(),
    })
}

/// A pipeline and the layout its descriptor sets bind against.
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// # Safety
    /// Shader code must be valid SPIR-V with a `main` entry point, and
    /// `config.render_pass` must outlive the pipeline.
    pub unsafe fn new(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constants: &[vk::PushConstantRange],
    ) -> Result<Self> {
        config.validate()?;
        let modules = unsafe { StageModules::load(device, config)? };

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constants);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

        match unsafe { build_pipeline(device, config, &modules, layout) } {
            Ok(pipeline) => {
                tracing::debug!(subpass = config.subpass, "graphics pipeline built");
                Ok(Self { pipeline, layout })
            }
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    /// # Safety
    /// No command buffer referencing the pipeline may still be pending.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

unsafe fn build_pipeline(
    device: &ash::Device,
    config: &GraphicsPipelineConfig,
    modules: &StageModules<'_>,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
    let stages = modules.stages();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&config.vertex_bindings)
        .vertex_attribute_descriptions(&config.vertex_attributes);
    let input_assembly =
        vk::PipelineInputAssemblyStateCreateInfo::default().topology(config.topology);
    let viewport = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);
    let raster = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(config.cull_mode)
        .front_face(config.front_face)
        .line_width(1.0);
    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);
    let depth = config.depth.state();
    let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)];
    let blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport)
        .rasterization_state(&raster)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth)
        .color_blend_state(&blend)
        .dynamic_state(&dynamic)
        .layout(layout)
        .render_pass(config.render_pass)
        .subpass(config.subpass);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
    }
    .map_err(|(_, e)| GpuError::Pipeline(e.to_string()))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GpuError::Pipeline("driver returned no pipeline".into()))
}
