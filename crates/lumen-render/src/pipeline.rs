//! The textured mesh pipeline.

use ash::vk;
use lumen_gpu::{DepthMode, GraphicsPipeline, GraphicsPipelineConfig};

use crate::error::Result;
use crate::mesh::Vertex;

/// Pipeline state for [`Vertex`] meshes drawn with the built-in shaders.
pub fn mesh_pipeline_config(render_pass: vk::RenderPass) -> GraphicsPipelineConfig {
    GraphicsPipelineConfig {
        vertex_shader: lumen_shaders::mesh_vertex_shader().to_vec(),
        fragment_shader: lumen_shaders::mesh_fragment_shader().to_vec(),
        vertex_bindings: vec![Vertex::binding_description()],
        vertex_attributes: Vertex::attribute_descriptions().to_vec(),
        cull_mode: vk::CullModeFlags::BACK,
        front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        depth: DepthMode::ReadWrite,
        render_pass,
        ..Default::default()
    }
}

/// Build the mesh pipeline against `render_pass`.
///
/// The pipeline uses dynamic viewport and scissor, so it is created once
/// and outlives every swapchain rebuild.
pub fn create_mesh_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    set_layout: vk::DescriptorSetLayout,
) -> Result<GraphicsPipeline> {
    let config = mesh_pipeline_config(render_pass);
    let pipeline = unsafe { GraphicsPipeline::new(device, &config, &[set_layout], &[])? };
    tracing::debug!("Created mesh pipeline");
    Ok(pipeline)
}
