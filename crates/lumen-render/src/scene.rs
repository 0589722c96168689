//! Per-frame scene state: camera, model transform and uniform upload.

use ash::vk;
use glam::Mat4;
use lumen_core::Extent;
use lumen_gpu::GpuContext;

use crate::backend::FrameState;
use crate::camera::{default_model_matrix, Camera, UniformBufferObject};
use crate::error::Result;
use crate::uniforms::UniformBuffers;

/// Camera plus the uniform buffers it is written into.
pub struct Scene {
    pub camera: Camera,
    pub model: Mat4,
    uniforms: UniformBuffers,
}

impl Scene {
    pub fn new(uniforms: UniformBuffers) -> Self {
        Self {
            camera: Camera::default(),
            model: default_model_matrix(),
            uniforms,
        }
    }

    pub fn uniforms(&self) -> &UniformBuffers {
        &self.uniforms
    }

    /// Uniform contents for a target of the given size.
    pub fn uniform_object(&self, extent: vk::Extent2D) -> UniformBufferObject {
        let aspect = Extent::new(extent.width, extent.height).aspect_ratio();
        UniformBufferObject::new(self.model, &self.camera, aspect)
    }

    pub fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        self.uniforms.destroy(gpu)
    }
}

impl FrameState for Scene {
    fn update(&mut self, slot: usize, extent: vk::Extent2D) -> Result<()> {
        let ubo = self.uniform_object(extent);
        self.uniforms.write(slot, &ubo)
    }
}
