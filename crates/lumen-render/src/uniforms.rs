//! Per-slot uniform buffers and the descriptor sets that bind them.

use std::mem::size_of;

use ash::vk;
use gpu_allocator::MemoryLocation;
use lumen_gpu::{DescriptorKind, DescriptorPool, GpuBuffer, GpuContext, SetLayoutSpec, SetWrites};

use crate::camera::UniformBufferObject;
use crate::error::{RenderError, Result};
use crate::texture::Texture;

/// Binding of the transform uniform buffer (vertex stage).
pub const UNIFORM_BINDING: u32 = 0;
/// Binding of the texture sampler (fragment stage).
pub const SAMPLER_BINDING: u32 = 1;

/// One persistently mapped uniform buffer per frame slot.
///
/// A slot's buffer may only be written after that slot's fence was
/// observed signaled.
pub struct UniformBuffers {
    buffers: Vec<GpuBuffer>,
}

impl UniformBuffers {
    pub fn new(gpu: &GpuContext, count: usize) -> Result<Self> {
        let mut allocator = gpu.allocator().lock();
        let mut buffers = Vec::with_capacity(count);
        for slot in 0..count {
            let buffer = allocator.create_buffer(
                size_of::<UniformBufferObject>() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("Uniforms {slot}"),
            );
            match buffer {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    for mut created in buffers {
                        allocator.free_buffer(&mut created)?;
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(Self { buffers })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffer(&self, slot: usize) -> Option<&GpuBuffer> {
        self.buffers.get(slot)
    }

    pub fn write(&self, slot: usize, ubo: &UniformBufferObject) -> Result<()> {
        let buffer = self
            .buffers
            .get(slot)
            .ok_or_else(|| RenderError::Config(format!("no uniform buffer for frame slot {slot}")))?;
        buffer.write(std::slice::from_ref(ubo))?;
        Ok(())
    }

    /// Free every buffer. The device must be idle.
    pub fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        let mut allocator = gpu.allocator().lock();
        for buffer in &mut self.buffers {
            allocator.free_buffer(buffer)?;
        }
        self.buffers.clear();
        Ok(())
    }
}

/// Layout, pool and one set per frame slot.
pub struct FrameDescriptors {
    layout: vk::DescriptorSetLayout,
    pool: Option<DescriptorPool>,
    sets: Vec<vk::DescriptorSet>,
}

impl FrameDescriptors {
    fn layout_spec() -> SetLayoutSpec {
        SetLayoutSpec::new()
            .with(
                UNIFORM_BINDING,
                DescriptorKind::UniformBuffer,
                vk::ShaderStageFlags::VERTEX,
            )
            .with(
                SAMPLER_BINDING,
                DescriptorKind::CombinedImageSampler,
                vk::ShaderStageFlags::FRAGMENT,
            )
    }

    /// Create the set layout alone; needed before the pipeline exists.
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let layout = unsafe { Self::layout_spec().create_layout(gpu.device())? };
        Ok(Self {
            layout,
            pool: None,
            sets: Vec::new(),
        })
    }

    /// Allocate one set per uniform buffer and point each at its buffer and
    /// the shared texture.
    pub fn allocate(
        &mut self,
        gpu: &GpuContext,
        uniforms: &UniformBuffers,
        texture: &Texture,
    ) -> Result<()> {
        if self.pool.is_some() {
            return Err(RenderError::Config(
                "descriptor sets already allocated".to_string(),
            ));
        }

        let count = uniforms.len() as u32;
        let device = gpu.device();
        let pool = unsafe { DescriptorPool::sized_for(device, &Self::layout_spec(), count)? };
        let sets = match unsafe { pool.allocate(device, self.layout, uniforms.len()) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { pool.destroy(device) };
                return Err(e.into());
            }
        };

        let mut writes = SetWrites::new();
        for (slot, &set) in sets.iter().enumerate() {
            if let Some(buffer) = uniforms.buffer(slot) {
                writes.uniform_buffer(set, UNIFORM_BINDING, buffer.buffer);
            }
            writes.sampled_image(set, SAMPLER_BINDING, texture.view, texture.sampler);
        }
        unsafe { writes.apply(device) };

        self.pool = Some(pool);
        self.sets = sets;
        Ok(())
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn sets(&self) -> &[vk::DescriptorSet] {
        &self.sets
    }

    /// Destroy the pool (freeing the sets) and the layout.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if let Some(pool) = self.pool.take() {
            pool.destroy(device);
        }
        self.sets.clear();
        device.destroy_descriptor_set_layout(self.layout, None);
        self.layout = vk::DescriptorSetLayout::null();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_binds_transform_then_texture() {
        let spec = FrameDescriptors::layout_spec();
        let bindings = spec.bindings();
        assert_eq!(bindings[0].binding, UNIFORM_BINDING);
        assert_eq!(bindings[0].kind, DescriptorKind::UniformBuffer);
        assert_eq!(bindings[0].stages, vk::ShaderStageFlags::VERTEX);
        assert_eq!(bindings[1].binding, SAMPLER_BINDING);
        assert_eq!(bindings[1].kind, DescriptorKind::CombinedImageSampler);
        assert_eq!(bindings[1].stages, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn pool_covers_one_set_per_slot() {
        let sizes = FrameDescriptors::layout_spec().pool_sizes(2);
        assert_eq!(sizes.len(), 2);
        for size in sizes {
            assert_eq!(size.descriptor_count, 2);
        }
    }

    #[test]
    fn uniform_object_is_three_matrices() {
        assert_eq!(size_of::<UniformBufferObject>(), 3 * 64);
    }
}
