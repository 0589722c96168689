//! Descriptor set layouts, pools and batched set updates.

use ash::vk;

use crate::error::Result;

/// Descriptor types the renderer binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    UniformBuffer,
    CombinedImageSampler,
}

impl DescriptorKind {
    const fn vk(self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSpec {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: vk::ShaderStageFlags,
}

/// The bindings of one descriptor set layout, each a single descriptor.
#[derive(Debug, Clone, Default)]
pub struct SetLayoutSpec {
    bindings: Vec<BindingSpec>,
}

impl SetLayoutSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, binding: u32, kind: DescriptorKind, stages: vk::ShaderStageFlags) -> Self {
        self.bindings.push(BindingSpec {
            binding,
            kind,
            stages,
        });
        self
    }

    pub fn bindings(&self) -> &[BindingSpec] {
        &self.bindings
    }

    /// Descriptor counts a pool needs to hold `sets` sets of this layout,
    /// one entry per descriptor type.
    pub fn pool_sizes(&self, sets: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for spec in &self.bindings {
            let ty = spec.kind.vk();
            if let Some(size) = sizes.iter_mut().find(|s| s.ty == ty) {
                size.descriptor_count += sets;
            } else {
                sizes.push(vk::DescriptorPoolSize {
                    ty,
                    descriptor_count: sets,
                });
            }
        }
        sizes
    }

    /// # Safety
    /// `device` must be a live logical device.
    pub unsafe fn create_layout(&self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        let bindings: Vec<_> = self
            .bindings
            .iter()
            .map(|spec| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(spec.binding)
                    .descriptor_type(spec.kind.vk())
                    .descriptor_count(1)
                    .stage_flags(spec.stages)
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        Ok(unsafe { device.create_descriptor_set_layout(&info, None)? })
    }
}

/// A pool sized for a fixed number of sets of one layout. Sets are freed
/// together with the pool.
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// # Safety
    /// `device` must be a live logical device.
    pub unsafe fn sized_for(device: &ash::Device, spec: &SetLayoutSpec, sets: u32) -> Result<Self> {
        let sizes = spec.pool_sizes(sets);
        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(sets)
            .pool_sizes(&sizes);
        let pool = unsafe { device.create_descriptor_pool(&info, None)? };
        Ok(Self { pool })
    }

    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Allocate `count` sets that all use `layout`.
    ///
    /// # Safety
    /// `layout` must be the layout the pool was sized for.
    pub unsafe fn allocate(
        &self,
        device: &ash::Device,
        layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        Ok(unsafe { device.allocate_descriptor_sets(&info)? })
    }

    /// # Safety
    /// No pending command buffer may reference a set from this pool.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_descriptor_pool(self.pool, None) };
    }
}

/// Descriptor writes collected first and applied in one
/// `vkUpdateDescriptorSets` call.
#[derive(Default)]
pub struct SetWrites {
    buffers: Vec<(vk::DescriptorSet, u32, vk::DescriptorBufferInfo)>,
    images: Vec<(vk::DescriptorSet, u32, vk::DescriptorImageInfo)>,
}

impl SetWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the whole of `buffer` as a uniform buffer.
    pub fn uniform_buffer(&mut self, set: vk::DescriptorSet, binding: u32, buffer: vk::Buffer) {
        let info = vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .range(vk::WHOLE_SIZE);
        self.buffers.push((set, binding, info));
    }

    /// Bind an image that will be in `SHADER_READ_ONLY_OPTIMAL` when sampled.
    pub fn sampled_image(
        &mut self,
        set: vk::DescriptorSet,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
    ) {
        let info = vk::DescriptorImageInfo::default()
            .image_view(view)
            .sampler(sampler)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        self.images.push((set, binding, info));
    }

    pub fn len(&self) -> usize {
        self.buffers.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Safety
    /// Every set, buffer, view and sampler recorded must still be alive, and
    /// no pending command buffer may use the sets.
    pub unsafe fn apply(self, device: &ash::Device) {
        let buffer_writes = self.buffers.iter().map(|(set, binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(*set)
                .dst_binding(*binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(info))
        });
        let image_writes = self.images.iter().map(|(set, binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(*set)
                .dst_binding(*binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(std::slice::from_ref(info))
        });
        let writes: Vec<_> = buffer_writes.chain(image_writes).collect();
        if !writes.is_empty() {
            unsafe { device.update_descriptor_sets(&writes, &[]) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn mesh_layout() -> SetLayoutSpec {
        SetLayoutSpec::new()
            .with(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::VERTEX)
            .with(
                1,
                DescriptorKind::CombinedImageSampler,
                vk::ShaderStageFlags::FRAGMENT,
            )
    }

    #[test]
    fn each_type_gets_one_descriptor_per_set() {
        let sizes = mesh_layout().pool_sizes(2);
        assert_eq!(
            sizes
                .iter()
                .map(|s| (s.ty, s.descriptor_count))
                .collect::<Vec<_>>(),
            vec![
                (vk::DescriptorType::UNIFORM_BUFFER, 2),
                (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 2),
            ]
        );
    }

    #[test]
    fn bindings_of_the_same_type_share_a_pool_entry() {
        let spec = SetLayoutSpec::new()
            .with(0, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::VERTEX)
            .with(1, DescriptorKind::UniformBuffer, vk::ShaderStageFlags::FRAGMENT);
        let sizes = spec.pool_sizes(3);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 6);
    }

    #[test]
    fn writes_are_collected_per_binding() {
        let set = vk::DescriptorSet::from_raw(7);
        let mut writes = SetWrites::new();
        assert!(writes.is_empty());
        writes.uniform_buffer(set, 0, vk::Buffer::from_raw(1));
        writes.sampled_image(
            set,
            1,
            vk::ImageView::from_raw(2),
            vk::Sampler::from_raw(3),
        );
        assert_eq!(writes.len(), 2);
        assert_eq!(writes.buffers[0].2.range, vk::WHOLE_SIZE);
        assert_eq!(
            writes.images[0].2.image_layout,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }
}
