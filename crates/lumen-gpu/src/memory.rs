//! Buffer and image memory, backed by `gpu-allocator`.

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::{AllocatorDebugSettings, MemoryLocation};

use crate::command::{run_one_shot, CommandPool};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};

/// Owns the sub-allocator for every buffer and image the renderer creates.
///
/// Memory-type selection is left to `gpu-allocator`: callers only say where
/// the memory should live via [`MemoryLocation`].
pub struct GpuAllocator {
    inner: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl GpuAllocator {
    /// # Safety
    /// `instance`, `device` and `physical_device` must be valid and belong together.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let debug_settings = AllocatorDebugSettings {
            log_memory_information: cfg!(debug_assertions),
            log_leaks_on_shutdown: true,
            store_stack_traces: false,
            ..AllocatorDebugSettings::default()
        };
        let inner = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings,
            buffer_device_address: false,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })?;

        Ok(Self {
            inner: Some(inner),
            device,
        })
    }

    fn allocate(
        &mut self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState(format!("allocator shut down before {name}")))?;
        Ok(inner.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?)
    }

    fn release(&mut self, allocation: Option<Allocation>) -> Result<()> {
        match (allocation, self.inner.as_mut()) {
            (Some(allocation), Some(inner)) => Ok(inner.free(allocation)?),
            // Memory already returned by shutdown.
            _ => Ok(()),
        }
    }

    /// Create a buffer of `size` bytes and bind fresh memory to it.
    pub fn create_buffer(
        &mut self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuBuffer> {
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&info, None)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let bound = self
            .allocate(name, requirements, location, true)
            .and_then(|allocation| {
                unsafe {
                    self.device
                        .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
                }
                Ok(allocation)
            });
        match bound {
            Ok(allocation) => Ok(GpuBuffer {
                buffer,
                allocation: Some(allocation),
                size,
            }),
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                Err(e)
            }
        }
    }

    /// Return a buffer's memory and destroy the handle. Safe to call twice.
    pub fn free_buffer(&mut self, buffer: &mut GpuBuffer) -> Result<()> {
        self.release(buffer.allocation.take())?;
        if buffer.buffer != vk::Buffer::null() {
            unsafe { self.device.destroy_buffer(buffer.buffer, None) };
            buffer.buffer = vk::Buffer::null();
        }
        Ok(())
    }

    /// Create an optimal-tiling image described by `create_info` and bind memory to it.
    pub fn create_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuImage> {
        let image = unsafe { self.device.create_image(create_info, None)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let bound = self
            .allocate(name, requirements, location, false)
            .and_then(|allocation| {
                unsafe {
                    self.device
                        .bind_image_memory(image, allocation.memory(), allocation.offset())?;
                }
                Ok(allocation)
            });
        match bound {
            Ok(allocation) => Ok(GpuImage {
                image,
                allocation: Some(allocation),
                format: create_info.format,
                extent: create_info.extent,
            }),
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                Err(e)
            }
        }
    }

    /// Return an image's memory and destroy the handle. Safe to call twice.
    pub fn free_image(&mut self, image: &mut GpuImage) -> Result<()> {
        self.release(image.allocation.take())?;
        if image.image != vk::Image::null() {
            unsafe { self.device.destroy_image(image.image, None) };
            image.image = vk::Image::null();
        }
        Ok(())
    }

    /// Release every device memory block. Must run before the device is destroyed;
    /// allocations still outstanding are reported as leaks.
    pub fn shutdown(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("GPU allocator shut down");
        }
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub size: u64,
}

impl GpuBuffer {
    /// Host pointer to the start of the buffer, if its memory is mapped.
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        let ptr = self.allocation.as_ref()?.mapped_ptr()?;
        Some(ptr.as_ptr().cast())
    }

    /// Copy `data` to offset zero of a host-visible buffer.
    pub fn write<T: Pod>(&self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as u64 > self.size {
            return Err(GpuError::InvalidState(format!(
                "write of {} bytes into a {} byte buffer",
                bytes.len(),
                self.size
            )));
        }
        let dst = self
            .mapped_ptr()
            .ok_or_else(|| GpuError::InvalidState("buffer memory is not host visible".into()))?;
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        Ok(())
    }
}

pub struct GpuImage {
    pub image: vk::Image,
    pub allocation: Option<Allocation>,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
}

/// A host-visible `TRANSFER_SRC` buffer holding a copy of `data`.
pub fn create_staging_buffer<T: Pod>(gpu: &GpuContext, data: &[T], name: &str) -> Result<GpuBuffer> {
    let mut allocator = gpu.allocator().lock();
    let staging = allocator.create_buffer(
        std::mem::size_of_val(data) as u64,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuToGpu,
        name,
    )?;
    if let Err(e) = staging.write(data) {
        let mut staging = staging;
        allocator.free_buffer(&mut staging)?;
        return Err(e);
    }
    Ok(staging)
}

/// Copy `data` into a new `GpuOnly` buffer through a temporary staging buffer.
///
/// `TRANSFER_DST` is added to `usage`. Blocks until the graphics queue has
/// finished the copy.
pub fn create_device_local_buffer<T: Pod>(
    gpu: &GpuContext,
    pool: &CommandPool,
    data: &[T],
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<GpuBuffer> {
    let size = std::mem::size_of_val(data) as u64;
    if size == 0 {
        return Err(GpuError::InvalidState(format!("{name} has no data to upload")));
    }

    let mut staging = create_staging_buffer(gpu, data, &format!("{name} (staging)"))?;
    let created = gpu.allocator().lock().create_buffer(
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuOnly,
        name,
    );
    let mut buffer = match created {
        Ok(buffer) => buffer,
        Err(e) => {
            gpu.allocator().lock().free_buffer(&mut staging)?;
            return Err(e);
        }
    };

    let (src, dst) = (staging.buffer, buffer.buffer);
    let copied = unsafe {
        run_one_shot(gpu.device(), pool, gpu.graphics_queue(), |device, cmd| {
            device.cmd_copy_buffer(cmd, src, dst, &[vk::BufferCopy::default().size(size)]);
        })
    };

    let mut allocator = gpu.allocator().lock();
    allocator.free_buffer(&mut staging)?;
    if let Err(e) = copied {
        allocator.free_buffer(&mut buffer)?;
        return Err(e);
    }

    tracing::debug!(bytes = size, "uploaded {name}");
    Ok(buffer)
}
