//! Command pools and one-shot submissions.
//!
//! Per-frame recording goes through `lumen-render`'s command encoder; this
//! module only hands out buffers and runs blocking setup work.

use ash::vk;

use crate::error::{GpuError, Result};

/// A pool whose buffers can be reset individually, tied to one queue family.
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a pool with `RESET_COMMAND_BUFFER`, so each frame slot can
    /// re-record its own buffer without touching the others.
    ///
    /// # Safety
    /// `queue_family` must be a family index of `device`.
    pub unsafe fn resettable(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&info, None)? };
        tracing::trace!(queue_family, "command pool created");
        Ok(Self { pool, queue_family })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate one primary command buffer.
    ///
    /// # Safety
    /// `device` must be the device the pool was created on.
    pub unsafe fn allocate_primary(&self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let mut buffers = unsafe { device.allocate_command_buffers(&info)? };
        buffers
            .pop()
            .ok_or_else(|| GpuError::InvalidState("driver returned no command buffer".into()))
    }

    /// Destroy the pool, implicitly freeing every buffer allocated from it.
    ///
    /// # Safety
    /// None of the pool's buffers may be pending execution.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
    }
}

/// Record `record` into a throwaway buffer, submit it to `queue` and block
/// until the queue drains. Meant for uploads and layout transitions at load
/// time, never inside the frame loop.
///
/// # Safety
/// `pool` must belong to `device` and to `queue`'s family.
pub unsafe fn run_one_shot<F>(
    device: &ash::Device,
    pool: &CommandPool,
    queue: vk::Queue,
    record: F,
) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let cmd = unsafe { pool.allocate_primary(device)? };

    let outcome = unsafe {
        (|| -> Result<()> {
            let begin = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin)?;
            record(device, cmd);
            device.end_command_buffer(cmd)?;

            let buffers = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&buffers);
            device.queue_submit(queue, &[submit], vk::Fence::null())?;
            device.queue_wait_idle(queue)?;
            Ok(())
        })()
    };

    unsafe { device.free_command_buffers(pool.handle(), &[cmd]) };
    outcome
}
