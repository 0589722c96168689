//! Per-frame synchronization and recording resources.

use ash::vk;
use lumen_gpu::sync::{create_fence, create_semaphore, FenceState};
use lumen_gpu::{CommandPool, GpuContext};

use crate::error::{RenderError, Result};

/// Resources for one frame in flight.
///
/// `in_flight` is created signaled so the first wait on a fresh slot
/// returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signaled when the acquired swapchain image is ready.
    pub image_available: vk::Semaphore,
    /// Signaled when this slot's rendering completes. Present waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when this slot's submission has finished executing.
    pub in_flight: vk::Fence,
    /// Re-recorded every frame.
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    /// Create a slot.
    ///
    /// # Safety
    /// The device must be valid and the pool must allow per-buffer reset.
    pub unsafe fn new(device: &ash::Device, pool: &CommandPool) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, FenceState::Signaled)?,
            command_buffer: pool.allocate_primary(device)?,
        })
    }

    /// Destroy the semaphores and fence. The command buffer is freed with its pool.
    ///
    /// # Safety
    /// The device must be valid and nothing may still use the slot.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Fixed set of frame slots, used round-robin.
#[derive(Debug)]
pub struct FrameSlotPool {
    slots: Vec<FrameSlot>,
}

impl FrameSlotPool {
    /// Create `count` slots on the device.
    pub fn new(gpu: &GpuContext, pool: &CommandPool, count: usize) -> Result<Self> {
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            match unsafe { FrameSlot::new(gpu.device(), pool) } {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        unsafe { slot.destroy(gpu.device()) };
                    }
                    return Err(e);
                }
            }
        }
        tracing::debug!("Created {} frame slots", count);
        Self::from_slots(slots)
    }

    /// Wrap existing slots.
    pub fn from_slots(slots: Vec<FrameSlot>) -> Result<Self> {
        if slots.is_empty() {
            return Err(RenderError::Config(
                "at least one frame slot is required".to_string(),
            ));
        }
        Ok(Self { slots })
    }

    /// Number of frames in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot at `index`, wrapping around.
    pub fn get(&self, index: usize) -> FrameSlot {
        self.slots[index % self.slots.len()]
    }

    /// Index of the slot after `index`.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Destroy every slot.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for slot in &self.slots {
            slot.destroy(device);
        }
    }
}
