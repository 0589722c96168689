//! Semaphore and fence constructors.

use ash::vk;

use crate::error::Result;

/// Initial state of a new fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    /// The first wait returns immediately.
    Signaled,
    Unsignaled,
}

impl FenceState {
    const fn flags(self) -> vk::FenceCreateFlags {
        match self {
            Self::Signaled => vk::FenceCreateFlags::SIGNALED,
            Self::Unsignaled => vk::FenceCreateFlags::empty(),
        }
    }
}

/// # Safety
/// `device` must be a live logical device.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    Ok(unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? })
}

/// # Safety
/// `device` must be a live logical device.
pub unsafe fn create_fence(device: &ash::Device, state: FenceState) -> Result<vk::Fence> {
    let info = vk::FenceCreateInfo::default().flags(state.flags());
    Ok(unsafe { device.create_fence(&info, None)? })
}
