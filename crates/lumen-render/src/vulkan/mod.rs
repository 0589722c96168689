//! Vulkan implementations of the frame seams.

mod device;
mod target;

pub use device::VulkanDevice;
pub use target::SwapchainTarget;
