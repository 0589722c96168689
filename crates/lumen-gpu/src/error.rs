//! Errors raised by the Vulkan layer.

use ash::vk;
use gpu_allocator::AllocationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuError {
    /// A Vulkan entry point returned a non-success code.
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("could not load the Vulkan library: {0}")]
    Loader(String),

    /// No physical device can both render and present to the window surface.
    #[error("no physical device can render and present to this surface")]
    NoSuitableDevice,

    #[error("device extension unavailable: {0}")]
    MissingExtension(String),

    /// None of the candidate formats supports the requested usage.
    #[error("no supported format for {0}")]
    UnsupportedFormat(String),

    #[error("gpu memory: {0}")]
    Allocation(#[from] AllocationError),

    #[error("window surface: {0}")]
    Surface(String),

    #[error("swapchain: {0}")]
    Swapchain(String),

    /// SPIR-V was rejected while building a shader module.
    #[error("shader module ({stage}): {reason}")]
    Shader { stage: &'static str, reason: String },

    #[error("graphics pipeline: {0}")]
    Pipeline(String),

    /// An object was used before it was set up or after it was torn down.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, GpuError>;
