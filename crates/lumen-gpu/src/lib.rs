//! Vulkan abstraction layer for the Lumen renderer.
//!
//! This crate provides:
//! - Vulkan instance, surface and device creation
//! - Memory allocation via gpu-allocator
//! - Command buffer and synchronization helpers
//! - Swapchain, depth buffer, render pass and framebuffer handling
//! - Graphics pipeline and descriptor set creation

pub mod capabilities;
pub mod command;
pub mod context;
pub mod depth;
pub mod descriptors;
pub mod error;
pub mod image;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder};
pub use depth::DepthBuffer;
pub use descriptors::{DescriptorKind, DescriptorPool, SetLayoutSpec, SetWrites};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{DepthMode, GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceContext, SurfaceSupport};
pub use swapchain::{SurfaceStatus, Swapchain, SwapchainDesc};
pub use sync::{create_fence, create_semaphore, FenceState};
