//! Frame scheduling and mesh rendering for the Lumen renderer.
//!
//! This crate provides:
//! - The per-frame state machine and its synchronization protocol
//! - Swapchain rebuild on stale surfaces and window resizes
//! - Trait seams over the device and swapchain, with Vulkan implementations
//! - Camera, mesh, texture and uniform management for the mesh pipeline

pub mod backend;
pub mod camera;
pub mod error;
pub mod frame_slot;
pub mod mesh;
pub mod pipeline;
pub mod recorder;
pub mod resize;
pub mod scene;
pub mod scheduler;
pub mod texture;
pub mod uniforms;
pub mod vulkan;

pub use backend::{
    CommandEncoder, DrawBindings, FrameDevice, FrameState, FrameSubmission, PresentationSurface,
    RenderTarget,
};
pub use camera::{Camera, MovementInput, UniformBufferObject};
pub use error::{RenderError, Result};
pub use frame_slot::{FrameSlot, FrameSlotPool};
pub use mesh::{Mesh, MeshData, Vertex};
pub use pipeline::create_mesh_pipeline;
pub use recorder::CommandRecorder;
pub use resize::ResizeCoordinator;
pub use scene::Scene;
pub use scheduler::{FrameOutcome, FrameScheduler};
pub use texture::{Texture, TexturePixels};
pub use uniforms::{FrameDescriptors, UniformBuffers};
pub use vulkan::{SwapchainTarget, VulkanDevice};
