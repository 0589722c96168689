//! Render error types.

use lumen_gpu::GpuError;
use thiserror::Error;

/// Rendering errors.
///
/// Everything surfaced from [`FrameScheduler::draw_frame`](crate::FrameScheduler::draw_frame)
/// is fatal; stale and suboptimal surfaces are handled inside the scheduler.
#[derive(Error, Debug)]
pub enum RenderError {
    /// GPU error outside the per-frame protocol.
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// Waiting on or resetting a frame fence failed.
    #[error("Frame synchronization failed: {0}")]
    Sync(#[source] GpuError),

    /// Acquiring the next swapchain image failed.
    #[error("Failed to acquire swapchain image: {0}")]
    Acquire(#[source] GpuError),

    /// Beginning or ending command buffer recording failed.
    #[error("Failed to record command buffer: {0}")]
    Recording(#[source] GpuError),

    /// Queue submission failed.
    #[error("Failed to submit frame: {0}")]
    Submit(#[source] GpuError),

    /// Presentation failed.
    #[error("Failed to present frame: {0}")]
    Present(#[source] GpuError),

    /// Rebuilding swapchain-dependent resources failed.
    #[error("Failed to rebuild swapchain: {0}")]
    Rebuild(#[source] GpuError),

    /// The surface returned an image index it has no framebuffer for.
    #[error("No render target for swapchain image {0}")]
    MissingRenderTarget(u32),

    /// No descriptor set was provided for a frame slot.
    #[error("No descriptor set for frame slot {0}")]
    MissingDescriptorSet(usize),

    /// Invalid renderer configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Model or texture could not be loaded.
    #[error("Failed to load asset {path}: {reason}")]
    Asset { path: String, reason: String },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
