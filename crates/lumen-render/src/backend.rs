//! Seams between the frame protocol and the GPU.
//!
//! [`FrameScheduler`](crate::FrameScheduler), [`CommandRecorder`](crate::CommandRecorder)
//! and [`ResizeCoordinator`](crate::ResizeCoordinator) only talk to the
//! device and the swapchain through these traits. The Vulkan implementations
//! live in [`crate::vulkan`].

use ash::vk;
use lumen_core::Extent;
use lumen_gpu::{Result as GpuResult, SurfaceStatus};

/// One queue submission for a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSubmission {
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore to wait on before `wait_stage`.
    pub wait_semaphore: vk::Semaphore,
    pub wait_stage: vk::PipelineStageFlags,
    /// Semaphore signaled when the work completes.
    pub signal_semaphore: vk::Semaphore,
    /// Fence signaled when the work completes.
    pub fence: vk::Fence,
}

/// Queue and synchronization operations needed per frame.
pub trait FrameDevice {
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> GpuResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()>;
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> GpuResult<()>;
    fn submit(&self, submission: &FrameSubmission) -> GpuResult<()>;
    /// Block until all submitted work has finished.
    fn wait_idle(&self) -> GpuResult<()>;
}

/// Where a frame is rendered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

/// Command recording operations used by [`CommandRecorder`](crate::CommandRecorder).
pub trait CommandEncoder {
    fn begin(&self, cmd: vk::CommandBuffer) -> GpuResult<()>;
    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        target: &RenderTarget,
        clear_values: &[vk::ClearValue],
    );
    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);
    fn set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);
    fn set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);
    fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );
    fn draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32);
    fn end_render_pass(&self, cmd: vk::CommandBuffer);
    fn end(&self, cmd: vk::CommandBuffer) -> GpuResult<()>;
}

/// A swapchain and everything sized to it.
///
/// Acquire and present report [`SurfaceStatus::Stale`] and
/// [`SurfaceStatus::Suboptimal`] as values. Any other failure is an `Err`.
pub trait PresentationSurface {
    /// Acquire the next image, signaling `signal` once it can be rendered to.
    /// The index is meaningless when the status is [`SurfaceStatus::Stale`].
    fn acquire(&mut self, timeout_ns: u64, signal: vk::Semaphore) -> GpuResult<(u32, SurfaceStatus)>;

    /// Queue `image_index` for presentation after `wait` is signaled.
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> GpuResult<SurfaceStatus>;

    /// Current swapchain extent.
    fn extent(&self) -> vk::Extent2D;

    /// Render pass and framebuffer for a swapchain image.
    fn render_target(&self, image_index: u32) -> Option<RenderTarget>;

    /// Number of swapchain images (and framebuffers).
    fn image_count(&self) -> usize;

    /// Recreate the swapchain, depth buffer and framebuffers for `extent`.
    /// The caller guarantees the device is idle.
    fn rebuild(&mut self, extent: Extent) -> GpuResult<()>;
}

/// Per-frame scene update, run once the slot's fence has been reset.
pub trait FrameState {
    /// Write this slot's uniform data for a frame rendered at `extent`.
    fn update(&mut self, slot: usize, extent: vk::Extent2D) -> crate::Result<()>;
}

/// Handles needed to record the draw.
#[derive(Debug, Clone, Default)]
pub struct DrawBindings {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: vk::Buffer,
    pub index_count: u32,
    /// One descriptor set per frame slot.
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}
