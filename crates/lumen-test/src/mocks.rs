//! Mock implementations of the frame seams.
//!
//! Every mock records into the same [`EventLog`]. The device completes GPU
//! work instantly: a submit signals its fence right away.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use ash::vk::{self, Handle};
use hashbrown::HashMap;
use lumen_core::{Extent, WindowSurface};
use lumen_gpu::{GpuError, Result as GpuResult, SurfaceStatus};
use lumen_render::{
    CommandEncoder, FrameDevice, FrameState, FrameSubmission, PresentationSurface, RenderError,
    RenderTarget,
};

use crate::events::{Event, EventLog};

/// Stop a test that would otherwise wait on a window forever.
const MAX_WAIT_EVENTS: usize = 1_000;

fn to_extent(extent: vk::Extent2D) -> Extent {
    Extent::new(extent.width, extent.height)
}

/// Device and encoder. Clones share fences, failures and the log.
#[derive(Clone, Debug)]
pub struct MockDevice {
    log: EventLog,
    fences: Rc<RefCell<HashMap<vk::Fence, bool>>>,
    fail_submit: Rc<Cell<Option<vk::Result>>>,
    fail_begin: Rc<Cell<Option<vk::Result>>>,
}

impl MockDevice {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fences: Rc::default(),
            fail_submit: Rc::default(),
            fail_begin: Rc::default(),
        }
    }

    /// Make `fence` known to the device.
    pub fn add_fence(&self, fence: vk::Fence, signaled: bool) {
        self.fences.borrow_mut().insert(fence, signaled);
    }

    pub fn is_signaled(&self, fence: vk::Fence) -> bool {
        self.fences.borrow().get(&fence).copied().unwrap_or(false)
    }

    /// The next submit fails with `result`.
    pub fn fail_next_submit(&self, result: vk::Result) {
        self.fail_submit.set(Some(result));
    }

    /// The next `begin` fails with `result`.
    pub fn fail_next_begin(&self, result: vk::Result) {
        self.fail_begin.set(Some(result));
    }
}

impl FrameDevice for MockDevice {
    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> GpuResult<()> {
        match self.fences.borrow().get(&fence) {
            Some(true) => {
                self.log.push(Event::FenceObserved(fence));
                Ok(())
            }
            // Nothing pending would ever signal it
            Some(false) => Err(GpuError::Vulkan(vk::Result::TIMEOUT)),
            None => Err(GpuError::InvalidState(format!(
                "unknown fence {:#x}",
                fence.as_raw()
            ))),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> GpuResult<()> {
        self.fences.borrow_mut().insert(fence, false);
        self.log.push(Event::ResetFence(fence));
        Ok(())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> GpuResult<()> {
        self.log.push(Event::ResetCommandBuffer(command_buffer));
        Ok(())
    }

    fn submit(&self, submission: &FrameSubmission) -> GpuResult<()> {
        if let Some(result) = self.fail_submit.take() {
            return Err(GpuError::Vulkan(result));
        }
        if self.is_signaled(submission.fence) {
            return Err(GpuError::InvalidState(
                "submitted with a signaled fence".to_string(),
            ));
        }
        if submission.wait_stage != vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT {
            return Err(GpuError::InvalidState(format!(
                "unexpected wait stage {:?}",
                submission.wait_stage
            )));
        }

        self.log.push(Event::Submit {
            command_buffer: submission.command_buffer,
            wait: submission.wait_semaphore,
            signal: submission.signal_semaphore,
            fence: submission.fence,
        });
        self.fences.borrow_mut().insert(submission.fence, true);
        Ok(())
    }

    fn wait_idle(&self) -> GpuResult<()> {
        self.log.push(Event::WaitIdle);
        Ok(())
    }
}

impl CommandEncoder for MockDevice {
    fn begin(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        if let Some(result) = self.fail_begin.take() {
            return Err(GpuError::Vulkan(result));
        }
        self.log.push(Event::Begin(cmd));
        Ok(())
    }

    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        target: &RenderTarget,
        clear_values: &[vk::ClearValue],
    ) {
        // Attachment 0 is color, attachment 1 is depth
        let (color, depth_stencil) = match clear_values {
            // SAFETY: The recorder fills these union members in this order
            [color, depth] => unsafe { (color.color.float32, depth.depth_stencil) },
            other => panic!("expected two clear values, got {}", other.len()),
        };
        self.log.push(Event::BeginRenderPass {
            command_buffer: cmd,
            framebuffer: target.framebuffer,
            extent: to_extent(target.extent),
            color,
            depth: depth_stencil.depth,
            stencil: depth_stencil.stencil,
        });
    }

    fn bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.log.push(Event::BindPipeline(pipeline));
    }

    fn bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.log.push(Event::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.log.push(Event::BindIndexBuffer(buffer));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_viewport(&self, _cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        self.log.push(Event::SetViewport(Extent::new(
            viewport.width as u32,
            viewport.height as u32,
        )));
    }

    fn set_scissor(&self, _cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.log.push(Event::SetScissor(to_extent(scissor.extent)));
    }

    fn bind_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.log.push(Event::BindDescriptorSet(set));
    }

    fn draw_indexed(&self, _cmd: vk::CommandBuffer, index_count: u32) {
        self.log.push(Event::DrawIndexed(index_count));
    }

    fn end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.log.push(Event::EndRenderPass);
    }

    fn end(&self, cmd: vk::CommandBuffer) -> GpuResult<()> {
        self.log.push(Event::End(cmd));
        Ok(())
    }
}

/// Scripted result of one acquire or present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Status(SurfaceStatus),
    Error(vk::Result),
}

impl Scripted {
    fn resolve(self) -> GpuResult<SurfaceStatus> {
        match self {
            Self::Status(status) => Ok(status),
            Self::Error(result) => Err(GpuError::Vulkan(result)),
        }
    }
}

/// Swapchain stand-in with scripted acquire and present results.
///
/// Images are handed out round-robin. Each rebuild starts a new generation
/// of framebuffer handles.
#[derive(Debug)]
pub struct MockSurface {
    log: EventLog,
    extent: Extent,
    image_count: u32,
    next_image: u32,
    generation: u64,
    acquire_calls: u64,
    present_calls: u64,
    acquire_script: HashMap<u64, Scripted>,
    present_script: HashMap<u64, Scripted>,
    fail_rebuild: Option<vk::Result>,
}

impl MockSurface {
    pub fn new(log: EventLog, extent: Extent, image_count: u32) -> Self {
        Self {
            log,
            extent,
            image_count,
            next_image: 0,
            generation: 0,
            acquire_calls: 0,
            present_calls: 0,
            acquire_script: HashMap::new(),
            present_script: HashMap::new(),
            fail_rebuild: None,
        }
    }

    /// Script the result of the acquire call with zero-based number `call`.
    pub fn script_acquire(&mut self, call: u64, result: Scripted) {
        self.acquire_script.insert(call, result);
    }

    /// Script the result of the present call with zero-based number `call`.
    pub fn script_present(&mut self, call: u64, result: Scripted) {
        self.present_script.insert(call, result);
    }

    /// The next rebuild fails with `result`.
    pub fn fail_next_rebuild(&mut self, result: vk::Result) {
        self.fail_rebuild = Some(result);
    }

    pub fn acquire_calls(&self) -> u64 {
        self.acquire_calls
    }

    pub fn present_calls(&self) -> u64 {
        self.present_calls
    }

    /// Number of completed rebuilds.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_extent(&self) -> Extent {
        self.extent
    }

    /// Framebuffers of the current image set.
    pub fn framebuffers(&self) -> Vec<vk::Framebuffer> {
        (0..self.image_count)
            .filter_map(|i| self.render_target(i).map(|t| t.framebuffer))
            .collect()
    }
}

impl PresentationSurface for MockSurface {
    fn acquire(&mut self, _timeout_ns: u64, signal: vk::Semaphore) -> GpuResult<(u32, SurfaceStatus)> {
        let call = self.acquire_calls;
        self.acquire_calls += 1;

        let status = self
            .acquire_script
            .remove(&call)
            .unwrap_or(Scripted::Status(SurfaceStatus::Optimal))
            .resolve()?;
        if status == SurfaceStatus::Stale {
            return Ok((0, status));
        }

        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        self.log.push(Event::Acquire { signal, image });
        Ok((image, status))
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> GpuResult<SurfaceStatus> {
        let call = self.present_calls;
        self.present_calls += 1;

        let status = self
            .present_script
            .remove(&call)
            .unwrap_or(Scripted::Status(SurfaceStatus::Optimal))
            .resolve()?;
        self.log.push(Event::Present {
            image: image_index,
            wait,
        });
        Ok(status)
    }

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    fn render_target(&self, image_index: u32) -> Option<RenderTarget> {
        (image_index < self.image_count).then(|| RenderTarget {
            render_pass: vk::RenderPass::from_raw(1),
            framebuffer: vk::Framebuffer::from_raw(
                (self.generation + 1) * 1_000 + u64::from(image_index),
            ),
            extent: self.extent(),
        })
    }

    fn image_count(&self) -> usize {
        self.image_count as usize
    }

    fn rebuild(&mut self, extent: Extent) -> GpuResult<()> {
        if let Some(result) = self.fail_rebuild.take() {
            return Err(GpuError::Vulkan(result));
        }
        self.log.push(Event::Rebuild(extent));
        self.extent = extent;
        self.next_image = 0;
        self.generation += 1;
        Ok(())
    }
}

/// Window whose framebuffer size advances through a script, one step per
/// `wait_events` call.
#[derive(Debug)]
pub struct MockWindow {
    log: EventLog,
    extents: VecDeque<Extent>,
    wait_calls: usize,
    close_after_waits: Option<usize>,
}

impl MockWindow {
    pub fn new(log: EventLog, extent: Extent) -> Self {
        Self {
            log,
            extents: VecDeque::from([extent]),
            wait_calls: 0,
            close_after_waits: None,
        }
    }

    /// Report these sizes in order. The last one stays.
    pub fn script_extents(&mut self, extents: impl IntoIterator<Item = Extent>) {
        self.extents = extents.into_iter().collect();
    }

    /// Make the window report `extent` from now on.
    pub fn set_extent(&mut self, extent: Extent) {
        self.script_extents([extent]);
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls
    }

    /// Report a close request once `waits` calls to `wait_events` returned.
    pub fn close_after_waits(&mut self, waits: usize) {
        self.close_after_waits = Some(waits);
    }
}

impl WindowSurface for MockWindow {
    fn framebuffer_extent(&self) -> Extent {
        self.extents.front().copied().unwrap_or_default()
    }

    fn wait_events(&mut self) {
        self.wait_calls += 1;
        assert!(
            self.wait_calls <= MAX_WAIT_EVENTS,
            "window never became drawable"
        );
        self.log.push(Event::WaitEvents);
        if self.extents.len() > 1 {
            self.extents.pop_front();
        }
    }

    fn close_requested(&self) -> bool {
        self.close_after_waits
            .is_some_and(|waits| self.wait_calls >= waits)
    }
}

/// Scene update that only records which slot it was asked to update.
#[derive(Debug)]
pub struct MockState {
    log: EventLog,
    fail_next: bool,
}

impl MockState {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_next: false,
        }
    }

    /// The next update fails.
    pub fn fail_next_update(&mut self) {
        self.fail_next = true;
    }
}

impl FrameState for MockState {
    fn update(&mut self, slot: usize, extent: vk::Extent2D) -> lumen_render::Result<()> {
        if std::mem::take(&mut self.fail_next) {
            return Err(RenderError::Config("scripted update failure".to_string()));
        }
        self.log.push(Event::Update {
            slot,
            extent: to_extent(extent),
        });
        Ok(())
    }
}
