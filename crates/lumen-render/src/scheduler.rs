//! The per-frame state machine.
//!
//! ```text
//! WaitForSlot -> AcquireImage -> UpdateState -> Record -> Submit -> Present -> Advance
//!                    │                                                 │
//!                  stale ──> rebuild, slot unchanged      stale/suboptimal/resized ──> rebuild
//! ```

use ash::vk;
use lumen_core::WindowSurface;
use lumen_gpu::SurfaceStatus;
use tracing::{debug, trace, warn};

use crate::backend::{
    CommandEncoder, DrawBindings, FrameDevice, FrameState, FrameSubmission, PresentationSurface,
};
use crate::frame_slot::FrameSlotPool;
use crate::recorder::CommandRecorder;
use crate::resize::ResizeCoordinator;
use crate::error::{RenderError, Result};

/// What happened during one [`FrameScheduler::draw_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented. A rebuild may have been due
    /// but was dropped because the window closed while minimized.
    Presented,
    /// The frame was submitted and presented, then the swapchain was rebuilt.
    PresentedAndRebuilt,
    /// Acquire reported a stale surface. Nothing was submitted and the slot
    /// was not advanced. The swapchain was rebuilt unless the window closed
    /// while minimized.
    Skipped,
}

/// Drives one frame per call, pacing the host against the GPU with one
/// fence per slot.
pub struct FrameScheduler<D, E> {
    device: D,
    recorder: CommandRecorder<E>,
    slots: FrameSlotPool,
    resize: ResizeCoordinator,
    current_slot: usize,
    frame_count: u64,
}

impl<D: FrameDevice, E: CommandEncoder> FrameScheduler<D, E> {
    pub fn new(device: D, encoder: E, slots: FrameSlotPool, resize: ResizeCoordinator) -> Self {
        Self {
            device,
            recorder: CommandRecorder::new(encoder),
            slots,
            resize,
            current_slot: 0,
            frame_count: 0,
        }
    }

    /// Slot the next frame will use.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Frames that reached submission.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn slots(&self) -> &FrameSlotPool {
        &self.slots
    }

    pub fn resize_coordinator(&self) -> &ResizeCoordinator {
        &self.resize
    }

    /// Run the resize coordinator outside of a frame, e.g. after the caller
    /// noticed a size change on its own.
    pub fn rebuild<S, W>(&mut self, surface: &mut S, window: &mut W) -> Result<()>
    where
        S: PresentationSurface + ?Sized,
        W: WindowSurface + ?Sized,
    {
        self.resize.rebuild(&self.device, surface, window).map(|_| ())
    }

    /// Render and present one frame.
    ///
    /// Errors are fatal. A stale or suboptimal surface and window resizes are
    /// handled here by rebuilding, and show up only in the returned outcome.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn draw_frame<S, W, F>(
        &mut self,
        surface: &mut S,
        window: &mut W,
        state: &mut F,
        bindings: &DrawBindings,
    ) -> Result<FrameOutcome>
    where
        S: PresentationSurface + ?Sized,
        W: WindowSurface + ?Sized,
        F: FrameState + ?Sized,
    {
        let slot_index = self.current_slot;
        let slot = self.slots.get(slot_index);

        // WaitForSlot
        self.device
            .wait_for_fence(slot.in_flight, u64::MAX)
            .map_err(RenderError::Sync)?;

        // AcquireImage
        let (image_index, acquire_status) = surface
            .acquire(u64::MAX, slot.image_available)
            .map_err(RenderError::Acquire)?;

        if acquire_status == SurfaceStatus::Stale {
            warn!("Swapchain out of date on acquire, rebuilding");
            self.resize.rebuild(&self.device, surface, window)?;
            return Ok(FrameOutcome::Skipped);
        }
        trace!(slot = slot_index, image = image_index, "Acquired image");

        // UpdateState. The fence is only reset once work is certain to be
        // submitted, otherwise the next wait on this slot would never return.
        self.device
            .reset_fence(slot.in_flight)
            .map_err(RenderError::Sync)?;
        state.update(slot_index, surface.extent())?;

        // Record
        let target = surface
            .render_target(image_index)
            .ok_or(RenderError::MissingRenderTarget(image_index))?;
        self.device
            .reset_command_buffer(slot.command_buffer)
            .map_err(RenderError::Recording)?;
        self.recorder
            .record(slot.command_buffer, &target, bindings, slot_index)?;

        // Submit
        self.device
            .submit(&FrameSubmission {
                command_buffer: slot.command_buffer,
                wait_semaphore: slot.image_available,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_semaphore: slot.render_finished,
                fence: slot.in_flight,
            })
            .map_err(RenderError::Submit)?;

        // Advance
        self.current_slot = self.slots.next_index(slot_index);
        self.frame_count += 1;

        // Present
        let present_status = surface
            .present(image_index, slot.render_finished)
            .map_err(RenderError::Present)?;

        let resized = self.resize.take_pending();
        if present_status.needs_rebuild()
            || acquire_status == SurfaceStatus::Suboptimal
            || resized
        {
            debug!(
                ?acquire_status,
                ?present_status,
                resized,
                "Rebuilding swapchain after present"
            );
            if self.resize.rebuild(&self.device, surface, window)?.is_some() {
                return Ok(FrameOutcome::PresentedAndRebuilt);
            }
        }

        Ok(FrameOutcome::Presented)
    }
}
