//! Swapchain rebuild on resize.

use lumen_core::{Extent, ResizeEvents, WindowSurface};
use tracing::{debug, info};

use crate::backend::{FrameDevice, PresentationSurface};
use crate::error::{RenderError, Result};

/// Rebuilds swapchain-dependent resources when the surface goes stale,
/// reports suboptimal, or the window reports a new framebuffer size.
///
/// Only the swapchain, its image views, the depth buffer and the
/// framebuffers are recreated. Pipelines, descriptors and buffers are left
/// alone.
pub struct ResizeCoordinator {
    events: ResizeEvents,
    rebuild_count: u64,
}

impl ResizeCoordinator {
    pub fn new(events: ResizeEvents) -> Self {
        Self {
            events,
            rebuild_count: 0,
        }
    }

    /// Whether the window reported a resize since the last check or rebuild.
    pub fn take_pending(&self) -> bool {
        self.events.drain_latest().is_some()
    }

    /// Number of rebuilds performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Wait for a drawable framebuffer, quiesce the device, then rebuild.
    ///
    /// While the window is minimized (either dimension zero) this blocks on
    /// window events. Returns the extent the surface was rebuilt for, or
    /// `None` when the window was closed during that wait. Nothing is
    /// rebuilt in that case.
    pub fn rebuild<D, S, W>(
        &mut self,
        device: &D,
        surface: &mut S,
        window: &mut W,
    ) -> Result<Option<Extent>>
    where
        D: FrameDevice + ?Sized,
        S: PresentationSurface + ?Sized,
        W: WindowSurface + ?Sized,
    {
        let mut extent = window.framebuffer_extent();
        while extent.is_zero_area() {
            if window.close_requested() {
                info!("Window closed while minimized, skipping swapchain rebuild");
                return Ok(None);
            }
            debug!("Framebuffer is {extent}, waiting for events");
            window.wait_events();
            extent = window.framebuffer_extent();
        }

        device.wait_idle().map_err(RenderError::Rebuild)?;
        surface.rebuild(extent).map_err(RenderError::Rebuild)?;

        // The rebuild already used the latest size
        self.events.drain_latest();
        self.rebuild_count += 1;

        let actual = surface.extent();
        info!(
            "Rebuilt swapchain #{}: {}x{}, {} images",
            self.rebuild_count,
            actual.width,
            actual.height,
            surface.image_count()
        );
        Ok(Some(extent))
    }
}
