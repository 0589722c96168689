//! Windowing seam used by the resize path.

use crate::extent::Extent;

/// The part of a window the renderer needs while rebuilding surface resources.
pub trait WindowSurface {
    /// Current framebuffer size in physical pixels.
    fn framebuffer_extent(&self) -> Extent;

    /// Block until the platform delivers at least one event.
    ///
    /// Only used while the framebuffer has zero area (minimized window).
    fn wait_events(&mut self);

    /// Whether the user asked to close the window. Checked between
    /// [`wait_events`](Self::wait_events) calls so a minimized window can
    /// still be closed.
    fn close_requested(&self) -> bool;
}
