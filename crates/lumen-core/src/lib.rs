//! Core types and traits for the Lumen renderer.
//!
//! This crate provides the foundational pieces shared by every other crate:
//! - Pixel extents of presentable surfaces
//! - The windowing seam used while a window is minimized
//! - The resize notification channel between the window and the renderer

pub mod extent;
pub mod resize;
pub mod window;

pub use extent::Extent;
pub use resize::{resize_channel, ResizeEvents, ResizeNotifier};
pub use window::WindowSurface;

/// Renderer-wide constants
pub mod constants {
    /// Number of frames the host may record ahead of the GPU.
    pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
    /// Default window width in pixels
    pub const DEFAULT_WIDTH: u32 = 800;
    /// Default window height in pixels
    pub const DEFAULT_HEIGHT: u32 = 600;
}
