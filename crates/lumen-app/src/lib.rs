//! Application runner for the Lumen renderer.
//!
//! This crate wires the pieces together:
//! - Logging initialization
//! - Window, GPU context and swapchain creation
//! - Mesh, texture, pipeline and descriptor setup
//! - The main loop with camera input and frame statistics
//! - Teardown in reverse construction order
//!
//! # Example
//!
//! ```no_run
//! use lumen_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Lumen").with_size(1280, 720))
//! }
//! ```

mod controls;
mod renderer;
mod runner;
mod stats;
mod teardown;

pub use controls::movement_from_input;
pub use renderer::Renderer;
pub use runner::{init_logging, run_app, AppConfig};
pub use stats::FrameStats;

// Re-export commonly used types for convenience
pub use lumen_gpu::{GpuContext, GpuContextBuilder};
pub use lumen_render::{Camera, FrameOutcome};
