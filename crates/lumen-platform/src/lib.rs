//! Windowing and input for the Lumen renderer.
//!
//! Wraps a winit window whose event loop is pumped by the caller instead of
//! owning the main loop, so the renderer can poll once per frame and block
//! on the next event while the window is minimized.

mod input;
mod window;

use lumen_core::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use thiserror::Error;

pub use input::InputState;
pub use window::PlatformWindow;
pub use winit::keyboard::KeyCode;
pub use winit::window::Window;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("could not open window: {0}")]
    WindowCreation(String),
    /// The winit event loop failed or exited before a window existed.
    #[error("event loop: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// How the window is opened.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub title: String,
    /// Requested inner size in logical pixels.
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    /// Grab and hide the cursor at startup so mouse motion drives the camera.
    /// Escape toggles the grab at runtime.
    pub capture_cursor: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_owned(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            resizable: true,
            capture_cursor: true,
        }
    }
}
