//! Application configuration and main loop.

use std::path::PathBuf;
use std::time::Instant;

use lumen_core::constants::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use lumen_core::resize_channel;
use lumen_platform::{PlatformConfig, PlatformWindow};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::controls::movement_from_input;
use crate::renderer::Renderer;
use crate::stats::FrameStats;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// OBJ model to draw. The built-in quads are drawn when unset.
    pub model_path: Option<PathBuf>,
    /// Texture image. A generated checkerboard is used when unset.
    pub texture_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Lumen".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            vsync: true,
            validation: cfg!(debug_assertions),
            model_path: None,
            texture_path: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub const fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Draw an OBJ model instead of the built-in quads.
    #[must_use]
    pub fn with_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Texture the model with an image file.
    #[must_use]
    pub fn with_texture(mut self, path: impl Into<PathBuf>) -> Self {
        self.texture_path = Some(path.into());
        self
    }

    fn platform_config(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            ..Default::default()
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Run the renderer with the given configuration until the window closes.
///
/// Initializes logging, creates the window and GPU resources, runs the main
/// loop and tears everything down again, also when a frame fails.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    init_logging();
    info!("{} starting...", config.title);

    let (notifier, resize_events) = resize_channel();
    let mut window = PlatformWindow::new(config.platform_config(), notifier)?;
    let Some(mut renderer) = Renderer::new(&config, &mut window, resize_events)? else {
        info!("Window closed before the first frame");
        return Ok(());
    };

    let result = main_loop(&mut renderer, &mut window);
    let cleanup = renderer.destroy();
    result.and(cleanup)
}

fn main_loop(renderer: &mut Renderer, window: &mut PlatformWindow) -> anyhow::Result<()> {
    let mut stats = FrameStats::new();
    let mut last_frame = Instant::now();

    while window.poll_events() {
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        stats.record(dt);

        let movement = movement_from_input(window.input());
        let mouse_delta = window
            .cursor_captured()
            .then(|| window.input().mouse_delta());
        renderer.update_camera(&movement, mouse_delta, dt);
        window.input_mut().end_frame();

        if let Err(e) = renderer.draw_frame(window) {
            error!("Render error: {e:#}");
            return Err(e);
        }
    }

    info!("Close requested");
    stats.log_summary(renderer.frame_count());
    info!("Swapchain rebuilds: {}", renderer.rebuild_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_every_field() {
        let config = AppConfig::new("Test")
            .with_size(320, 200)
            .with_vsync(false)
            .with_validation(true)
            .with_model("viking_room.obj")
            .with_texture("viking_room.png");

        assert_eq!(config.title, "Test");
        assert_eq!((config.width, config.height), (320, 200));
        assert!(!config.vsync);
        assert!(config.validation);
        assert_eq!(config.model_path, Some(PathBuf::from("viking_room.obj")));
        assert_eq!(config.texture_path, Some(PathBuf::from("viking_room.png")));
    }

    #[test]
    fn platform_config_follows_app_config() {
        let platform = AppConfig::new("Window").with_size(640, 480).platform_config();
        assert_eq!(platform.title, "Window");
        assert_eq!((platform.width, platform.height), (640, 480));
        assert!(platform.resizable);
    }
}
