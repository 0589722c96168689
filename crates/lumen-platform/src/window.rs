//! Pumped winit window.

use std::sync::Arc;
use std::time::Duration;

use lumen_core::{Extent, ResizeNotifier, WindowSurface};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::input::InputState;
use crate::{PlatformConfig, PlatformError, Result};

/// Event pumps allowed for the platform to deliver `resumed`.
const MAX_STARTUP_PUMPS: usize = 100;

/// A window together with the event loop that drives it.
///
/// Events are only processed inside [`PlatformWindow::poll_events`] and
/// [`WindowSurface::wait_events`].
pub struct PlatformWindow {
    event_loop: EventLoop<()>,
    handler: WindowHandler,
    window: Arc<Window>,
}

struct WindowHandler {
    config: PlatformConfig,
    window: Option<Arc<Window>>,
    input: InputState,
    resize: ResizeNotifier,
    cursor_captured: bool,
    close_requested: bool,
    error: Option<PlatformError>,
}

impl PlatformWindow {
    /// Create the event loop and window. Framebuffer size changes are posted
    /// to `resize`.
    pub fn new(config: PlatformConfig, resize: ResizeNotifier) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
        // `pump_app_events(None, ..)` only blocks under `Wait`
        event_loop.set_control_flow(ControlFlow::Wait);

        let mut handler = WindowHandler {
            config,
            window: None,
            input: InputState::new(),
            resize,
            cursor_captured: false,
            close_requested: false,
            error: None,
        };

        for _ in 0..MAX_STARTUP_PUMPS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut handler)
            {
                return Err(PlatformError::EventLoop(format!(
                    "event loop exited during startup with code {code}"
                )));
            }
            if let Some(e) = handler.error.take() {
                return Err(e);
            }
            if let Some(window) = handler.window.clone() {
                return Ok(Self {
                    event_loop,
                    handler,
                    window,
                });
            }
        }

        Err(PlatformError::WindowCreation(
            "platform never resumed the application".to_string(),
        ))
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Process pending events without blocking.
    ///
    /// Returns `false` once the window has been asked to close.
    pub fn poll_events(&mut self) -> bool {
        self.pump(Some(Duration::ZERO));
        !self.handler.close_requested
    }

    /// Whether the user asked to close the window.
    pub fn close_requested(&self) -> bool {
        self.handler.close_requested
    }

    pub fn input(&self) -> &InputState {
        &self.handler.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.handler.input
    }

    /// Whether mouse motion should drive the camera.
    pub fn cursor_captured(&self) -> bool {
        self.handler.cursor_captured
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.handler)
        {
            debug!("Event loop exited with code {code}");
            self.handler.close_requested = true;
        }
    }
}

impl WindowSurface for PlatformWindow {
    fn framebuffer_extent(&self) -> Extent {
        let size = self.window().inner_size();
        Extent::new(size.width, size.height)
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn close_requested(&self) -> bool {
        self.handler.close_requested
    }
}

impl WindowHandler {
    fn set_cursor_captured(&mut self, captured: bool) {
        let Some(window) = &self.window else {
            return;
        };

        if captured {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(e) = grabbed {
                warn!("Cursor grab unavailable: {e}");
                return;
            }
        } else if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
            warn!("Failed to release cursor: {e}");
        }

        window.set_cursor_visible(!captured);
        self.cursor_captured = captured;
    }
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                info!("Created window {}x{}", size.width, size.height);
                self.window = Some(Arc::new(window));
                if self.config.capture_cursor {
                    self.set_cursor_captured(true);
                }
            }
            Err(e) => {
                self.error = Some(PlatformError::WindowCreation(e.to_string()));
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Framebuffer resized to {}x{}", size.width, size.height);
                self.resize.notify(Extent::new(size.width, size.height));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.input.process_key_event(&event);
                let escape = event.physical_key == PhysicalKey::Code(KeyCode::Escape);
                if escape && event.state == ElementState::Pressed && !event.repeat {
                    let captured = !self.cursor_captured;
                    self.set_cursor_captured(captured);
                }
            }
            WindowEvent::Focused(false) => self.input.clear(),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.cursor_captured {
                self.input.add_mouse_motion(dx, dy);
            }
        }
    }
}
