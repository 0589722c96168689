//! Held keys and mouse motion gathered between frames.

use glam::Vec2;
use hashbrown::HashSet;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keyboard and mouse input accumulated since the last [`end_frame`](Self::end_frame).
///
/// Keys are tracked as held or not; camera movement only needs that. Mouse
/// motion is the raw device delta and is summed until the frame consumes it.
#[derive(Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
    mouse_delta: Vec2,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a winit key event. Keys winit cannot identify are ignored.
    pub fn process_key_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            match event.state {
                ElementState::Pressed => self.press(code),
                ElementState::Released => self.release(code),
            }
        }
    }

    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key);
    }

    pub fn release(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    #[must_use]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn add_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.mouse_delta.x += dx as f32;
        self.mouse_delta.y += dy as f32;
    }

    /// Summed mouse motion in pixels. Positive y points down the screen.
    #[must_use]
    pub const fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Reset the per-frame mouse delta. Held keys stay held.
    pub fn end_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Drop everything; release events are lost while unfocused.
    pub fn clear(&mut self) {
        self.held.clear();
        self.mouse_delta = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_survive_frame_boundaries() {
        let mut input = InputState::new();
        input.press(KeyCode::KeyA);
        input.press(KeyCode::KeyA);
        input.end_frame();
        assert!(input.is_pressed(KeyCode::KeyA));

        input.release(KeyCode::KeyA);
        assert!(!input.is_pressed(KeyCode::KeyA));
    }

    #[test]
    fn mouse_motion_is_summed_until_end_frame() {
        let mut input = InputState::new();
        input.add_mouse_motion(3.0, -1.0);
        input.add_mouse_motion(2.0, 4.0);
        assert_eq!(input.mouse_delta(), Vec2::new(5.0, 3.0));

        input.end_frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut input = InputState::new();
        input.press(KeyCode::ShiftLeft);
        input.add_mouse_motion(1.0, 1.0);
        input.clear();
        assert!(!input.is_pressed(KeyCode::ShiftLeft));
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
    }
}
