//! Keyboard bindings for the camera.

use lumen_platform::{InputState, KeyCode};
use lumen_render::MovementInput;

/// WASD moves, shift speeds up, control slows down.
#[must_use]
pub fn movement_from_input(input: &InputState) -> MovementInput {
    MovementInput {
        forward: input.is_pressed(KeyCode::KeyW),
        back: input.is_pressed(KeyCode::KeyS),
        left: input.is_pressed(KeyCode::KeyA),
        right: input.is_pressed(KeyCode::KeyD),
        fast: input.is_pressed(KeyCode::ShiftLeft) || input.is_pressed(KeyCode::ShiftRight),
        slow: input.is_pressed(KeyCode::ControlLeft) || input.is_pressed(KeyCode::ControlRight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_input_moves_nowhere() {
        assert_eq!(
            movement_from_input(&InputState::new()),
            MovementInput::default()
        );
    }

    #[test]
    fn keys_map_to_directions_and_modifiers() {
        let mut input = InputState::new();
        input.press(KeyCode::KeyW);
        input.press(KeyCode::KeyD);
        input.press(KeyCode::ShiftRight);

        let movement = movement_from_input(&input);
        assert!(movement.forward && movement.right && movement.fast);
        assert!(!movement.back && !movement.left && !movement.slow);

        input.release(KeyCode::KeyW);
        input.press(KeyCode::ControlLeft);
        let movement = movement_from_input(&input);
        assert!(!movement.forward);
        assert!(movement.slow);
    }
}
