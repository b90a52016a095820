//! Keyboard and mouse state, fed by window events.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// The mouse buttons the camera controller cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Snapshot of keyboard and mouse state.
///
/// Event handlers push state in; the render loop reads it once per frame and
/// then calls [`begin_frame`](Self::begin_frame) to clear the per-frame
/// parts (just-pressed sets and the accumulated mouse delta). Held keys and
/// buttons persist across frames.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,

    /// `None` until the first cursor event; deltas need a previous position.
    mouse_position: Option<(f32, f32)>,
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears just-pressed sets and the mouse delta; run after each frame
    /// has consumed the input.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_pressed_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        // OS key repeat re-sends presses; only the first one is "just".
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) {
            self.just_pressed_buttons.insert(button);
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Folds a cursor event into the accumulated delta.
    ///
    /// Several cursor events can arrive between two frames; their movements
    /// sum until [`begin_frame`](Self::begin_frame). The very first event
    /// only establishes the position, producing no delta.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((px, py)) = self.mouse_position {
            self.mouse_delta.0 += x - px;
            self.mouse_delta.1 += y - py;
        }
        self.mouse_position = Some((x, y));
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    /// Cursor movement accumulated since the last [`begin_frame`](Self::begin_frame).
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_and_release() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.on_key_released(KeyCode::KeyW);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_just_pressed_cleared_by_begin_frame() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::Space));
        assert!(!input.is_key_just_pressed(KeyCode::Space));
    }

    #[test]
    fn test_repeat_press_is_not_just_pressed() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyA);
        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyA);
        assert!(!input.is_key_just_pressed(KeyCode::KeyA));
    }

    #[test]
    fn test_first_mouse_move_produces_no_delta() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 200.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_mouse_delta_accumulates_between_frames() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 20.0);
        input.on_mouse_moved(15.0, 18.0);
        input.on_mouse_moved(16.0, 18.0);
        assert_eq!(input.mouse_delta(), (6.0, -2.0));

        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_unknown_buttons_map_to_left() {
        let button: MouseButton = winit::event::MouseButton::Back.into();
        assert_eq!(button, MouseButton::Left);
    }
}
