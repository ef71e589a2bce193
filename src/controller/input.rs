//! Platform-agnostic pointer input

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { button: MouseButton, x: f32, y: f32, modifiers: Modifiers },
    PointerMove { x: f32, y: f32 },
    PointerUp { button: MouseButton },
    /// Positive is away from the user (scroll down)
    Wheel { delta_y: f32 },
    FocusLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_web_button(button: i16) -> Option<Self> {
        match button {
            0 => Some(MouseButton::Left),
            1 => Some(MouseButton::Middle),
            2 => Some(MouseButton::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{MouseEvent, WheelEvent};

    /// Client coordinates; only the deltas between events matter.
    pub fn mouse_down_to_input(e: &MouseEvent) -> Option<InputEvent> {
        Some(InputEvent::PointerDown {
            button: MouseButton::from_web_button(e.button())?,
            x: e.client_x() as f32,
            y: e.client_y() as f32,
            modifiers: Modifiers { shift: e.shift_key(), ctrl: e.ctrl_key(), meta: e.meta_key() },
        })
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::PointerMove { x: e.client_x() as f32, y: e.client_y() as f32 }
    }

    pub fn mouse_up_to_input(e: &MouseEvent) -> Option<InputEvent> {
        Some(InputEvent::PointerUp { button: MouseButton::from_web_button(e.button())? })
    }

    pub fn wheel_to_input(e: &WheelEvent) -> InputEvent {
        InputEvent::Wheel { delta_y: e.delta_y() as f32 }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;
    use winit::event::{ElementState, MouseScrollDelta};
    use winit::keyboard::ModifiersState;

    pub fn button(button: winit::event::MouseButton) -> Option<MouseButton> {
        match button {
            winit::event::MouseButton::Left => Some(MouseButton::Left),
            winit::event::MouseButton::Right => Some(MouseButton::Right),
            winit::event::MouseButton::Middle => Some(MouseButton::Middle),
            _ => None,
        }
    }

    pub fn modifiers(state: ModifiersState) -> Modifiers {
        Modifiers {
            shift: state.shift_key(),
            ctrl: state.control_key(),
            meta: state.super_key(),
        }
    }

    /// Winit reports button state without a position, so the last cursor
    /// position is threaded through by the caller.
    pub fn mouse_input_to_input(
        state: ElementState,
        button: winit::event::MouseButton,
        cursor: (f32, f32),
        mods: ModifiersState,
    ) -> Option<InputEvent> {
        let button = self::button(button)?;
        Some(match state {
            ElementState::Pressed => InputEvent::PointerDown {
                button,
                x: cursor.0,
                y: cursor.1,
                modifiers: modifiers(mods),
            },
            ElementState::Released => InputEvent::PointerUp { button },
        })
    }

    /// Winit's line delta is positive when scrolling up, the web's deltaY is
    /// positive when scrolling down.
    pub fn scroll_to_input(delta: MouseScrollDelta) -> InputEvent {
        let delta_y = match delta {
            MouseScrollDelta::LineDelta(_, y) => -y * 100.0,
            MouseScrollDelta::PixelDelta(p) => -p.y as f32,
        };
        InputEvent::Wheel { delta_y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_buttons() {
        assert_eq!(MouseButton::from_web_button(0), Some(MouseButton::Left));
        assert_eq!(MouseButton::from_web_button(1), Some(MouseButton::Middle));
        assert_eq!(MouseButton::from_web_button(2), Some(MouseButton::Right));
        assert_eq!(MouseButton::from_web_button(3), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_scroll_direction_matches_web() {
        let up = native::scroll_to_input(winit::event::MouseScrollDelta::LineDelta(0.0, 1.0));
        assert_eq!(up, InputEvent::Wheel { delta_y: -100.0 });
    }
}
