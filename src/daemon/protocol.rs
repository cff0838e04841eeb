//! HTTP routes and payloads exposed by the daemon.

use reqwest::Method;
use serde::Deserialize;

use crate::action::Action;

/// One HTTP route on the daemon.
///
/// Names returned by [`Operation::name`] are stable and appear in errors and
/// logs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// `GET /health`
    Health,
    /// `GET /observation/screenshot`
    Screenshot,
    /// `GET /observation/mouse_state`
    MouseState,
    /// `GET /observation/keyboard_state`
    KeyboardState,
    /// `POST /execute/command`
    Command,
    /// `POST /execute/keyboard/key_down`
    KeyDown,
    /// `POST /execute/keyboard/key_up`
    KeyUp,
    /// `POST /execute/keyboard/key_press`
    KeyPress,
    /// `POST /execute/keyboard/keys_down`
    KeysDown,
    /// `POST /execute/keyboard/keys_release`
    KeysRelease,
    /// `POST /execute/keyboard/hotkey`
    Hotkey,
    /// `POST /execute/type`
    Type,
    /// `POST /execute/mouse/move`
    MouseMove,
    /// `POST /execute/mouse/scroll`
    MouseScroll,
    /// `POST /execute/mouse/button_down`
    MouseButtonDown,
    /// `POST /execute/mouse/button_up`
    MouseButtonUp,
    /// `POST /execute/drag`
    Drag,
}

impl Operation {
    /// Route for an action, or `None` when the daemon has no dedicated route
    /// and the action must be composed from primitives.
    #[must_use]
    pub const fn for_action(action: &Action) -> Option<Self> {
        let operation = match action {
            Action::KeyDown(_) => Self::KeyDown,
            Action::KeyUp(_) => Self::KeyUp,
            Action::KeyPress(_) => Self::KeyPress,
            Action::KeysDown(_) => Self::KeysDown,
            Action::KeysRelease(_) => Self::KeysRelease,
            Action::Hotkey(_) => Self::Hotkey,
            Action::TypeText(_) => Self::Type,
            Action::MouseMove(_) => Self::MouseMove,
            Action::MouseScroll(_) => Self::MouseScroll,
            Action::MouseButtonDown(_) => Self::MouseButtonDown,
            Action::MouseButtonUp(_) => Self::MouseButtonUp,
            Action::Drag(_) => Self::Drag,
            Action::ShellCommand(_) => Self::Command,
            Action::Click(_) | Action::DoubleClick(_) => return None,
        };
        Some(operation)
    }

    /// Stable identifier used in errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Health => "health_check",
            Self::Screenshot => "get_screenshot",
            Self::MouseState => "get_mouse_state",
            Self::KeyboardState => "get_keyboard_state",
            Self::Command => "execute_command",
            Self::KeyDown => "execute_keyboard_key_down",
            Self::KeyUp => "execute_keyboard_key_up",
            Self::KeyPress => "execute_keyboard_key_press",
            Self::KeysDown => "execute_keyboard_keys_down",
            Self::KeysRelease => "execute_keyboard_keys_release",
            Self::Hotkey => "execute_keyboard_hotkey",
            Self::Type => "execute_type",
            Self::MouseMove => "execute_mouse_move",
            Self::MouseScroll => "execute_mouse_scroll",
            Self::MouseButtonDown => "execute_mouse_button_down",
            Self::MouseButtonUp => "execute_mouse_button_up",
            Self::Drag => "execute_drag",
        }
    }

    /// Request path relative to the daemon root.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Health => "/health",
            Self::Screenshot => "/observation/screenshot",
            Self::MouseState => "/observation/mouse_state",
            Self::KeyboardState => "/observation/keyboard_state",
            Self::Command => "/execute/command",
            Self::KeyDown => "/execute/keyboard/key_down",
            Self::KeyUp => "/execute/keyboard/key_up",
            Self::KeyPress => "/execute/keyboard/key_press",
            Self::KeysDown => "/execute/keyboard/keys_down",
            Self::KeysRelease => "/execute/keyboard/keys_release",
            Self::Hotkey => "/execute/keyboard/hotkey",
            Self::Type => "/execute/type",
            Self::MouseMove => "/execute/mouse/move",
            Self::MouseScroll => "/execute/mouse/scroll",
            Self::MouseButtonDown => "/execute/mouse/button_down",
            Self::MouseButtonUp => "/execute/mouse/button_up",
            Self::Drag => "/execute/drag",
        }
    }

    /// HTTP method of the route.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Health | Self::Screenshot | Self::MouseState | Self::KeyboardState => {
                Method::GET
            }
            _ => Method::POST,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Deserialize)]
pub(crate) struct HealthResponse {
    pub(crate) healthy: bool,
}

/// Body returned by every `POST /execute/...` route.
#[derive(Debug, Deserialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

/// Body of `GET /observation/screenshot`.
#[derive(Debug, Deserialize)]
pub(crate) struct ScreenshotResponse {
    pub(crate) screenshot: String,
}

/// Body of a `422 Unprocessable Entity` reply.
#[derive(Debug, Deserialize)]
pub(crate) struct ValidationBody {
    pub(crate) detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Click, DoubleClick, Drag, ShellCommand};

    #[test]
    fn composite_clicks_have_no_route() {
        assert_eq!(Operation::for_action(&Click::new(1, 1).into()), None);
        assert_eq!(Operation::for_action(&DoubleClick::new(1, 1).into()), None);
    }

    #[test]
    fn drag_and_command_have_dedicated_routes() {
        assert_eq!(
            Operation::for_action(&Drag::new((0, 0), (1, 1)).into()),
            Some(Operation::Drag)
        );
        assert_eq!(
            Operation::for_action(&ShellCommand::new("ls").into()),
            Some(Operation::Command)
        );
        assert_eq!(Operation::Command.method(), Method::POST);
        assert_eq!(Operation::Health.method(), Method::GET);
    }
}
