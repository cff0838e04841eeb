//! Typed input-device and shell actions understood by the control daemon.
//!
//! Every action is an immutable value that serialises to the JSON body posted
//! to the daemon. The `action_type` tag identifies the variant on the wire.
//! Durations travel as fractional seconds and are rejected during
//! deserialisation when negative or not finite.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default time the pointer takes to travel to its target.
pub const DEFAULT_MOVE_DURATION: Duration = Duration::from_millis(500);

/// Default time a key or mouse button is held down.
pub const DEFAULT_PRESS_DURATION: Duration = Duration::from_millis(100);

/// Default pause between the two clicks of a double click.
pub const DEFAULT_DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(100);

/// Errors raised when an action fails local validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ActionError {
    /// Raised when a key name is empty or whitespace.
    #[error("key name must not be empty")]
    EmptyKey,
    /// Raised when a multi-key action carries no keys.
    #[error("{action_type} requires at least one key")]
    EmptyKeys {
        /// Wire tag of the offending action.
        action_type: &'static str,
    },
    /// Raised when a shell command is blank.
    #[error("shell command must not be empty")]
    EmptyCommand,
    /// Raised when a scroll amount is NaN or infinite.
    #[error("scroll amount must be finite, got {amount}")]
    NonFiniteScroll {
        /// Rejected amount.
        amount: String,
    },
}

/// Name of a keyboard key as understood by the daemon (for example `enter`,
/// `ctrl`, `a`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Builds a key from its daemon name.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::EmptyKey`] when the name is blank.
    pub fn new(name: impl Into<String>) -> Result<Self, ActionError> {
        let key = Self(name.into());
        key.validate()?;
        Ok(key)
    }

    /// Maps a typed character onto the key that produces it.
    #[must_use]
    pub fn for_char(ch: char) -> Self {
        match ch {
            ' ' => Self(String::from("space")),
            '\n' | '\r' => Self(String::from("enter")),
            '\t' => Self(String::from("tab")),
            other => Self(other.to_string()),
        }
    }

    /// Returns the daemon name of the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.0.trim().is_empty() {
            return Err(ActionError::EmptyKey);
        }
        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mouse button identifiers.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    /// Primary button.
    #[default]
    Left,
    /// Secondary button.
    Right,
    /// Wheel button.
    Middle,
}

impl MouseButton {
    /// Returns the wire name of the button.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presses a key without releasing it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyDown {
    /// Key to press.
    pub key: Key,
}

/// Releases a previously pressed key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyUp {
    /// Key to release.
    pub key: Key,
}

/// Presses and releases a key after holding it for `duration`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    /// Key to press.
    pub key: Key,
    /// Hold time between press and release.
    #[serde(with = "secs", default = "default_press_duration")]
    pub duration: Duration,
}

impl KeyPress {
    /// Builds a key press with the default hold time.
    #[must_use]
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            duration: DEFAULT_PRESS_DURATION,
        }
    }
}

/// Presses several keys in order without releasing them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeysDown {
    /// Keys to press, in order.
    pub keys: Vec<Key>,
}

/// Releases several keys in order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeysRelease {
    /// Keys to release, in order.
    pub keys: Vec<Key>,
}

/// Presses keys in order and releases them in reverse order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Hotkey {
    /// Keys making up the chord, in press order.
    pub keys: Vec<Key>,
}

/// Types a string one character at a time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeText {
    /// Text to type.
    pub text: String,
}

/// Moves the pointer to an absolute screen position.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MouseMove {
    /// Target column.
    pub x: i32,
    /// Target row.
    pub y: i32,
    /// Travel time.
    #[serde(
        rename = "move_duration",
        with = "secs",
        default = "default_move_duration"
    )]
    pub duration: Duration,
}

impl MouseMove {
    /// Builds a move with the default travel time.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            duration: DEFAULT_MOVE_DURATION,
        }
    }
}

/// Scrolls the wheel by `amount` notches (negative scrolls down).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouseScroll {
    /// Signed scroll distance.
    pub amount: f64,
}

/// Presses a mouse button without releasing it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonDown {
    /// Button to press.
    #[serde(default)]
    pub button: MouseButton,
}

/// Releases a mouse button.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MouseButtonUp {
    /// Button to release.
    #[serde(default)]
    pub button: MouseButton,
}

/// Moves to a position and clicks once.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Click {
    /// Target column.
    pub x: i32,
    /// Target row.
    pub y: i32,
    /// Travel time to the target.
    #[serde(with = "secs", default = "default_move_duration")]
    pub move_duration: Duration,
    /// Hold time between button down and up.
    #[serde(with = "secs", default = "default_press_duration")]
    pub press_duration: Duration,
    /// Button to click.
    #[serde(default)]
    pub button: MouseButton,
}

impl Click {
    /// Builds a left click at `(x, y)` with default timings.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            move_duration: DEFAULT_MOVE_DURATION,
            press_duration: DEFAULT_PRESS_DURATION,
            button: MouseButton::Left,
        }
    }

    /// Overrides the button.
    #[must_use]
    pub const fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// Overrides the travel time.
    #[must_use]
    pub const fn with_move_duration(mut self, duration: Duration) -> Self {
        self.move_duration = duration;
        self
    }

    /// Overrides the hold time.
    #[must_use]
    pub const fn with_press_duration(mut self, duration: Duration) -> Self {
        self.press_duration = duration;
        self
    }
}

/// Two identical clicks separated by `interval`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DoubleClick {
    /// Parameters shared by both clicks.
    #[serde(flatten)]
    pub click: Click,
    /// Pause between the clicks.
    #[serde(
        rename = "double_click_interval_seconds",
        with = "secs",
        default = "default_double_click_interval"
    )]
    pub interval: Duration,
}

impl DoubleClick {
    /// Builds a double click at `(x, y)` with default timings.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            click: Click::new(x, y),
            interval: DEFAULT_DOUBLE_CLICK_INTERVAL,
        }
    }
}

/// Presses a button at one position and releases it at another.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Drag {
    /// Start column.
    pub start_x: i32,
    /// Start row.
    pub start_y: i32,
    /// End column.
    pub end_x: i32,
    /// End row.
    pub end_y: i32,
    /// Travel time for each of the two moves.
    #[serde(with = "secs", default = "default_move_duration")]
    pub move_duration: Duration,
    /// Button held during the drag.
    #[serde(default)]
    pub button: MouseButton,
}

impl Drag {
    /// Builds a left-button drag between two points with default timing.
    #[must_use]
    pub const fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        Self {
            start_x: start.0,
            start_y: start.1,
            end_x: end.0,
            end_y: end.1,
            move_duration: DEFAULT_MOVE_DURATION,
            button: MouseButton::Left,
        }
    }
}

/// Runs a shell command inside the provisioned resource.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShellCommand {
    /// Command line handed to the daemon's shell.
    pub command: String,
    /// Upper bound on execution time; `None` waits for completion.
    #[serde(with = "opt_secs", default)]
    pub timeout: Option<Duration>,
}

impl ShellCommand {
    /// Builds a command without a timeout.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Sets the execution timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Every operation the daemon can be asked to perform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type")]
pub enum Action {
    /// See [`KeyDown`].
    #[serde(rename = "key_down")]
    KeyDown(KeyDown),
    /// See [`KeyUp`].
    #[serde(rename = "key_up")]
    KeyUp(KeyUp),
    /// See [`KeyPress`].
    #[serde(rename = "key_press")]
    KeyPress(KeyPress),
    /// See [`KeysDown`].
    #[serde(rename = "keys_down")]
    KeysDown(KeysDown),
    /// See [`KeysRelease`].
    #[serde(rename = "keys_release")]
    KeysRelease(KeysRelease),
    /// See [`Hotkey`].
    #[serde(rename = "hotkey")]
    Hotkey(Hotkey),
    /// See [`TypeText`].
    #[serde(rename = "type")]
    TypeText(TypeText),
    /// See [`MouseMove`].
    #[serde(rename = "mouse_move")]
    MouseMove(MouseMove),
    /// See [`MouseScroll`].
    #[serde(rename = "mouse_scroll")]
    MouseScroll(MouseScroll),
    /// See [`MouseButtonDown`].
    #[serde(rename = "mouse_button_down")]
    MouseButtonDown(MouseButtonDown),
    /// See [`MouseButtonUp`].
    #[serde(rename = "mouse_button_up")]
    MouseButtonUp(MouseButtonUp),
    /// See [`Click`].
    #[serde(rename = "click")]
    Click(Click),
    /// See [`DoubleClick`].
    #[serde(rename = "double_click")]
    DoubleClick(DoubleClick),
    /// See [`Drag`].
    #[serde(rename = "drag")]
    Drag(Drag),
    /// See [`ShellCommand`].
    #[serde(rename = "command")]
    ShellCommand(ShellCommand),
}

impl Action {
    /// Returns the `action_type` tag used on the wire.
    #[must_use]
    pub const fn action_type(&self) -> &'static str {
        match self {
            Self::KeyDown(_) => "key_down",
            Self::KeyUp(_) => "key_up",
            Self::KeyPress(_) => "key_press",
            Self::KeysDown(_) => "keys_down",
            Self::KeysRelease(_) => "keys_release",
            Self::Hotkey(_) => "hotkey",
            Self::TypeText(_) => "type",
            Self::MouseMove(_) => "mouse_move",
            Self::MouseScroll(_) => "mouse_scroll",
            Self::MouseButtonDown(_) => "mouse_button_down",
            Self::MouseButtonUp(_) => "mouse_button_up",
            Self::Click(_) => "click",
            Self::DoubleClick(_) => "double_click",
            Self::Drag(_) => "drag",
            Self::ShellCommand(_) => "command",
        }
    }

    /// Returns `true` for actions defined as a sequence of primitive actions.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::KeyPress(_)
                | Self::KeysDown(_)
                | Self::KeysRelease(_)
                | Self::Hotkey(_)
                | Self::TypeText(_)
                | Self::Click(_)
                | Self::DoubleClick(_)
                | Self::Drag(_)
        )
    }

    /// Checks the invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Self::KeyDown(KeyDown { key })
            | Self::KeyUp(KeyUp { key })
            | Self::KeyPress(KeyPress { key, .. }) => key.validate(),
            Self::KeysDown(KeysDown { keys })
            | Self::KeysRelease(KeysRelease { keys })
            | Self::Hotkey(Hotkey { keys }) => {
                if keys.is_empty() {
                    return Err(ActionError::EmptyKeys {
                        action_type: self.action_type(),
                    });
                }
                keys.iter().try_for_each(Key::validate)
            }
            Self::MouseScroll(MouseScroll { amount }) if !amount.is_finite() => {
                Err(ActionError::NonFiniteScroll {
                    amount: amount.to_string(),
                })
            }
            Self::ShellCommand(ShellCommand { command, .. }) if command.trim().is_empty() => {
                Err(ActionError::EmptyCommand)
            }
            _ => Ok(()),
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Action {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(
    KeyDown,
    KeyUp,
    KeyPress,
    KeysDown,
    KeysRelease,
    Hotkey,
    TypeText,
    MouseMove,
    MouseScroll,
    MouseButtonDown,
    MouseButtonUp,
    Click,
    DoubleClick,
    Drag,
    ShellCommand,
);

const fn default_move_duration() -> Duration {
    DEFAULT_MOVE_DURATION
}

const fn default_press_duration() -> Duration {
    DEFAULT_PRESS_DURATION
}

const fn default_double_click_interval() -> Duration {
    DEFAULT_DOUBLE_CLICK_INTERVAL
}

/// Serialises a [`Duration`] as fractional seconds.
mod secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(raw)
            .map_err(|err| D::Error::custom(format!("invalid duration {raw}: {err}")))
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|raw| {
                Duration::try_from_secs_f64(raw)
                    .map_err(|err| D::Error::custom(format!("invalid timeout {raw}: {err}")))
            })
            .transpose()
    }
}
