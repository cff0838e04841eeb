//! Observations returned by the control daemon.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Key, MouseButton};

/// Errors raised when an observation payload violates its invariants.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ObservationError {
    /// Raised when the daemon returns an empty screenshot payload.
    #[error("screenshot payload is empty")]
    EmptyScreenshot,
    /// Raised when a mouse state lists no buttons.
    #[error("mouse state reports no buttons")]
    EmptyButtons,
    /// Raised when a keyboard state lists no keys.
    #[error("keyboard state reports no keys")]
    EmptyKeys,
    /// Raised when a base64 screenshot cannot be decoded.
    #[error("screenshot payload is not valid base64: {0}")]
    Decode(String),
}

/// Representation requested for a screenshot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScreenshotFormat {
    /// Raw image bytes; transported as base64 and decoded locally.
    #[default]
    Bytes,
    /// Base64 text exactly as sent by the daemon.
    Base64,
    /// Path of the image file written on the daemon's host.
    Path,
}

impl ScreenshotFormat {
    /// Value of the `format` query parameter.
    #[must_use]
    pub const fn wire_value(self) -> &'static str {
        match self {
            Self::Bytes | Self::Base64 => "base64",
            Self::Path => "path",
        }
    }
}

impl fmt::Display for ScreenshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Bytes => "bytes",
            Self::Base64 => "base64",
            Self::Path => "path",
        };
        f.write_str(label)
    }
}

/// Image captured from one display.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Screenshot {
    /// Decoded image bytes.
    Bytes(Vec<u8>),
    /// Base64 encoded image.
    Encoded(String),
    /// Location of the image on the daemon's host.
    Path(Utf8PathBuf),
}

impl Screenshot {
    /// Converts the daemon's `screenshot` field into the requested form.
    ///
    /// # Errors
    ///
    /// Returns [`ObservationError::EmptyScreenshot`] for an empty payload and
    /// [`ObservationError::Decode`] when `Bytes` was requested and the
    /// payload is not base64.
    pub fn from_wire(format: ScreenshotFormat, payload: String) -> Result<Self, ObservationError> {
        if payload.is_empty() {
            return Err(ObservationError::EmptyScreenshot);
        }
        match format {
            ScreenshotFormat::Bytes => STANDARD
                .decode(payload.as_bytes())
                .map(Self::Bytes)
                .map_err(|err| ObservationError::Decode(err.to_string())),
            ScreenshotFormat::Base64 => Ok(Self::Encoded(payload)),
            ScreenshotFormat::Path => Ok(Self::Path(Utf8PathBuf::from(payload))),
        }
    }

    /// Returns the image bytes, decoding base64 when needed. Path screenshots
    /// have no local bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ObservationError::Decode`] for malformed base64.
    pub fn to_bytes(&self) -> Result<Option<Vec<u8>>, ObservationError> {
        match self {
            Self::Bytes(bytes) => Ok(Some(bytes.clone())),
            Self::Encoded(text) => STANDARD
                .decode(text.as_bytes())
                .map(Some)
                .map_err(|err| ObservationError::Decode(err.to_string())),
            Self::Path(_) => Ok(None),
        }
    }
}

/// Pointer position and button states.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MouseState {
    /// Pressed state per button.
    pub buttons: BTreeMap<MouseButton, bool>,
    /// Pointer position as `(x, y)`.
    pub position: (i32, i32),
}

impl MouseState {
    /// Ensures at least one button is reported.
    ///
    /// # Errors
    ///
    /// Returns [`ObservationError::EmptyButtons`] when `buttons` is empty.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.buttons.is_empty() {
            return Err(ObservationError::EmptyButtons);
        }
        Ok(())
    }

    /// Returns `true` when `button` is reported as held.
    #[must_use]
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.buttons.get(&button).copied().unwrap_or(false)
    }
}

/// Pressed state of every key the daemon tracks.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyboardState {
    /// Pressed state per key.
    pub keys: BTreeMap<Key, bool>,
}

impl KeyboardState {
    /// Ensures at least one key is reported.
    ///
    /// # Errors
    ///
    /// Returns [`ObservationError::EmptyKeys`] when `keys` is empty.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.keys.is_empty() {
            return Err(ObservationError::EmptyKeys);
        }
        Ok(())
    }

    /// Keys currently held down, in key order.
    pub fn pressed(&self) -> impl Iterator<Item = &Key> {
        self.keys
            .iter()
            .filter_map(|(key, pressed)| pressed.then_some(key))
    }
}

/// Any value the daemon can report about the environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Observation {
    /// See [`Screenshot`].
    Screenshot(Screenshot),
    /// See [`MouseState`].
    MouseState(MouseState),
    /// See [`KeyboardState`].
    KeyboardState(KeyboardState),
}
