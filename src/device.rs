//! Keyboard and mouse primitives plus the composite gestures built on them.
//!
//! Implementors provide six primitive operations. Composite gestures are
//! provided methods that issue primitives in a fixed order with fixed pauses.
//! A composite attempts every step even after a failure and reports the first
//! error once all steps have run, so a chord is always released.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::action::{Click, DEFAULT_PRESS_DURATION, DoubleClick, Drag, Key, MouseButton};

/// Future returned by device operations.
pub type DeviceFuture<'a, E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'a>>;

/// A keyboard and mouse that can be driven remotely.
pub trait InputDevice: Sync {
    /// Error reported by primitive operations.
    type Error: std::error::Error + Send + 'static;

    /// Presses `key` without releasing it.
    fn key_down<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, Self::Error>;

    /// Releases `key`.
    fn key_up<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, Self::Error>;

    /// Moves the pointer to `(x, y)` over `duration`.
    fn mouse_move(&self, x: i32, y: i32, duration: Duration) -> DeviceFuture<'_, Self::Error>;

    /// Scrolls the wheel by `amount`.
    fn mouse_scroll(&self, amount: f64) -> DeviceFuture<'_, Self::Error>;

    /// Presses `button` without releasing it.
    fn mouse_button_down(&self, button: MouseButton) -> DeviceFuture<'_, Self::Error>;

    /// Releases `button`.
    fn mouse_button_up(&self, button: MouseButton) -> DeviceFuture<'_, Self::Error>;

    /// Key down, hold for `duration`, key up.
    fn key_press<'a>(&'a self, key: &'a Key, duration: Duration) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("key_press");
            steps.record(self.key_down(key).await);
            sleep(duration).await;
            steps.record(self.key_up(key).await);
            steps.finish()
        })
    }

    /// Key down for each key, in order.
    fn keys_down<'a>(&'a self, keys: &'a [Key]) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("keys_down");
            for key in keys {
                steps.record(self.key_down(key).await);
            }
            steps.finish()
        })
    }

    /// Key up for each key, in order.
    fn keys_release<'a>(&'a self, keys: &'a [Key]) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("keys_release");
            for key in keys {
                steps.record(self.key_up(key).await);
            }
            steps.finish()
        })
    }

    /// Presses every key in order, then releases them in reverse order.
    fn hotkey<'a>(&'a self, keys: &'a [Key]) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("hotkey");
            for key in keys {
                steps.record(self.key_down(key).await);
            }
            for key in keys.iter().rev() {
                steps.record(self.key_up(key).await);
            }
            steps.finish()
        })
    }

    /// Presses the key for each character of `text` with the default hold
    /// time.
    fn type_text<'a>(&'a self, text: &'a str) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("type_text");
            for ch in text.chars() {
                let key = Key::for_char(ch);
                steps.record(self.key_press(&key, DEFAULT_PRESS_DURATION).await);
            }
            steps.finish()
        })
    }

    /// Move, button down, hold, button up.
    fn click<'a>(&'a self, click: &'a Click) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("click");
            steps.record(self.mouse_move(click.x, click.y, click.move_duration).await);
            steps.record(self.mouse_button_down(click.button).await);
            sleep(click.press_duration).await;
            steps.record(self.mouse_button_up(click.button).await);
            steps.finish()
        })
    }

    /// Click, pause for the interval, click again.
    fn double_click<'a>(&'a self, double: &'a DoubleClick) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("double_click");
            steps.record(self.click(&double.click).await);
            sleep(double.interval).await;
            steps.record(self.click(&double.click).await);
            steps.finish()
        })
    }

    /// Move to start, button down, move to end, button up.
    fn drag<'a>(&'a self, drag: &'a Drag) -> DeviceFuture<'a, Self::Error> {
        Box::pin(async move {
            let mut steps = Steps::new("drag");
            steps.record(
                self.mouse_move(drag.start_x, drag.start_y, drag.move_duration)
                    .await,
            );
            steps.record(self.mouse_button_down(drag.button).await);
            steps.record(self.mouse_move(drag.end_x, drag.end_y, drag.move_duration).await);
            steps.record(self.mouse_button_up(drag.button).await);
            steps.finish()
        })
    }
}

/// Keeps the first failure of a composite while later steps still run.
struct Steps<E> {
    gesture: &'static str,
    first_error: Option<E>,
}

impl<E: Display> Steps<E> {
    const fn new(gesture: &'static str) -> Self {
        Self {
            gesture,
            first_error: None,
        }
    }

    fn record(&mut self, result: Result<(), E>) {
        let Err(err) = result else {
            return;
        };
        debug!(gesture = self.gesture, error = %err, "gesture step failed");
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    fn finish(self) -> Result<(), E> {
        self.first_error.map_or(Ok(()), Err)
    }
}
