//! Mouse control façade.
//!
//! Every control backend implements [`MouseControl`]. `click` and the raw
//! integer entry points are provided methods, so backends only supply the
//! primitive operations.
//!
//! Backends are `Send + Sync`, but callers must not interleave control calls
//! on one backend from several threads and expect atomic press/release pairs:
//! each call is serialized on its own, sequences are not.

use crate::{Button, MouseResult, Point, ScreenSize};
use std::thread;
use std::time::Duration;
use tracing::trace;

/// Trait for synthesizing mouse input and querying pointer state.
pub trait MouseControl: Send + Sync {
    /// Move the cursor to the absolute position (x, y).
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()>;

    /// Move to (x, y), then synthesize a button-down.
    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()>;

    /// Move to (x, y), then synthesize a button-up.
    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()>;

    /// Current cursor position, queried live.
    fn position(&self) -> MouseResult<Point>;

    /// Current primary display size, queried live.
    fn screen_size(&self) -> MouseResult<ScreenSize>;

    /// Pause inserted between the two halves of [`MouseControl::click`].
    fn click_delay(&self) -> Option<Duration> {
        None
    }

    /// Press then release `button` at (x, y).
    fn click(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        self.press(x, y, button)?;
        if let Some(delay) = self.click_delay() {
            trace!(?delay, "click delay");
            thread::sleep(delay);
        }
        self.release(x, y, button)
    }

    /// [`MouseControl::press`] with a raw button code (1 = left, 2 = right, 3 = middle).
    fn press_code(&self, x: i32, y: i32, code: u8) -> MouseResult<()> {
        let button = Button::try_from(code)?;
        self.press(x, y, button)
    }

    /// [`MouseControl::release`] with a raw button code.
    fn release_code(&self, x: i32, y: i32, code: u8) -> MouseResult<()> {
        let button = Button::try_from(code)?;
        self.release(x, y, button)
    }

    /// [`MouseControl::click`] with a raw button code.
    fn click_code(&self, x: i32, y: i32, code: u8) -> MouseResult<()> {
        let button = Button::try_from(code)?;
        self.click(x, y, button)
    }
}

impl<T: MouseControl + ?Sized> MouseControl for Box<T> {
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        (**self).move_to(x, y)
    }

    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        (**self).press(x, y, button)
    }

    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        (**self).release(x, y, button)
    }

    fn position(&self) -> MouseResult<Point> {
        (**self).position()
    }

    fn screen_size(&self) -> MouseResult<ScreenSize> {
        (**self).screen_size()
    }

    fn click_delay(&self) -> Option<Duration> {
        (**self).click_delay()
    }

    fn click(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        (**self).click(x, y, button)
    }
}
