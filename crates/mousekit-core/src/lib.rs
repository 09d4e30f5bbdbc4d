//! mousekit-core: platform-agnostic mouse control and mouse event façades.
//!
//! Design goal: keep this crate free of any OS facility.
//! Native backends and the platform selector live in `mousekit-platform`.
//!
//! ## Module Structure
//!
//! - `error` - Common error types
//! - `button` - Button identifiers and press/release phases
//! - `codes` - Button code tables (button × phase → native code)
//! - `control` - The control façade trait
//! - `listener` - The event façade: handlers, dispatcher, listener thread
//! - `config` - Listener and control configuration
//! - `virtual_device` - Display-less backends for tests and dry runs

mod button;
mod config;
mod control;
mod error;
mod listener;

pub mod codes;
pub mod virtual_device;

pub use button::{Button, Phase};
pub use codes::ButtonCodeTable;
pub use config::{ControlConfig, ListenerConfig};
pub use control::MouseControl;
pub use error::{MouseError, MouseResult};
pub use listener::{
    ChannelHandler, Dispatcher, HandlerFault, HookBackend, Listener, ListenerHandle,
    ListenerState, MouseHandler, PointerEvent,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cursor position in physical pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Size of the primary display in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Validate a size reported by native call `op`. Both sides must be
    /// positive; a zero or negative side means no usable display.
    pub fn from_native(op: &'static str, width: i64, height: i64) -> MouseResult<Self> {
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(Self::new(w, h)),
            _ => Err(MouseError::native(
                op,
                format!("primary display size unavailable ({width}x{height})"),
            )),
        }
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
