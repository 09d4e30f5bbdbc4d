//! mousekit-platform: native backends behind the mousekit façades.
//!
//! This crate provides:
//! - Mouse control (move, press, release, position, screen size) per OS family
//! - Global mouse hooks feeding the listener loop, with optional capture
//! - Platform detection and backend construction
//!
//! ## Module Structure
//!
//! - `control` - Control backends (`SendInput`, Quartz events, XTest via enigo)
//! - `hook` - Hook backends (`WH_MOUSE_LL`, `CGEventTap`, XRecord via rdev)
//! - `selector` - `Platform` detection and `system_*` constructors
//! - `dpi` - Windows DPI awareness
//!
//! ```no_run
//! use mousekit_platform::{system_mouse, Button, MouseControl};
//!
//! let mouse = system_mouse()?;
//! let size = mouse.screen_size()?;
//! mouse.click(size.width as i32 / 2, size.height as i32 / 2, Button::Left)?;
//! # Ok::<(), mousekit_platform::MouseError>(())
//! ```

mod control;
mod hook;
mod selector;

#[cfg(target_os = "windows")]
mod dpi;

// Re-export the façade so callers need a single dependency
pub use mousekit_core::{
    codes, virtual_device, Button, ButtonCodeTable, ChannelHandler, ControlConfig, Dispatcher,
    HandlerFault, HookBackend, Listener, ListenerConfig, ListenerHandle, ListenerState,
    MouseControl, MouseError, MouseHandler, MouseResult, Phase, Point, PointerEvent, ScreenSize,
};

// Re-export selector
pub use selector::{open_hook, open_mouse, system_hook, system_listener, system_mouse, Platform};

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub use selector::{SystemHook, SystemMouse};

// Re-export native backends
#[cfg(target_os = "windows")]
pub use control::{WindowsMouse, SEND_INPUT_CODES};
#[cfg(target_os = "windows")]
pub use hook::{WindowsHook, HOOK_MESSAGE_CODES};

#[cfg(target_os = "macos")]
pub use control::{QuartzMouse, QUARTZ_CODES};
#[cfg(target_os = "macos")]
pub use hook::{QuartzHook, TAP_EVENT_CODES};

#[cfg(target_os = "linux")]
pub use control::{EnigoMouse, ENIGO_CODES};
#[cfg(target_os = "linux")]
pub use hook::RdevHook;
