//! Native control backends.
//!
//! Platform implementations:
//! - Windows: `SetCursorPos` + `SendInput` (`windows.rs`)
//! - macOS: Quartz `CGEvent` posting (`macos.rs`)
//! - Linux: XTest through enigo (`enigo_impl.rs`)

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod enigo_impl;

#[cfg(target_os = "windows")]
pub use windows::{WindowsMouse, SEND_INPUT_CODES};

#[cfg(target_os = "macos")]
pub use macos::{QuartzMouse, QUARTZ_CODES};

#[cfg(target_os = "linux")]
pub use enigo_impl::{EnigoMouse, ENIGO_CODES};
