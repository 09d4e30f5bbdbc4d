//! Native input-hook backends for the listener loop.
//!
//! Platform implementations:
//! - Windows: `WH_MOUSE_LL` low-level hook pumped with `PeekMessageW` (`windows_native.rs`)
//! - macOS: `CGEventTap` on the listener thread's run loop (`macos.rs`)
//! - Linux: XRecord through a process-wide rdev listener (`rdev_impl.rs`)

#[cfg(target_os = "windows")]
mod windows_native;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod rdev_impl;

#[cfg(target_os = "windows")]
pub use windows_native::{WindowsHook, HOOK_MESSAGE_CODES};

#[cfg(target_os = "macos")]
pub use macos::{QuartzHook, TAP_EVENT_CODES};

#[cfg(target_os = "linux")]
pub use rdev_impl::RdevHook;
