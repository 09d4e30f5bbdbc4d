//! Host platform detection and backend construction.
//!
//! Each family's backends are compiled only for their own target, so a
//! family that is recognized but not compiled in fails with
//! `UnsupportedPlatform` instead of falling back to another one.

use mousekit_core::{
    ControlConfig, HookBackend, Listener, MouseControl, MouseError, MouseHandler, MouseResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    /// X11 through XTest (control) and XRecord (events).
    X11,
}

impl Platform {
    /// Map an OS identifier as reported by `std::env::consts::OS`.
    pub fn from_os_name(name: &str) -> MouseResult<Self> {
        match name {
            "windows" => Ok(Platform::Windows),
            "macos" => Ok(Platform::MacOs),
            "linux" => Ok(Platform::X11),
            other => Err(MouseError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// The family of the running host.
    pub fn detect() -> MouseResult<Self> {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::MacOs => "macos",
            Platform::X11 => "x11",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(target_os = "windows")]
pub type SystemMouse = crate::control::WindowsMouse;
#[cfg(target_os = "macos")]
pub type SystemMouse = crate::control::QuartzMouse;
#[cfg(target_os = "linux")]
pub type SystemMouse = crate::control::EnigoMouse;

#[cfg(target_os = "windows")]
pub type SystemHook = crate::hook::WindowsHook;
#[cfg(target_os = "macos")]
pub type SystemHook = crate::hook::QuartzHook;
#[cfg(target_os = "linux")]
pub type SystemHook = crate::hook::RdevHook;

/// Build the control backend of `platform`.
#[cfg_attr(
    not(any(target_os = "windows", target_os = "macos", target_os = "linux")),
    allow(unused_variables)
)]
pub fn open_mouse(platform: Platform, config: ControlConfig) -> MouseResult<Box<dyn MouseControl>> {
    let mouse: Box<dyn MouseControl> = match platform {
        #[cfg(target_os = "windows")]
        Platform::Windows => Box::new(crate::control::WindowsMouse::with_config(config)?),
        #[cfg(target_os = "macos")]
        Platform::MacOs => Box::new(crate::control::QuartzMouse::with_config(config)?),
        #[cfg(target_os = "linux")]
        Platform::X11 => Box::new(crate::control::EnigoMouse::with_config(config)?),
        #[allow(unreachable_patterns)]
        other => return Err(not_compiled(other)),
    };
    info!(platform = %platform, "Mouse control backend ready");
    Ok(mouse)
}

/// Build the event backend of `platform`. Nothing is installed until the
/// listener starts.
pub fn open_hook(platform: Platform) -> MouseResult<Box<dyn HookBackend>> {
    let hook: Box<dyn HookBackend> = match platform {
        #[cfg(target_os = "windows")]
        Platform::Windows => Box::new(crate::hook::WindowsHook::new()),
        #[cfg(target_os = "macos")]
        Platform::MacOs => Box::new(crate::hook::QuartzHook::new()),
        #[cfg(target_os = "linux")]
        Platform::X11 => Box::new(crate::hook::RdevHook::new()),
        #[allow(unreachable_patterns)]
        other => return Err(not_compiled(other)),
    };
    Ok(hook)
}

fn not_compiled(platform: Platform) -> MouseError {
    MouseError::UnsupportedPlatform(format!(
        "{platform} backend is not available on {}",
        std::env::consts::OS
    ))
}

/// Control backend for the running host, with default configuration.
pub fn system_mouse() -> MouseResult<Box<dyn MouseControl>> {
    open_mouse(Platform::detect()?, ControlConfig::default())
}

/// Event backend for the running host.
pub fn system_hook() -> MouseResult<Box<dyn HookBackend>> {
    open_hook(Platform::detect()?)
}

/// A listener for the running host, ready to configure and start.
pub fn system_listener(
    handler: impl MouseHandler,
) -> MouseResult<Listener<Box<dyn HookBackend>>> {
    Ok(Listener::new(system_hook()?, handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_os_names() {
        assert_eq!(Platform::from_os_name("windows").unwrap(), Platform::Windows);
        assert_eq!(Platform::from_os_name("macos").unwrap(), Platform::MacOs);
        assert_eq!(Platform::from_os_name("linux").unwrap(), Platform::X11);
    }

    #[test]
    fn test_unknown_os_names_are_unsupported() {
        for name in ["plan9", "java", "", "Linux"] {
            match Platform::from_os_name(name) {
                Err(MouseError::UnsupportedPlatform(reported)) => assert_eq!(reported, name),
                other => panic!("expected UnsupportedPlatform for {name:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_detect_matches_build_target() {
        let detected = Platform::detect();
        if cfg!(target_os = "windows") {
            assert_eq!(detected.unwrap(), Platform::Windows);
        } else if cfg!(target_os = "macos") {
            assert_eq!(detected.unwrap(), Platform::MacOs);
        } else if cfg!(target_os = "linux") {
            assert_eq!(detected.unwrap(), Platform::X11);
        } else {
            assert!(matches!(detected, Err(MouseError::UnsupportedPlatform(_))));
        }
    }

    #[test]
    fn test_foreign_family_is_not_opened() {
        let foreign = if cfg!(target_os = "windows") {
            Platform::MacOs
        } else {
            Platform::Windows
        };
        assert!(matches!(
            open_hook(foreign),
            Err(MouseError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            open_mouse(foreign, ControlConfig::default()),
            Err(MouseError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_platform_serde_names() {
        assert_eq!(serde_json::to_string(&Platform::MacOs).unwrap(), "\"macos\"");
        assert_eq!(Platform::X11.to_string(), "x11");
    }
}
