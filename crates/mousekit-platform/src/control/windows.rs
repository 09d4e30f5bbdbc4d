//! Windows control backend.
//!
//! Cursor moves go through `SetCursorPos`; button transitions are synthesized
//! with `SendInput` from one reused `INPUT` descriptor owned by the backend.

use mousekit_core::{
    Button, ButtonCodeTable, ControlConfig, MouseControl, MouseError, MouseResult, Phase, Point,
    ScreenSize,
};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use windows_sys::Win32::Foundation::{GetLastError, POINT};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
    MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SetCursorPos, SM_CXSCREEN, SM_CYSCREEN,
};

/// `MOUSEEVENTF_*` flags; Win32 uses distinct flags for down and up.
pub const SEND_INPUT_CODES: ButtonCodeTable<MOUSE_EVENT_FLAGS> = ButtonCodeTable::new(
    [
        MOUSEEVENTF_LEFTDOWN,
        MOUSEEVENTF_RIGHTDOWN,
        MOUSEEVENTF_MIDDLEDOWN,
    ],
    [MOUSEEVENTF_LEFTUP, MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_MIDDLEUP],
);

fn last_error(op: &'static str) -> MouseError {
    let code = unsafe { GetLastError() };
    MouseError::native(op, format!("Win32 error 0x{code:08X}"))
}

/// Control backend for the Windows message-injection API.
pub struct WindowsMouse {
    /// Only `dwFlags` changes between calls.
    input: Mutex<INPUT>,
    config: ControlConfig,
}

impl WindowsMouse {
    pub fn new() -> MouseResult<Self> {
        Self::with_config(ControlConfig::default())
    }

    pub fn with_config(config: ControlConfig) -> MouseResult<Self> {
        crate::dpi::set_dpi_aware();

        // Fails without an interactive desktop (services, locked sessions).
        let mut pt = POINT { x: 0, y: 0 };
        if unsafe { GetCursorPos(&mut pt) } == 0 {
            return Err(last_error("GetCursorPos"));
        }

        let input = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: 0,
                    dwFlags: 0,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        Ok(Self {
            input: Mutex::new(input),
            config,
        })
    }

    fn send_button(&self, button: Button, phase: Phase) -> MouseResult<()> {
        let flags = SEND_INPUT_CODES.code_for(phase, button);
        let mut input = self
            .input
            .lock()
            .map_err(|_| MouseError::native("SendInput", "input descriptor poisoned"))?;

        // SAFETY: `mi` is the active union member, `type` is INPUT_MOUSE.
        let sent = unsafe {
            input.Anonymous.mi.dwFlags = flags;
            SendInput(1, &*input, std::mem::size_of::<INPUT>() as i32)
        };
        if sent != 1 {
            return Err(last_error("SendInput"));
        }
        Ok(())
    }
}

impl MouseControl for WindowsMouse {
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        debug!(x, y, "SetCursorPos");
        if unsafe { SetCursorPos(x, y) } == 0 {
            return Err(last_error("SetCursorPos"));
        }
        Ok(())
    }

    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "injecting mouse down");
        self.move_to(x, y)?;
        self.send_button(button, Phase::Press)
    }

    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "injecting mouse up");
        self.move_to(x, y)?;
        self.send_button(button, Phase::Release)
    }

    fn position(&self) -> MouseResult<Point> {
        let mut pt = POINT { x: 0, y: 0 };
        if unsafe { GetCursorPos(&mut pt) } == 0 {
            return Err(last_error("GetCursorPos"));
        }
        Ok(Point::new(pt.x, pt.y))
    }

    fn screen_size(&self) -> MouseResult<ScreenSize> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        ScreenSize::from_native("GetSystemMetrics", width.into(), height.into())
    }

    fn click_delay(&self) -> Option<Duration> {
        self.config.click_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_input_codes() {
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Press, Button::Left), 0x0002);
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Release, Button::Left), 0x0004);
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Press, Button::Right), 0x0008);
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Release, Button::Right), 0x0010);
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Press, Button::Middle), 0x0020);
        assert_eq!(SEND_INPUT_CODES.code_for(Phase::Release, Button::Middle), 0x0040);
    }
}
