//! Windows low-level mouse hook.
//!
//! The hook procedure runs on the listener thread whenever that thread pumps
//! its message queue, so the dispatcher lives in thread-local storage and the
//! propagate decision is returned straight to the system.

use mousekit_core::{ButtonCodeTable, Dispatcher, HookBackend, MouseError, MouseResult, PointerEvent};
use std::cell::RefCell;
use std::time::Duration;
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::{GetLastError, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, MsgWaitForMultipleObjects, PeekMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, MSG, MSLLHOOKSTRUCT, PM_REMOVE, QS_ALLINPUT,
    WH_MOUSE_LL, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE,
    WM_RBUTTONDOWN, WM_RBUTTONUP,
};

/// Hook messages reported for each transition.
pub const HOOK_MESSAGE_CODES: ButtonCodeTable<u32> = ButtonCodeTable::new(
    [WM_LBUTTONDOWN, WM_RBUTTONDOWN, WM_MBUTTONDOWN],
    [WM_LBUTTONUP, WM_RBUTTONUP, WM_MBUTTONUP],
);

thread_local! {
    static DISPATCHER: RefCell<Option<Dispatcher>> = const { RefCell::new(None) };
}

/// Event backend for `WH_MOUSE_LL`.
#[derive(Debug, Default)]
pub struct WindowsHook {
    /// `HHOOK` of the installed hook, 0 when none.
    hook: usize,
}

impl WindowsHook {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode(message: u32, x: i32, y: i32) -> Option<PointerEvent> {
    if message == WM_MOUSEMOVE {
        return Some(PointerEvent::Move { x, y });
    }
    HOOK_MESSAGE_CODES
        .decode(message)
        .map(|(button, phase)| PointerEvent::Button {
            x,
            y,
            button,
            phase,
        })
}

/// Low-level mouse hook procedure.
unsafe extern "system" fn mouse_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let info = &*(lparam as *const MSLLHOOKSTRUCT);
        if let Some(event) = decode(wparam as u32, info.pt.x, info.pt.y) {
            let propagate = DISPATCHER.with(|slot| match slot.try_borrow_mut() {
                Ok(mut slot) => slot.as_mut().map_or(true, |d| d.dispatch(event)),
                Err(_) => {
                    warn!(?event, "Re-entrant mouse hook call, passing event through");
                    true
                }
            });
            if !propagate {
                // Non-zero swallows the event.
                return 1;
            }
        }
    }

    CallNextHookEx(std::ptr::null_mut(), code, wparam, lparam)
}

impl HookBackend for WindowsHook {
    fn name(&self) -> &'static str {
        "windows-ll-hook"
    }

    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()> {
        DISPATCHER.with(|slot| *slot.borrow_mut() = Some(dispatcher));

        let hook = unsafe {
            SetWindowsHookExW(
                WH_MOUSE_LL,
                Some(mouse_hook_proc),
                GetModuleHandleW(std::ptr::null()),
                0,
            )
        };
        if hook.is_null() {
            let code = unsafe { GetLastError() };
            DISPATCHER.with(|slot| slot.borrow_mut().take());
            return Err(MouseError::native(
                "SetWindowsHookExW",
                format!("Win32 error 0x{code:08X}"),
            ));
        }

        self.hook = hook as usize;
        info!("Mouse hook installed (WH_MOUSE_LL)");
        Ok(())
    }

    fn pump(&mut self, timeout: Duration) -> MouseResult<()> {
        // Hook calls arrive as sent messages; wake as soon as one is queued.
        let wait_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        unsafe {
            MsgWaitForMultipleObjects(0, std::ptr::null(), 0, wait_ms, QS_ALLINPUT);
        }

        let mut msg: MSG = unsafe { std::mem::zeroed() };
        while unsafe { PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) } != 0 {
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        Ok(())
    }

    fn uninstall(&mut self) {
        if self.hook != 0 {
            debug!("Unhooking WH_MOUSE_LL");
            unsafe { UnhookWindowsHookEx(self.hook as _) };
            self.hook = 0;
        }
        DISPATCHER.with(|slot| slot.borrow_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mousekit_core::{Button, Phase};

    #[test]
    fn test_decode_hook_messages() {
        assert_eq!(decode(WM_MOUSEMOVE, 4, 5), Some(PointerEvent::Move { x: 4, y: 5 }));
        assert_eq!(
            decode(WM_RBUTTONUP, 1, 2),
            Some(PointerEvent::Button {
                x: 1,
                y: 2,
                button: Button::Right,
                phase: Phase::Release,
            })
        );
        assert_eq!(
            decode(WM_MBUTTONDOWN, 0, 0),
            Some(PointerEvent::press(0, 0, Button::Middle))
        );
        // Wheel messages are not observed.
        assert_eq!(decode(0x020A, 0, 0), None);
    }
}
