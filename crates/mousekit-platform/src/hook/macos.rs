//! macOS event tap.
//!
//! The tap is attached to the listener thread's `CFRunLoop`; `pump` runs that
//! loop for one poll interval, during which the tap callback dispatches
//! events synchronously. Returning NULL from the callback swallows an event,
//! which needs an active (non listen-only) tap, so capture picks the tap
//! options.
//!
//! Creating the tap fails when the process lacks the Accessibility (or
//! Input Monitoring) permission.

use core_foundation::base::TCFType;
use core_foundation::runloop::{
    kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop, CFRunLoopSource,
};
use core_graphics::event::{CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement};
use mousekit_core::{
    Button, ButtonCodeTable, Dispatcher, HookBackend, MouseError, MouseResult, PointerEvent,
};
use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::time::Duration;
use tracing::{debug, info, warn};

type CFMachPortRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFAllocatorRef = *const c_void;
type CFIndex = i64;
type CGEventRef = *mut c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

// CGEventType values.
const LEFT_MOUSE_DOWN: u32 = 1;
const LEFT_MOUSE_UP: u32 = 2;
const RIGHT_MOUSE_DOWN: u32 = 3;
const RIGHT_MOUSE_UP: u32 = 4;
const MOUSE_MOVED: u32 = 5;
const LEFT_MOUSE_DRAGGED: u32 = 6;
const RIGHT_MOUSE_DRAGGED: u32 = 7;
const OTHER_MOUSE_DOWN: u32 = 25;
const OTHER_MOUSE_UP: u32 = 26;
const OTHER_MOUSE_DRAGGED: u32 = 27;
const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

/// kCGMouseEventButtonNumber; 2 is the middle button.
const MOUSE_EVENT_BUTTON_NUMBER: u32 = 3;
const MIDDLE_BUTTON_NUMBER: i64 = 2;

/// Tap event types reported for each transition.
pub const TAP_EVENT_CODES: ButtonCodeTable<u32> = ButtonCodeTable::new(
    [LEFT_MOUSE_DOWN, RIGHT_MOUSE_DOWN, OTHER_MOUSE_DOWN],
    [LEFT_MOUSE_UP, RIGHT_MOUSE_UP, OTHER_MOUSE_UP],
);

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFAllocatorRef,
        port: CFMachPortRef,
        order: CFIndex,
    ) -> CFRunLoopSourceRef;

    fn CFMachPortInvalidate(port: CFMachPortRef);
    fn CFRelease(cf: *const c_void);
}

type CGEventTapCallback = extern "C" fn(
    proxy: *mut c_void,
    event_type: u32,
    cg_event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

struct TapState {
    dispatcher: Dispatcher,
    tap: CFMachPortRef,
}

thread_local! {
    static TAP_STATE: RefCell<Option<TapState>> = const { RefCell::new(None) };
}

/// Event backend for `CGEventTap`.
#[derive(Debug, Default)]
pub struct QuartzHook {
    /// `CFMachPortRef` of the tap, 0 when none.
    tap: usize,
}

impl QuartzHook {
    pub fn new() -> Self {
        Self::default()
    }
}

fn decode(event_type: u32, event: CGEventRef) -> Option<PointerEvent> {
    let location = || {
        let loc = unsafe { CGEventGetLocation(event) };
        (loc.x.round() as i32, loc.y.round() as i32)
    };

    match event_type {
        MOUSE_MOVED | LEFT_MOUSE_DRAGGED | RIGHT_MOUSE_DRAGGED | OTHER_MOUSE_DRAGGED => {
            let (x, y) = location();
            Some(PointerEvent::Move { x, y })
        }
        _ => {
            let (button, phase) = TAP_EVENT_CODES.decode(event_type)?;
            if button == Button::Middle {
                let number =
                    unsafe { CGEventGetIntegerValueField(event, MOUSE_EVENT_BUTTON_NUMBER) };
                if number != MIDDLE_BUTTON_NUMBER {
                    return None;
                }
            }
            let (x, y) = location();
            Some(PointerEvent::Button {
                x,
                y,
                button,
                phase,
            })
        }
    }
}

/// Callback for the event tap; runs inside `CFRunLoop` on the listener thread.
extern "C" fn event_tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    cg_event: CGEventRef,
    _user_info: *mut c_void,
) -> CGEventRef {
    TAP_STATE.with(|slot| {
        let Ok(mut slot) = slot.try_borrow_mut() else {
            warn!("Re-entrant event tap call, passing event through");
            return cg_event;
        };
        let Some(state) = slot.as_mut() else {
            return cg_event;
        };

        if event_type == TAP_DISABLED_BY_TIMEOUT || event_type == TAP_DISABLED_BY_USER_INPUT {
            warn!(event_type, "Event tap disabled by the system, re-enabling");
            unsafe { CGEventTapEnable(state.tap, true) };
            return cg_event;
        }

        match decode(event_type, cg_event) {
            Some(event) if !state.dispatcher.dispatch(event) => ptr::null_mut(),
            _ => cg_event,
        }
    })
}

impl HookBackend for QuartzHook {
    fn name(&self) -> &'static str {
        "quartz-event-tap"
    }

    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()> {
        let event_mask: u64 = [
            LEFT_MOUSE_DOWN,
            LEFT_MOUSE_UP,
            RIGHT_MOUSE_DOWN,
            RIGHT_MOUSE_UP,
            MOUSE_MOVED,
            LEFT_MOUSE_DRAGGED,
            RIGHT_MOUSE_DRAGGED,
            OTHER_MOUSE_DOWN,
            OTHER_MOUSE_UP,
            OTHER_MOUSE_DRAGGED,
        ]
        .iter()
        .fold(0, |mask, ty| mask | (1u64 << *ty));

        let capture = dispatcher.capture();
        let options = if capture {
            CGEventTapOptions::Default
        } else {
            CGEventTapOptions::ListenOnly
        };

        let tap = unsafe {
            CGEventTapCreate(
                CGEventTapLocation::HID as u32,
                CGEventTapPlacement::HeadInsertEventTap as u32,
                options as u32,
                event_mask,
                event_tap_callback,
                ptr::null_mut(),
            )
        };
        if tap.is_null() {
            return Err(MouseError::native(
                "CGEventTapCreate",
                "event tap refused; accessibility permission may not be granted",
            ));
        }

        let run_loop_source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
        if run_loop_source.is_null() {
            unsafe {
                CFMachPortInvalidate(tap);
                CFRelease(tap);
            }
            return Err(MouseError::native(
                "CFMachPortCreateRunLoopSource",
                "run loop source not created",
            ));
        }

        // The run loop retains the source; invalidating the tap removes it.
        let cf_source = unsafe { CFRunLoopSource::wrap_under_create_rule(run_loop_source as *mut _) };
        CFRunLoop::get_current().add_source(&cf_source, unsafe { kCFRunLoopCommonModes });

        TAP_STATE.with(|slot| *slot.borrow_mut() = Some(TapState { dispatcher, tap }));
        unsafe { CGEventTapEnable(tap, true) };

        self.tap = tap as usize;
        info!(capture, "Event tap installed");
        Ok(())
    }

    fn pump(&mut self, timeout: Duration) -> MouseResult<()> {
        let _ = CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, timeout, false);
        Ok(())
    }

    fn uninstall(&mut self) {
        if self.tap != 0 {
            debug!("Removing event tap");
            let tap = self.tap as CFMachPortRef;
            unsafe {
                CGEventTapEnable(tap, false);
                CFMachPortInvalidate(tap);
                CFRelease(tap);
            }
            self.tap = 0;
        }
        TAP_STATE.with(|slot| slot.borrow_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mousekit_core::Phase;

    #[test]
    fn test_tap_event_codes() {
        assert_eq!(
            TAP_EVENT_CODES.decode(LEFT_MOUSE_DOWN),
            Some((Button::Left, Phase::Press))
        );
        assert_eq!(
            TAP_EVENT_CODES.decode(RIGHT_MOUSE_UP),
            Some((Button::Right, Phase::Release))
        );
        assert_eq!(
            TAP_EVENT_CODES.decode(OTHER_MOUSE_DOWN),
            Some((Button::Middle, Phase::Press))
        );
        assert_eq!(TAP_EVENT_CODES.decode(MOUSE_MOVED), None);
    }
}
