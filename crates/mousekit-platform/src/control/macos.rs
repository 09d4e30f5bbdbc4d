//! macOS control backend using Quartz event services.

use core_graphics::display::CGDisplay;
use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use mousekit_core::{
    Button, ButtonCodeTable, ControlConfig, MouseControl, MouseError, MouseResult, Phase, Point,
    ScreenSize,
};
use std::time::Duration;
use tracing::debug;

/// Event type and button pair posted for each transition.
pub const QUARTZ_CODES: ButtonCodeTable<(CGEventType, CGMouseButton)> = ButtonCodeTable::new(
    [
        (CGEventType::LeftMouseDown, CGMouseButton::Left),
        (CGEventType::RightMouseDown, CGMouseButton::Right),
        (CGEventType::OtherMouseDown, CGMouseButton::Center),
    ],
    [
        (CGEventType::LeftMouseUp, CGMouseButton::Left),
        (CGEventType::RightMouseUp, CGMouseButton::Right),
        (CGEventType::OtherMouseUp, CGMouseButton::Center),
    ],
);

/// Control backend posting `CGEvent`s at the HID tap location.
///
/// Event sources are not thread-safe, so one is created per call instead of
/// being kept on the backend.
pub struct QuartzMouse {
    config: ControlConfig,
}

fn event_source() -> MouseResult<CGEventSource> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| MouseError::native("CGEventSourceCreate", "event source unavailable"))
}

fn post(event_type: CGEventType, x: i32, y: i32, button: CGMouseButton) -> MouseResult<()> {
    let point = CGPoint::new(x as f64, y as f64);
    let event = CGEvent::new_mouse_event(event_source()?, event_type, point, button)
        .map_err(|_| MouseError::native("CGEventCreateMouseEvent", "event not created"))?;
    event.post(CGEventTapLocation::HID);
    Ok(())
}

impl QuartzMouse {
    pub fn new() -> MouseResult<Self> {
        Self::with_config(ControlConfig::default())
    }

    pub fn with_config(config: ControlConfig) -> MouseResult<Self> {
        event_source()?;
        if CGDisplay::main().pixels_wide() == 0 {
            return Err(MouseError::native("CGMainDisplayID", "no active display"));
        }
        Ok(Self { config })
    }

    fn button(&self, x: i32, y: i32, button: Button, phase: Phase) -> MouseResult<()> {
        let (event_type, cg_button) = QUARTZ_CODES.code_for(phase, button);
        post(event_type, x, y, cg_button)
    }
}

impl MouseControl for QuartzMouse {
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        debug!(x, y, "posting mouse move");
        post(CGEventType::MouseMoved, x, y, CGMouseButton::Left)
    }

    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "posting mouse down");
        self.move_to(x, y)?;
        self.button(x, y, button, Phase::Press)
    }

    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "posting mouse up");
        self.move_to(x, y)?;
        self.button(x, y, button, Phase::Release)
    }

    fn position(&self) -> MouseResult<Point> {
        let event = CGEvent::new(event_source()?)
            .map_err(|_| MouseError::native("CGEventCreate", "event not created"))?;
        let loc = event.location();
        Ok(Point::new(loc.x.round() as i32, loc.y.round() as i32))
    }

    fn screen_size(&self) -> MouseResult<ScreenSize> {
        let display = CGDisplay::main();
        ScreenSize::from_native(
            "CGDisplayPixelsWide",
            display.pixels_wide() as i64,
            display.pixels_high() as i64,
        )
    }

    fn click_delay(&self) -> Option<Duration> {
        self.config.click_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quartz_codes() {
        let (ty, button) = QUARTZ_CODES.code_for(Phase::Press, Button::Middle);
        assert_eq!(ty as u32, CGEventType::OtherMouseDown as u32);
        assert_eq!(button as u32, CGMouseButton::Center as u32);

        let (ty, _) = QUARTZ_CODES.code_for(Phase::Release, Button::Right);
        assert_eq!(ty as u32, CGEventType::RightMouseUp as u32);
    }
}
