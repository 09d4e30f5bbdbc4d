//! X11 control backend built on enigo (XTest underneath).

use enigo::{Coordinate, Direction, Enigo, Mouse, Settings};
use mousekit_core::{
    Button, ButtonCodeTable, ControlConfig, MouseControl, MouseError, MouseResult, Phase, Point,
    ScreenSize,
};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// enigo button and direction for each transition.
pub const ENIGO_CODES: ButtonCodeTable<(enigo::Button, Direction)> = ButtonCodeTable::new(
    [
        (enigo::Button::Left, Direction::Press),
        (enigo::Button::Right, Direction::Press),
        (enigo::Button::Middle, Direction::Press),
    ],
    [
        (enigo::Button::Left, Direction::Release),
        (enigo::Button::Right, Direction::Release),
        (enigo::Button::Middle, Direction::Release),
    ],
);

/// Control backend holding one display connection.
pub struct EnigoMouse {
    enigo: Mutex<Enigo>,
    config: ControlConfig,
}

impl EnigoMouse {
    /// Connect to the display server.
    pub fn new() -> MouseResult<Self> {
        Self::with_config(ControlConfig::default())
    }

    pub fn with_config(config: ControlConfig) -> MouseResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| MouseError::native("connect to display", format!("failed to create Enigo: {e}")))?;
        Ok(Self {
            enigo: Mutex::new(enigo),
            config,
        })
    }

    fn lock(&self) -> MouseResult<MutexGuard<'_, Enigo>> {
        self.enigo
            .lock()
            .map_err(|_| MouseError::native("enigo", "display connection poisoned"))
    }

    fn button(&self, x: i32, y: i32, button: Button, phase: Phase) -> MouseResult<()> {
        let (enigo_button, direction) = ENIGO_CODES.code_for(phase, button);
        let mut enigo = self.lock()?;
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| MouseError::native("move_mouse", e))?;
        enigo
            .button(enigo_button, direction)
            .map_err(|e| MouseError::native("button", e))
    }
}

impl MouseControl for EnigoMouse {
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        debug!(x, y, "injecting mouse move");
        self.lock()?
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| MouseError::native("move_mouse", e))
    }

    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "injecting mouse down");
        self.button(x, y, button, Phase::Press)
    }

    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        debug!(x, y, %button, "injecting mouse up");
        self.button(x, y, button, Phase::Release)
    }

    fn position(&self) -> MouseResult<Point> {
        let (x, y) = self
            .lock()?
            .location()
            .map_err(|e| MouseError::native("location", e))?;
        Ok(Point::new(x, y))
    }

    fn screen_size(&self) -> MouseResult<ScreenSize> {
        let (width, height) = self
            .lock()?
            .main_display()
            .map_err(|e| MouseError::native("main_display", e))?;
        ScreenSize::from_native("main_display", width.into(), height.into())
    }

    fn click_delay(&self) -> Option<Duration> {
        self.config.click_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enigo_codes() {
        assert!(matches!(
            ENIGO_CODES.code_for(Phase::Press, Button::Left),
            (enigo::Button::Left, Direction::Press)
        ));
        assert!(matches!(
            ENIGO_CODES.code_for(Phase::Release, Button::Right),
            (enigo::Button::Right, Direction::Release)
        ));
        assert!(matches!(
            ENIGO_CODES.code_for(Phase::Press, Button::Middle),
            (enigo::Button::Middle, Direction::Press)
        ));
    }
}
