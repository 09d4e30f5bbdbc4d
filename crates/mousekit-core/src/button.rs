//! Abstract button identifiers and action phases.

use crate::{MouseError, MouseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mouse button as seen by callers.
///
/// The discriminants are the raw integers accepted at the façade boundary
/// (1 = left, 2 = right, 3 = middle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Left = 1,
    Right = 2,
    Middle = 3,
}

impl Button {
    /// All buttons, in raw-code order.
    pub const ALL: [Button; 3] = [Button::Left, Button::Right, Button::Middle];

    /// Zero-based row index used by code tables.
    pub(crate) const fn index(self) -> usize {
        self as usize - 1
    }

    /// Raw integer form of this button.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl Default for Button {
    fn default() -> Self {
        Self::Left
    }
}

impl TryFrom<u8> for Button {
    type Error = MouseError;

    fn try_from(code: u8) -> MouseResult<Self> {
        match code {
            1 => Ok(Button::Left),
            2 => Ok(Button::Right),
            3 => Ok(Button::Middle),
            other => Err(MouseError::InvalidArgument(format!(
                "button must be 1 (left), 2 (right) or 3 (middle), got {other}"
            ))),
        }
    }
}

impl From<Button> for u8 {
    fn from(button: Button) -> Self {
        button.code()
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Middle => "middle",
        };
        f.write_str(name)
    }
}

/// Which half of a button transition is being synthesized or observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Press,
    Release,
}

impl Phase {
    /// `true` for [`Phase::Press`].
    pub const fn is_press(self) -> bool {
        matches!(self, Phase::Press)
    }

    pub const fn from_press(is_press: bool) -> Self {
        if is_press {
            Phase::Press
        } else {
            Phase::Release
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_from_raw_code() {
        assert_eq!(Button::try_from(1).unwrap(), Button::Left);
        assert_eq!(Button::try_from(2).unwrap(), Button::Right);
        assert_eq!(Button::try_from(3).unwrap(), Button::Middle);
    }

    #[test]
    fn test_button_rejects_out_of_range_codes() {
        for code in [0u8, 4, 255] {
            let err = Button::try_from(code).unwrap_err();
            assert!(matches!(err, MouseError::InvalidArgument(_)), "{code}");
        }
    }

    #[test]
    fn test_button_code_round_trips_through_u8() {
        for button in Button::ALL {
            assert_eq!(Button::try_from(u8::from(button)).unwrap(), button);
        }
        assert_eq!(Button::default(), Button::Left);
    }

    #[test]
    fn test_phase_from_press_flag() {
        assert_eq!(Phase::from_press(true), Phase::Press);
        assert_eq!(Phase::from_press(false), Phase::Release);
        assert!(Phase::Press.is_press());
        assert!(!Phase::Release.is_press());
    }
}
