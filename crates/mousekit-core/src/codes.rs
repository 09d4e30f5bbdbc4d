//! Button code tables: abstract button × phase → native code.
//!
//! Each backend declares one `const` table with a press row and a release row,
//! since some native APIs use distinct flags for the two halves of a click.

use crate::{Button, Phase};

/// Per-backend mapping from [`Button`] and [`Phase`] to a native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonCodeTable<T: Copy> {
    press: [T; 3],
    release: [T; 3],
}

impl<T: Copy> ButtonCodeTable<T> {
    /// Build a table. Rows are ordered left, right, middle.
    pub const fn new(press: [T; 3], release: [T; 3]) -> Self {
        Self { press, release }
    }

    /// A table whose native code does not depend on the phase.
    pub const fn same_for_both(codes: [T; 3]) -> Self {
        Self {
            press: codes,
            release: codes,
        }
    }

    /// Native code for `button` in `phase`.
    pub fn code_for(&self, phase: Phase, button: Button) -> T {
        match phase {
            Phase::Press => self.press[button.index()],
            Phase::Release => self.release[button.index()],
        }
    }
}

impl<T: Copy + PartialEq> ButtonCodeTable<T> {
    /// Reverse lookup, used by hooks that receive native codes.
    pub fn decode(&self, code: T) -> Option<(Button, Phase)> {
        Button::ALL.into_iter().find_map(|button| {
            if self.press[button.index()] == code {
                Some((button, Phase::Press))
            } else if self.release[button.index()] == code {
                Some((button, Phase::Release))
            } else {
                None
            }
        })
    }
}
