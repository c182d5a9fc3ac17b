//! Eye selection code shared by background, fixation, and stimulus steps.

use std::fmt;

use crate::{AppError, Result};

/// Which eye a scene element is drawn for.
///
/// On the wire this is the integer code `0`, `1`, or `2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Eye {
    /// Left eye only (`0`).
    Left,
    /// Right eye only (`1`).
    Right,
    /// Both eyes (`2`).
    #[default]
    Both,
}

impl Eye {
    /// Integer wire code for this eye.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Both => 2,
        }
    }

    /// Whether an element for this eye is visible in `view`.
    ///
    /// `view` is the eye whose image is being composed (`Left` or `Right`).
    #[must_use]
    pub fn shows_in(self, view: Eye) -> bool {
        self == Self::Both || self == view
    }

    /// Parse an eye code token, validating its range.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for a non-integer token and
    /// `AppError::Validation` for a code outside `0..=2`.
    pub fn parse(field: &str, token: &str) -> Result<Self> {
        let code: i64 = super::parse_int(field, token)?;
        Self::try_from(code)
            .map_err(|_| AppError::Validation(format!("{field} must be 0, 1 or 2, got {code}")))
    }
}

impl TryFrom<i64> for Eye {
    type Error = i64;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Left),
            1 => Ok(Self::Right),
            2 => Ok(Self::Both),
            other => Err(other),
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
