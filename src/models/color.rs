//! Four-channel colour value.

use std::fmt;

use crate::Result;

const CHANNELS: [&str; 4] = ["r", "g", "b", "a"];

/// RGBA colour with every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    /// Opaque white.
    pub const WHITE: Rgba = Rgba([1.0, 1.0, 1.0, 1.0]);
    /// Opaque green.
    pub const GREEN: Rgba = Rgba([0.0, 1.0, 0.0, 1.0]);

    /// Parse four consecutive channel tokens.
    ///
    /// `tokens` must hold exactly four entries; callers slice them out of
    /// an already length-checked line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for a non-numeric channel and
    /// `AppError::Validation` for a channel outside `[0, 1]`.
    pub fn parse(field: &str, tokens: &[&str]) -> Result<Self> {
        super::expect_token_count(field, tokens, 4)?;
        let mut channels = [0.0_f32; 4];
        for ((slot, channel), token) in channels.iter_mut().zip(CHANNELS).zip(tokens) {
            let name = format!("{field}.{channel}");
            let value = super::parse_float(&name, token)?;
            super::check_unit(&name, value)?;
            *slot = value;
        }
        Ok(Self(channels))
    }

    /// Validate every channel against `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` naming the first offending channel.
    pub fn validate(&self, field: &str) -> Result<()> {
        for (channel, value) in CHANNELS.iter().zip(self.0) {
            super::check_unit(&format!("{field}.{channel}"), value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "{r} {g} {b} {a}")
    }
}
