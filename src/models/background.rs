//! Background scene parameters: ambient field plus fixation target.
//!
//! ## Wire layout (18 tokens)
//!
//! ```text
//! bgEye bgLum bgR bgG bgB bgA fixEye fixType fixCx fixCy fixSx fixSy fixTheta fixLum fixR fixG fixB fixA
//! ```
//!
//! `fixType` is a shape name (`circle`, `square`, `cross`, `maltese`,
//! `annulus`); anything else disables the fixation target.

use std::fmt;

use super::color::Rgba;
use super::eye::Eye;
use super::shape::Shape;
use super::{check_angle, check_unit, expect_token_count, parse_float};
use crate::Result;

/// Number of tokens in a background parameter line.
pub const BACKGROUND_TOKENS: usize = 18;

/// Static scene shown outside of (and underneath) stimulus presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Background {
    /// Eye the background field is drawn for.
    pub bg_eye: Eye,
    /// Background luminance in `[0, 1]`.
    pub bg_lum: f32,
    /// Background colour.
    pub bg_col: Rgba,
    /// Eye the fixation target is drawn for.
    pub fix_eye: Eye,
    /// Fixation target shape.
    pub fix_type: Shape,
    /// Fixation centre, horizontal (degrees).
    pub fix_cx: f32,
    /// Fixation centre, vertical (degrees).
    pub fix_cy: f32,
    /// Fixation size, horizontal (degrees).
    pub fix_sx: f32,
    /// Fixation size, vertical (degrees).
    pub fix_sy: f32,
    /// Fixation rotation in `[0, 360)` degrees.
    pub fix_theta: f32,
    /// Fixation luminance in `[0, 1]`.
    pub fix_lum: f32,
    /// Fixation colour.
    pub fix_col: Rgba,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            bg_eye: Eye::Both,
            bg_lum: 0.1,
            bg_col: Rgba::WHITE,
            fix_eye: Eye::Both,
            fix_type: Shape::None,
            fix_cx: 0.0,
            fix_cy: 0.0,
            fix_sx: 0.0,
            fix_sy: 0.0,
            fix_theta: 0.0,
            fix_lum: 0.5,
            fix_col: Rgba::GREEN,
        }
    }
}

impl Background {
    /// Parse and validate the 18 tokens of an `OPI_SET_BACKGROUND` line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for a wrong token count or a non-numeric
    /// token, and `AppError::Validation` for any out-of-range field. No
    /// partially parsed value is ever returned.
    pub fn parse(tokens: &[&str]) -> Result<Self> {
        expect_token_count("background", tokens, BACKGROUND_TOKENS)?;

        let background = Self {
            bg_eye: Eye::parse("bgEye", tokens[0])?,
            bg_lum: parse_float("bgLum", tokens[1])?,
            bg_col: Rgba::parse("bgCol", &tokens[2..6])?,
            fix_eye: Eye::parse("fixEye", tokens[6])?,
            fix_type: Shape::from_name(tokens[7]),
            fix_cx: parse_float("fixCx", tokens[8])?,
            fix_cy: parse_float("fixCy", tokens[9])?,
            fix_sx: parse_float("fixSx", tokens[10])?,
            fix_sy: parse_float("fixSy", tokens[11])?,
            fix_theta: parse_float("fixTheta", tokens[12])?,
            fix_lum: parse_float("fixLum", tokens[13])?,
            fix_col: Rgba::parse("fixCol", &tokens[14..18])?,
        };
        background.validate()?;
        Ok(background)
    }

    /// Check every range-constrained field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_unit("bgLum", self.bg_lum)?;
        check_unit("fixLum", self.fix_lum)?;
        self.bg_col.validate("bgCol")?;
        self.fix_col.validate("fixCol")?;
        check_angle("fixTheta", self.fix_theta)
    }

    /// Whether every field is within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Formats the 18 wire tokens (without the command word).
impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {} {} {}",
            self.bg_eye,
            self.bg_lum,
            self.bg_col,
            self.fix_eye,
            self.fix_type,
            self.fix_cx,
            self.fix_cy,
            self.fix_sx,
            self.fix_sy,
            self.fix_theta,
            self.fix_lum,
            self.fix_col,
        )
    }
}
