//! Scene and stimulus parameter models.
//!
//! Every model parses from the space-separated tokens of one protocol line
//! and is either fully valid or rejected; no partially parsed value ever
//! leaves this module.

pub mod background;
pub mod color;
pub mod eye;
pub mod metrics;
pub mod shape;
pub mod stimulus;

use std::str::FromStr;

use crate::{AppError, Result};

/// Reject a token list whose length differs from `expected`.
pub(crate) fn expect_token_count(what: &str, tokens: &[&str], expected: usize) -> Result<()> {
    if tokens.len() == expected {
        Ok(())
    } else {
        Err(AppError::Parse(format!(
            "{what} expects {expected} tokens, got {}",
            tokens.len()
        )))
    }
}

/// Parse an integer field.
pub(crate) fn parse_int<T: FromStr>(field: &str, token: &str) -> Result<T> {
    token
        .parse::<T>()
        .map_err(|_| AppError::Parse(format!("{field}: '{token}' is not an integer")))
}

/// Parse a finite floating-point field.
pub(crate) fn parse_float(field: &str, token: &str) -> Result<f32> {
    match token.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(AppError::Parse(format!(
            "{field}: '{token}' is not a finite number"
        ))),
    }
}

/// Check that `value` lies in the closed unit interval.
pub(crate) fn check_unit(field: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be in [0, 1], got {value}"
        )))
    }
}

/// Check that `value` is a rotation in `[0, 360)` degrees.
pub(crate) fn check_angle(field: &str, value: f32) -> Result<()> {
    if (0.0..360.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be in [0, 360), got {value}"
        )))
    }
}
