//! Multi-step stimulus parameters.
//!
//! A stimulus arrives in two phases: one global line
//! (`nSteps d w`, durations in milliseconds) followed by `nSteps` step
//! lines of 13 tokens each:
//!
//! ```text
//! eye type cx cy sx sy theta stepDuration lum r g b a
//! ```
//!
//! [`StimulusBuilder`] accumulates validated steps and only yields an
//! immutable [`Stimulus`] once every step has been accepted.

use std::fmt;
use std::time::Duration;

use super::color::Rgba;
use super::eye::Eye;
use super::shape::Shape;
use super::{check_angle, check_unit, expect_token_count, parse_float, parse_int};
use crate::{AppError, Result};

/// Number of tokens in the global stimulus line.
pub const HEADER_TOKENS: usize = 3;

/// Number of tokens in one stimulus step line.
pub const STEP_TOKENS: usize = 13;

/// Upper bound on up-front step allocation; larger stimuli grow on demand.
const PREALLOCATED_STEPS: usize = 64;

/// Global stimulus parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusHeader {
    /// Number of step lines that follow.
    pub steps: usize,
    /// Minimum presentation time `d`.
    pub duration: Duration,
    /// Response window `w`, measured from onset; always longer than `d`.
    pub window: Duration,
}

impl StimulusHeader {
    /// Parse and validate the global `nSteps d w` tokens.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for a wrong token count or a non-integer
    /// token, and `AppError::Validation` unless `nSteps > 0`, `d > 0` and
    /// `w > d`.
    pub fn parse(tokens: &[&str]) -> Result<Self> {
        expect_token_count("stimulus header", tokens, HEADER_TOKENS)?;
        let steps: i64 = parse_int("nSteps", tokens[0])?;
        let duration_ms: i64 = parse_int("d", tokens[1])?;
        let window_ms: i64 = parse_int("w", tokens[2])?;

        if steps <= 0 {
            return Err(AppError::Validation(format!(
                "nSteps must be positive, got {steps}"
            )));
        }
        if duration_ms <= 0 {
            return Err(AppError::Validation(format!(
                "d must be positive, got {duration_ms}"
            )));
        }
        if window_ms <= duration_ms {
            return Err(AppError::Validation(format!(
                "w must exceed d, got w={window_ms} d={duration_ms}"
            )));
        }

        Ok(Self {
            steps: usize::try_from(steps)
                .map_err(|_| AppError::Validation(format!("nSteps too large: {steps}")))?,
            duration: Duration::from_millis(duration_ms.unsigned_abs()),
            window: Duration::from_millis(window_ms.unsigned_abs()),
        })
    }
}

impl fmt::Display for StimulusHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.steps,
            self.duration.as_millis(),
            self.window.as_millis()
        )
    }
}

/// One presentation step: a light target held for `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StimulusStep {
    /// Eye the step is drawn for.
    pub eye: Eye,
    /// Target shape.
    pub shape: Shape,
    /// Centre, horizontal (degrees).
    pub cx: f32,
    /// Centre, vertical (degrees).
    pub cy: f32,
    /// Size, horizontal (degrees).
    pub sx: f32,
    /// Size, vertical (degrees).
    pub sy: f32,
    /// Rotation in `[0, 360)` degrees.
    pub theta: f32,
    /// Time the step stays on screen; always positive.
    pub duration: Duration,
    /// Luminance in `[0, 1]`.
    pub lum: f32,
    /// Colour.
    pub col: Rgba,
}

impl StimulusStep {
    /// Parse and validate the 13 tokens of step `index`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for a wrong token count or a non-numeric
    /// token, and `AppError::Validation` for any out-of-range field.
    pub fn parse(index: usize, tokens: &[&str]) -> Result<Self> {
        expect_token_count(&format!("stimulus step {index}"), tokens, STEP_TOKENS)?;

        let duration_ms: i64 = parse_int("stepDuration", tokens[7])?;
        if duration_ms <= 0 {
            return Err(AppError::Validation(format!(
                "step {index}: stepDuration must be positive, got {duration_ms}"
            )));
        }

        let step = Self {
            eye: Eye::parse("eye", tokens[0])?,
            shape: Shape::from_name(tokens[1]),
            cx: parse_float("cx", tokens[2])?,
            cy: parse_float("cy", tokens[3])?,
            sx: parse_float("sx", tokens[4])?,
            sy: parse_float("sy", tokens[5])?,
            theta: parse_float("theta", tokens[6])?,
            duration: Duration::from_millis(duration_ms.unsigned_abs()),
            lum: parse_float("lum", tokens[8])?,
            col: Rgba::parse("col", &tokens[9..13])?,
        };
        step.validate()?;
        Ok(step)
    }

    /// Check every range-constrained field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(AppError::Validation(
                "stepDuration must be positive".into(),
            ));
        }
        check_unit("lum", self.lum)?;
        check_angle("theta", self.theta)?;
        self.col.validate("col")
    }
}

impl fmt::Display for StimulusStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {}",
            self.eye,
            self.shape,
            self.cx,
            self.cy,
            self.sx,
            self.sy,
            self.theta,
            self.duration.as_millis(),
            self.lum,
            self.col,
        )
    }
}

/// Accumulates step lines for a validated header.
#[derive(Debug)]
pub struct StimulusBuilder {
    header: StimulusHeader,
    steps: Vec<StimulusStep>,
}

impl StimulusBuilder {
    /// Start collecting steps for `header`.
    #[must_use]
    pub fn new(header: StimulusHeader) -> Self {
        Self {
            header,
            steps: Vec::with_capacity(header.steps.min(PREALLOCATED_STEPS)),
        }
    }

    /// Index of the next step line expected.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.steps.len()
    }

    /// Whether every announced step has been accepted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.steps.len() == self.header.steps
    }

    /// Parse the next step line and append it.
    ///
    /// On failure nothing is appended.
    ///
    /// # Errors
    ///
    /// Returns the step parse/validation error, or `AppError::Protocol` if
    /// every announced step has already been accepted.
    pub fn push_tokens(&mut self, tokens: &[&str]) -> Result<()> {
        if self.is_complete() {
            return Err(AppError::Protocol(format!(
                "stimulus already holds all {} steps",
                self.header.steps
            )));
        }
        let step = StimulusStep::parse(self.next_index(), tokens)?;
        self.steps.push(step);
        Ok(())
    }

    /// Freeze the collected steps into a [`Stimulus`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if steps are still missing.
    pub fn build(self) -> Result<Stimulus> {
        if !self.is_complete() {
            return Err(AppError::Protocol(format!(
                "stimulus incomplete: {} of {} steps",
                self.steps.len(),
                self.header.steps
            )));
        }
        Ok(Stimulus {
            header: self.header,
            steps: self.steps,
        })
    }
}

/// Fully validated, immutable stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    header: StimulusHeader,
    steps: Vec<StimulusStep>,
}

impl Stimulus {
    /// Build a stimulus directly from a header and its steps.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the step count does not match the
    /// header or any step is out of range.
    pub fn new(header: StimulusHeader, steps: Vec<StimulusStep>) -> Result<Self> {
        if header.steps != steps.len() || steps.is_empty() {
            return Err(AppError::Validation(format!(
                "header announces {} steps, got {}",
                header.steps,
                steps.len()
            )));
        }
        if header.duration.is_zero() || header.window <= header.duration {
            return Err(AppError::Validation(
                "stimulus requires 0 < d < w".into(),
            ));
        }
        for step in &steps {
            step.validate()?;
        }
        Ok(Self { header, steps })
    }

    /// Global parameters.
    #[must_use]
    pub fn header(&self) -> &StimulusHeader {
        &self.header
    }

    /// Steps in presentation order.
    #[must_use]
    pub fn steps(&self) -> &[StimulusStep] {
        &self.steps
    }

    /// Minimum presentation time `d`.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.header.duration
    }

    /// Response window `w`.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.header.window
    }
}
