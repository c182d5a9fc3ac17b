//! Shape enumeration for fixation targets and stimulus steps.

use std::fmt;

/// Geometric shape of a fixation target or stimulus step.
///
/// The protocol carries shapes by name. Any name outside the fixed set
/// maps to [`Shape::None`], which draws nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Shape {
    /// No shape (code `-1`).
    #[default]
    None,
    /// Filled ellipse (code `0`).
    Circle,
    /// Filled rectangle (code `1`).
    Square,
    /// Plus-shaped cross (code `2`).
    Cross,
    /// Maltese cross (code `3`).
    Maltese,
    /// Ring (code `4`).
    Annulus,
}

impl Shape {
    /// Every drawable shape, in code order.
    pub const DRAWABLE: [Shape; 5] = [
        Shape::Circle,
        Shape::Square,
        Shape::Cross,
        Shape::Maltese,
        Shape::Annulus,
    ];

    /// Map a wire name to a shape; unrecognised names yield [`Shape::None`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "circle" => Self::Circle,
            "square" => Self::Square,
            "cross" => Self::Cross,
            "maltese" => Self::Maltese,
            "annulus" => Self::Annulus,
            _ => Self::None,
        }
    }

    /// Wire name; `none` for [`Shape::None`], which parses back to itself.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Cross => "cross",
            Self::Maltese => "maltese",
            Self::Annulus => "annulus",
        }
    }

    /// Numeric type code used by renderers (`-1..=4`).
    #[must_use]
    pub fn code(self) -> i8 {
        match self {
            Self::None => -1,
            Self::Circle => 0,
            Self::Square => 1,
            Self::Cross => 2,
            Self::Maltese => 3,
            Self::Annulus => 4,
        }
    }

    /// Whether anything is drawn for this shape.
    #[must_use]
    pub fn is_drawable(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
