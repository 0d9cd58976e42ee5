//! # Position Model
//!
//! Percentage coordinates plus auto/fixed sizing for any placeable element.
//!
//! - `x`, `y`: percent of the template canvas, always in `[0, 100]` once
//!   committed.
//! - `width`, `height`: `None` means auto (intrinsic size of the content or
//!   asset); `Some(px)` is an explicit size in template-space pixels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BadgeError;
use crate::format::Alignment;

pub const AXIS_MIN: f64 = 0.0;
pub const AXIS_MAX: f64 = 100.0;

/// x forced by center alignment.
pub const CENTER_ANCHOR_X: f64 = 50.0;
/// x forced by right alignment.
pub const RIGHT_ANCHOR_X: f64 = 90.0;

/// Clamp a coordinate into `[0, 100]`. NaN clamps to 0.
#[inline]
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        return AXIS_MIN;
    }
    value.clamp(AXIS_MIN, AXIS_MAX)
}

/// Position and size of a placed element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionedElement {
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Default for PositionedElement {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

impl PositionedElement {
    /// Auto-sized element at the given (clamped) coordinates.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: clamp_axis(x),
            y: clamp_axis(y),
            width: None,
            height: None,
        }
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = clamp_axis(x);
    }

    pub fn set_y(&mut self, y: f64) {
        self.y = clamp_axis(y);
    }

    pub fn set_width(&mut self, width: Dimension) {
        self.width = width.px();
    }

    pub fn set_height(&mut self, height: Dimension) {
        self.height = height.px();
    }

    /// Apply the alignment anchor rule.
    ///
    /// Center forces `x = 50` and right forces `x = 90`; the previous x is
    /// not kept. Left leaves x where it is.
    pub fn apply_alignment(&mut self, alignment: Alignment) {
        match alignment {
            Alignment::Left => {}
            Alignment::Center => self.x = CENTER_ANCHOR_X,
            Alignment::Right => self.x = RIGHT_ANCHOR_X,
        }
    }

    pub fn is_auto_sized(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }
}

/// A sizing value: auto, or an explicit pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f64),
}

impl Dimension {
    /// Parse `"auto"` or a non-negative number of pixels (`"120"`, `"120px"`).
    pub fn parse(input: &str) -> Result<Self, BadgeError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Dimension::Auto);
        }
        let number = trimmed.strip_suffix("px").unwrap_or(trimmed).trim();
        let value: f64 = number
            .parse()
            .map_err(|_| BadgeError::InvalidDimension(input.to_string()))?;
        Self::px_checked(value).ok_or_else(|| BadgeError::InvalidDimension(input.to_string()))
    }

    /// Explicit size, rejected when non-finite or negative.
    pub fn px_checked(value: f64) -> Option<Self> {
        (value.is_finite() && value >= 0.0).then_some(Dimension::Px(value))
    }

    pub fn px(&self) -> Option<f64> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(*v),
        }
    }
}

impl From<Option<f64>> for Dimension {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Dimension::Auto, Dimension::Px)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Auto => f.write_str("auto"),
            Dimension::Px(v) => write!(f, "{v}px"),
        }
    }
}

/// Numeric X or Y control bound to a coordinate.
///
/// Holds the text the operator is typing. Keystrokes that would produce a
/// value outside `[0, 100]`, or that are not numeric at all, are rejected
/// without error. Partial input (`""`, `"-"`, `"."`) is held until commit.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisInput {
    text: String,
    last_valid: f64,
}

impl AxisInput {
    pub fn new(value: f64) -> Self {
        let value = clamp_axis(value);
        Self {
            text: format_axis(value),
            last_valid: value,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.last_valid
    }

    /// Offer a new text value for the control. Returns whether it was taken.
    pub fn keystroke(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if is_partial_number(trimmed) {
            self.text = trimmed.to_string();
            return true;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() && (AXIS_MIN..=AXIS_MAX).contains(&v) => {
                self.text = trimmed.to_string();
                self.last_valid = v;
                true
            }
            _ => false,
        }
    }

    /// Commit the current text: clamp numbers, revert anything else to the
    /// last valid value. Returns the committed value.
    pub fn commit(&mut self) -> f64 {
        let committed = match self.text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => clamp_axis(v),
            _ => self.last_valid,
        };
        self.set(committed);
        committed
    }

    /// Replace the control's value from the model side.
    pub fn set(&mut self, value: f64) {
        self.last_valid = clamp_axis(value);
        self.text = format_axis(self.last_valid);
    }
}

fn is_partial_number(text: &str) -> bool {
    matches!(text, "" | "-" | "." | "-.")
}

fn format_axis(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
