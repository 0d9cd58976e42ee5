//! # Template Canvas Configuration
//!
//! This module defines the fixed template-space canvases that every stored
//! coordinate is relative to, plus the engine-wide configuration.
//!
//! ## Supported Canvases
//!
//! | Canvas | Size (px) | Font sizes |
//! |--------|-----------|------------|
//! | Badge | 1280 × 960 | 8–100px |
//! | Ticket | 816 × 1056 | 8–50px |
//!
//! ## Usage
//!
//! ```
//! use badgekit::canvas::TemplateCanvas;
//!
//! let canvas = TemplateCanvas::BADGE;
//! assert_eq!(canvas.percent_to_x(50.0), 640.0);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BadgeError;

/// Range of font sizes (px) a canvas accepts when decoding markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSizeRange {
    pub min: u32,
    pub max: u32,
}

impl FontSizeRange {
    pub const BADGE: Self = Self { min: 8, max: 100 };
    pub const TICKET: Self = Self { min: 8, max: 50 };

    #[inline]
    pub fn contains(&self, size: u32) -> bool {
        (self.min..=self.max).contains(&size)
    }

    #[inline]
    pub fn clamp(&self, size: u32) -> u32 {
        size.clamp(self.min, self.max)
    }
}

impl Default for FontSizeRange {
    fn default() -> Self {
        Self::BADGE
    }
}

/// # Template Canvas
///
/// The absolute coordinate system a template is authored in. Positions are
/// stored as percentages of this canvas, explicit sizes as pixels in it.
/// The dimensions are constants and never user-editable.
///
/// ## Calculations
///
/// ```text
/// absolute_x = x% / 100 * width
/// absolute_y = y% / 100 * height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemplateCanvas {
    /// Canvas name
    pub name: &'static str,

    /// Width in template-space pixels
    pub width: f64,

    /// Height in template-space pixels
    pub height: f64,

    /// Font sizes the codec accepts for fields on this canvas
    pub font_sizes: FontSizeRange,
}

impl TemplateCanvas {
    /// Landscape event badge.
    pub const BADGE: Self = Self {
        name: "badge",
        width: 1280.0,
        height: 960.0,
        font_sizes: FontSizeRange::BADGE,
    };

    /// Ticket wrapper: a fixed US letter page at 96 DPI.
    pub const TICKET: Self = Self {
        name: "ticket",
        width: 816.0,
        height: 1056.0,
        font_sizes: FontSizeRange::TICKET,
    };

    /// Look up a canvas by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "badge" => Some(Self::BADGE),
            "ticket" => Some(Self::TICKET),
            _ => None,
        }
    }

    /// Convert a horizontal percentage to template-space pixels
    #[inline]
    pub fn percent_to_x(&self, percent: f64) -> f64 {
        percent / 100.0 * self.width
    }

    /// Convert a vertical percentage to template-space pixels
    #[inline]
    pub fn percent_to_y(&self, percent: f64) -> f64 {
        percent / 100.0 * self.height
    }
}

impl Default for TemplateCanvas {
    fn default() -> Self {
        Self::BADGE
    }
}

fn default_canvas_name() -> String {
    TemplateCanvas::BADGE.name.to_string()
}

fn default_preview_width() -> f64 {
    640.0
}

fn default_field_y_step() -> f64 {
    5.0
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_sample_payload() -> String {
    SAMPLE_CODE_PAYLOAD.to_string()
}

/// Payload encoded into the code image while editing. Never real data.
pub const SAMPLE_CODE_PAYLOAD: &str = "BADGEKIT-SAMPLE-0000000000";

/// Smallest code edge (px) a template may store.
pub const MIN_CODE_SIZE: u32 = 10;

/// Largest code edge (px): the longest side of any canvas.
pub const MAX_CODE_SIZE: u32 = 1280;

/// Bring a code edge into `MIN_CODE_SIZE..=MAX_CODE_SIZE`.
#[inline]
pub fn clamp_code_size(size: u32) -> u32 {
    size.clamp(MIN_CODE_SIZE, MAX_CODE_SIZE)
}

/// Engine-wide configuration.
///
/// Every key is optional in the JSON form:
///
/// ```json
/// { "canvas": "ticket", "preview_width": 480, "request_timeout_secs": 10 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Canvas name: "badge" or "ticket".
    #[serde(default = "default_canvas_name")]
    pub canvas: String,
    /// Width of the interactive preview in screen pixels.
    #[serde(default = "default_preview_width")]
    pub preview_width: f64,
    /// Vertical stagger (percent) between newly added fields.
    #[serde(default = "default_field_y_step")]
    pub field_y_step: f64,
    /// Upper bound for any collaborator call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Payload encoded into the sample code image.
    #[serde(default = "default_sample_payload")]
    pub sample_payload: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: default_canvas_name(),
            preview_width: default_preview_width(),
            field_y_step: default_field_y_step(),
            request_timeout_secs: default_request_timeout_secs(),
            sample_payload: default_sample_payload(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BadgeError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Resolve the configured canvas, falling back to the badge canvas.
    pub fn template_canvas(&self) -> TemplateCanvas {
        TemplateCanvas::by_name(&self.canvas).unwrap_or_else(|| {
            tracing::warn!(canvas = %self.canvas, "unknown canvas, using badge");
            TemplateCanvas::BADGE
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
