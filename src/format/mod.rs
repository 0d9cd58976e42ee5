//! # Text Formatting
//!
//! A [`FormattingRecord`] is the flat set of style attributes of one text
//! field, equivalent to a single rich-text run. The [`codec`] module maps it
//! to and from the markup held by the editing surface.
//!
//! ```
//! use badgekit::format::{Alignment, FormattingRecord, codec};
//! use badgekit::canvas::FontSizeRange;
//!
//! let record = FormattingRecord {
//!     text: "Ada".into(),
//!     is_bold: true,
//!     alignment: Alignment::Center,
//!     ..Default::default()
//! };
//! let markup = codec::encode(&record);
//! assert_eq!(markup, r#"<p style="text-align:center"><strong>Ada</strong></p>"#);
//! assert_eq!(codec::decode(&markup, FontSizeRange::BADGE), record);
//! ```

pub mod codec;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{decode, encode, normalize_color};

pub const DEFAULT_FONT_SIZE: u32 = 14;
pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    /// Parse a CSS `text-align` value. Anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Style attributes of one text field.
///
/// Serialized with the hosting application's camelCase keys
/// (`fontSize`, `isBold`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattingRecord {
    #[serde(default)]
    pub text: String,
    /// Size in template-space pixels.
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Hex color, `#rrggbb`.
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_underline: bool,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default)]
    pub alignment: Alignment,
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_font_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

impl Default for FormattingRecord {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            color: default_color(),
            is_bold: false,
            is_italic: false,
            is_underline: false,
            font_family: default_font_family(),
            alignment: Alignment::Left,
        }
    }
}

impl FormattingRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn has_default_size(&self) -> bool {
        self.font_size == DEFAULT_FONT_SIZE
    }

    pub fn has_default_color(&self) -> bool {
        self.color.eq_ignore_ascii_case(DEFAULT_COLOR)
    }

    pub fn has_default_family(&self) -> bool {
        self.font_family == DEFAULT_FONT_FAMILY
    }

    /// Every attribute that differs between `self` and `other`, expressed as
    /// the change that turns `self` into `other`.
    pub fn diff(&self, other: &FormattingRecord) -> Vec<FormatChange> {
        let mut changes = Vec::new();
        if self.text != other.text {
            changes.push(FormatChange::Text(other.text.clone()));
        }
        if self.font_size != other.font_size {
            changes.push(FormatChange::FontSize(other.font_size));
        }
        if self.color != other.color {
            changes.push(FormatChange::Color(other.color.clone()));
        }
        if self.is_bold != other.is_bold {
            changes.push(FormatChange::Bold(other.is_bold));
        }
        if self.is_italic != other.is_italic {
            changes.push(FormatChange::Italic(other.is_italic));
        }
        if self.is_underline != other.is_underline {
            changes.push(FormatChange::Underline(other.is_underline));
        }
        if self.font_family != other.font_family {
            changes.push(FormatChange::FontFamily(other.font_family.clone()));
        }
        if self.alignment != other.alignment {
            changes.push(FormatChange::Alignment(other.alignment));
        }
        changes
    }

    pub fn apply(&mut self, change: &FormatChange) {
        match change {
            FormatChange::Text(text) => self.text = text.clone(),
            FormatChange::FontSize(size) => self.font_size = *size,
            FormatChange::Color(color) => self.color = color.clone(),
            FormatChange::Bold(on) => self.is_bold = *on,
            FormatChange::Italic(on) => self.is_italic = *on,
            FormatChange::Underline(on) => self.is_underline = *on,
            FormatChange::FontFamily(family) => self.font_family = family.clone(),
            FormatChange::Alignment(alignment) => self.alignment = *alignment,
        }
    }
}

/// A single attribute update on a [`FormattingRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum FormatChange {
    Text(String),
    FontSize(u32),
    Color(String),
    Bold(bool),
    Italic(bool),
    Underline(bool),
    FontFamily(String),
    Alignment(Alignment),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let record = FormattingRecord::default();
        assert_eq!(record.font_size, 14);
        assert_eq!(record.color, "#000000");
        assert_eq!(record.font_family, "Arial");
        assert_eq!(record.alignment, Alignment::Left);
        assert!(!record.is_bold && !record.is_italic && !record.is_underline);
        assert!(record.text.is_empty());
    }

    #[test]
    fn test_deserialize_missing_keys_uses_defaults() {
        let record: FormattingRecord = serde_json::from_str(r#"{"text":"Hi","isBold":true}"#).unwrap();
        assert_eq!(
            record,
            FormattingRecord {
                text: "Hi".into(),
                is_bold: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_diff_lists_each_changed_attribute() {
        let old = FormattingRecord::new("A");
        let new = FormattingRecord {
            text: "B".into(),
            is_italic: true,
            alignment: Alignment::Right,
            ..Default::default()
        };
        assert_eq!(
            old.diff(&new),
            vec![
                FormatChange::Text("B".into()),
                FormatChange::Italic(true),
                FormatChange::Alignment(Alignment::Right),
            ]
        );
    }

    #[test]
    fn test_apply_diff_reaches_target() {
        let mut record = FormattingRecord::default();
        let target = FormattingRecord {
            text: "Grace".into(),
            font_size: 32,
            color: "#ff0000".into(),
            is_underline: true,
            font_family: "Roboto".into(),
            ..Default::default()
        };
        for change in record.diff(&target) {
            record.apply(&change);
        }
        assert_eq!(record, target);
        assert!(record.diff(&target).is_empty());
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!(Alignment::parse(" Center "), Some(Alignment::Center));
        assert_eq!(Alignment::parse("end"), Some(Alignment::Right));
        assert_eq!(Alignment::parse("justify"), None);
    }

    #[test]
    fn test_default_color_is_case_insensitive() {
        let record = FormattingRecord {
            color: "#000000".to_uppercase(),
            ..Default::default()
        };
        assert!(record.has_default_color());
    }
}
