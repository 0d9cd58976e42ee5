//! # Font Registry
//!
//! Turns font descriptors supplied by the hosting application into face
//! definitions that the editing surface and the preview can both use.
//!
//! The registry is pure bookkeeping: it never installs stylesheets or
//! touches any global rendering state. Callers take the returned
//! [`FaceDefinition`]s (or their [`FaceDefinition::to_css`] form) into their
//! own rendering context before drawing text in a non-default family.
//!
//! ## Descriptor format
//!
//! ```json
//! [{ "family": "Open Sans",
//!    "files": [{ "path": "/fonts/OpenSans-Bold.woff2", "weight": 700, "style": "normal" }] }]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Families every session can use without any face files.
pub const BUILTIN_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Verdana",
    "Courier New",
    "Trebuchet MS",
];

/// One family and its font files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub family: String,
    #[serde(default)]
    pub files: Vec<FontFile>,
}

/// A single font file of a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontFile {
    pub path: String,
    /// CSS weight: accepts a number, a numeric string, `"normal"` or `"bold"`.
    #[serde(default = "default_weight", deserialize_with = "deserialize_weight")]
    pub weight: u16,
    #[serde(default)]
    pub style: FontStyle,
}

fn default_weight() -> u16 {
    400
}

/// Custom deserializer for weight: accepts 700, "700", "bold" or "normal".
fn deserialize_weight<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WeightValue {
        Number(u16),
        Text(String),
    }

    match WeightValue::deserialize(deserializer)? {
        WeightValue::Number(n) => Ok(n),
        WeightValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "regular" => Ok(400),
            "bold" => Ok(700),
            other => other
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid font weight '{s}'"))),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontStyle::Normal => "normal",
            FontStyle::Italic => "italic",
            FontStyle::Oblique => "oblique",
        }
    }
}

/// Embedding format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    Woff2,
    Woff,
    TrueType,
    OpenType,
}

impl FontFormat {
    pub fn from_path(path: &str) -> Option<Self> {
        let file = path.split(['?', '#']).next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "woff2" => Some(FontFormat::Woff2),
            "woff" => Some(FontFormat::Woff),
            "ttf" => Some(FontFormat::TrueType),
            "otf" => Some(FontFormat::OpenType),
            _ => None,
        }
    }

    pub fn css_name(&self) -> &'static str {
        match self {
            FontFormat::Woff2 => "woff2",
            FontFormat::Woff => "woff",
            FontFormat::TrueType => "truetype",
            FontFormat::OpenType => "opentype",
        }
    }
}

/// A renderable face: one `(family, weight, style)` backed by one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceDefinition {
    pub family: String,
    pub weight: u16,
    pub style: FontStyle,
    pub src: String,
    pub format: FontFormat,
}

impl FaceDefinition {
    /// `@font-face` rule for stylesheet-based renderers.
    pub fn to_css(&self) -> String {
        format!(
            "@font-face {{ font-family: '{}'; src: url('{}') format('{}'); font-weight: {}; font-style: {}; font-display: block; }}",
            self.family.replace('\'', "\\'"),
            self.src.replace('\'', "%27"),
            self.format.css_name(),
            self.weight,
            self.style.as_str(),
        )
    }
}

impl fmt::Display for FaceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.family, self.weight, self.style.as_str())
    }
}

/// Face definitions for a descriptor list.
///
/// Files are grouped by `(weight, style)` in first-seen order; each group
/// yields one face from its first file with a recognised extension.
pub fn face_definitions(descriptors: &[FontDescriptor]) -> Vec<FaceDefinition> {
    let mut faces = Vec::new();
    for descriptor in descriptors {
        let mut groups: Vec<((u16, FontStyle), &FontFile)> = Vec::new();
        for file in &descriptor.files {
            if FontFormat::from_path(&file.path).is_none() {
                warn!(
                    family = %descriptor.family,
                    path = %file.path,
                    "skipping font file with unknown extension"
                );
                continue;
            }
            let key = (file.weight, file.style);
            if !groups.iter().any(|(k, _)| *k == key) {
                groups.push((key, file));
            }
        }
        for ((weight, style), file) in groups {
            if let Some(format) = FontFormat::from_path(&file.path) {
                faces.push(FaceDefinition {
                    family: descriptor.family.clone(),
                    weight,
                    style,
                    src: file.path.clone(),
                    format,
                });
            }
        }
    }
    faces
}

/// Per-session registry of installed families.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    faces: BTreeMap<String, Vec<FaceDefinition>>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install descriptors and return every face definition now known.
    ///
    /// Families already installed are left untouched, so calling this again
    /// with the same feed changes nothing.
    pub fn install(&mut self, descriptors: &[FontDescriptor]) -> Vec<FaceDefinition> {
        for face in face_definitions(descriptors) {
            let family = self.faces.entry(face.family.clone()).or_default();
            if family
                .iter()
                .any(|f| f.weight == face.weight && f.style == face.style)
            {
                continue;
            }
            debug!(face = %face, "installing font face");
            family.push(face);
        }
        self.faces.values().flatten().cloned().collect()
    }

    /// Faces installed for a family.
    pub fn faces_for(&self, family: &str) -> &[FaceDefinition] {
        self.faces.get(family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether text in `family` can render without a fallback flash.
    pub fn is_available(&self, family: &str) -> bool {
        BUILTIN_FAMILIES.iter().any(|b| b.eq_ignore_ascii_case(family))
            || self.faces.contains_key(family)
    }

    /// Families offered by the font selector: built-ins, then installed.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = BUILTIN_FAMILIES.iter().map(|f| f.to_string()).collect();
        for family in self.faces.keys() {
            if !families.iter().any(|f| f == family) {
                families.push(family.clone());
            }
        }
        families
    }

    /// Stylesheet text for every installed face.
    pub fn stylesheet(&self) -> String {
        self.faces
            .values()
            .flatten()
            .map(FaceDefinition::to_css)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
