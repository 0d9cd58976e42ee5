//! # Persistence Contract
//!
//! Converts a [`TemplateModel`] to and from the configuration blob the
//! hosting application stores.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "fields": [{ "id": "…", "label": "field1", "x": 0, "y": 5, "fontSize": 14,
//!                "fontFamily": "Arial", "text": "", "color": "#000000",
//!                "isBold": false, "isItalic": false, "isUnderline": false,
//!                "alignment": "left" }],
//!   "logo": { "url": "…", "width": 0, "height": 0, "x": 5, "y": 5 },
//!   "backgroundImage": { "url": "…" },
//!   "brandingMedia": { "items": [{ "_id": "…", "url": "…", "width": 0, "height": 0, "x": 5, "y": 85 }] },
//!   "qr": { "x": 75, "y": 60, "size": 70 }
//! }
//! ```
//!
//! The host's schema has no null sizes, so an auto width or height is
//! written as `0` and read back as auto. Reading is lenient: missing
//! sub-objects take defaults and numbers may arrive as floats or strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::canvas::{TemplateCanvas, clamp_code_size};
use crate::error::BadgeError;
use crate::format::{
    Alignment, DEFAULT_COLOR, DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, FormattingRecord,
};
use crate::position::{PositionedElement, clamp_axis};
use crate::template::{
    AssetRef, BrandingItem, CodeBlock, CustomField, DEFAULT_CODE_SIZE, MediaBlock, PendingUpload,
    TemplateModel, next_field_label,
};

// ============================================================================
// LENIENT READERS
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            LooseNumber::Int(n) => *n as f64,
            LooseNumber::Float(n) => *n,
            LooseNumber::Text(s) => s.trim().trim_end_matches("px").trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Reads a number that may be an integer, a float, a numeric string, or
/// null. Anything unreadable is `None`.
fn deserialize_loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LooseNumber>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(LooseNumber::as_f64))
}

/// Unknown alignment strings read as left.
fn deserialize_alignment<'de, D>(deserializer: D) -> Result<Alignment, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(Alignment::parse).unwrap_or_default())
}

/// Auto sizes go out as `0`.
fn serialize_size<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(value.unwrap_or(0.0))
}

/// `0`, negative, or absent sizes read back as auto.
fn size_from_wire(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

fn round_u32(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// One text field as stored by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_bold: bool,
    #[serde(default)]
    pub is_italic: bool,
    #[serde(default)]
    pub is_underline: bool,
    #[serde(default, deserialize_with = "deserialize_alignment")]
    pub alignment: Alignment,
}

/// Logo slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogoConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_loose_f64", serialize_with = "serialize_size")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64", serialize_with = "serialize_size")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub y: Option<f64>,
}

/// Background slot. The background always covers the canvas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default)]
    pub url: String,
}

/// One branding media item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrandingConfig {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_loose_f64", serialize_with = "serialize_size")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64", serialize_with = "serialize_size")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrandingMediaConfig {
    #[serde(default)]
    pub items: Vec<BrandingConfig>,
}

/// Code placement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QrConfig {
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub y: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_loose_f64")]
    pub size: Option<f64>,
}

/// The configuration blob exchanged with the hosting application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigBlob {
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<LogoConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<BackgroundConfig>,
    #[serde(default)]
    pub branding_media: BrandingMediaConfig,
    #[serde(default)]
    pub qr: QrConfig,
}

impl ConfigBlob {
    pub fn from_json(json: &str) -> Result<Self, BadgeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, BadgeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// SERIALIZE
// ============================================================================

fn durable_url(asset: &AssetRef) -> Result<String, BadgeError> {
    match asset {
        AssetRef::Url(url) => Ok(url.clone()),
        AssetRef::Temporary(handle) => Err(BadgeError::UnresolvedAsset(handle.to_string())),
    }
}

/// Convert a model to its stored form.
///
/// Fails with [`BadgeError::UnresolvedAsset`] while any asset still points at
/// a temporary handle; uploads must be resolved first.
pub fn serialize(model: &TemplateModel) -> Result<ConfigBlob, BadgeError> {
    let fields = model
        .fields
        .iter()
        .map(|field| {
            let format = &field.format;
            FieldConfig {
                id: field.id.clone(),
                label: field.label.clone(),
                x: Some(field.position.x),
                y: Some(field.position.y),
                font_size: Some(format.font_size as f64),
                font_family: Some(format.font_family.clone()),
                text: format.text.clone(),
                color: Some(format.color.clone()),
                is_bold: format.is_bold,
                is_italic: format.is_italic,
                is_underline: format.is_underline,
                alignment: format.alignment,
            }
        })
        .collect();

    let logo = model
        .logo
        .as_ref()
        .map(|logo| -> Result<LogoConfig, BadgeError> {
            Ok(LogoConfig {
                url: durable_url(&logo.asset)?,
                width: logo.position.width,
                height: logo.position.height,
                x: Some(logo.position.x),
                y: Some(logo.position.y),
            })
        })
        .transpose()?;

    let background_image = model
        .background
        .as_ref()
        .map(|bg| -> Result<BackgroundConfig, BadgeError> {
            Ok(BackgroundConfig {
                url: durable_url(&bg.asset)?,
            })
        })
        .transpose()?;

    let items = model
        .branding
        .iter()
        .map(|item| {
            Ok(BrandingConfig {
                id: item.persisted_id.clone(),
                url: durable_url(&item.asset)?,
                width: item.position.width,
                height: item.position.height,
                x: Some(item.position.x),
                y: Some(item.position.y),
                name: item.name.clone(),
                website: item.website.clone(),
            })
        })
        .collect::<Result<Vec<_>, BadgeError>>()?;

    Ok(ConfigBlob {
        fields,
        logo,
        background_image,
        branding_media: BrandingMediaConfig { items },
        qr: QrConfig {
            x: Some(model.code.position.x),
            y: Some(model.code.position.y),
            size: Some(model.code.size as f64),
        },
    })
}

// ============================================================================
// DESERIALIZE
// ============================================================================

fn position_from_wire(
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    fallback: (f64, f64),
) -> PositionedElement {
    PositionedElement {
        x: clamp_axis(x.unwrap_or(fallback.0)),
        y: clamp_axis(y.unwrap_or(fallback.1)),
        width: size_from_wire(width),
        height: size_from_wire(height),
    }
}

fn field_from_wire(config: &FieldConfig) -> FormattingRecord {
    let font_size = config
        .font_size
        .filter(|size| *size > 0.0)
        .map(round_u32)
        .unwrap_or(DEFAULT_FONT_SIZE);
    if config.font_size.is_some_and(|size| size.fract() != 0.0) {
        debug!(id = %config.id, font_size = ?config.font_size, "rounded fractional font size");
    }
    FormattingRecord {
        text: config.text.clone(),
        font_size,
        color: config
            .color
            .as_deref()
            .and_then(crate::format::normalize_color)
            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        is_bold: config.is_bold,
        is_italic: config.is_italic,
        is_underline: config.is_underline,
        font_family: config
            .font_family
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FONT_FAMILY)
            .to_string(),
        alignment: config.alignment,
    }
}

/// [`deserialize`] for a specific canvas: stored font sizes outside the
/// canvas range are clamped into it.
pub fn deserialize_for(blob: &ConfigBlob, canvas: &TemplateCanvas) -> TemplateModel {
    let mut model = deserialize(blob);
    let range = canvas.font_sizes;
    for field in &mut model.fields {
        let size = range.clamp(field.format.font_size);
        if size != field.format.font_size {
            warn!(
                id = %field.id,
                stored = field.format.font_size,
                clamped = size,
                canvas = canvas.name,
                "stored font size outside canvas range"
            );
            field.format.font_size = size;
        }
    }
    model
}

/// Build a model from a stored blob. Missing parts take their defaults.
pub fn deserialize(blob: &ConfigBlob) -> TemplateModel {
    let mut model = TemplateModel::new();

    for (index, config) in blob.fields.iter().enumerate() {
        let fallback_y = clamp_axis((index + 1) as f64 * model.field_y_step);
        let id = if config.id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.id.clone()
        };
        let label = if config.label.trim().is_empty() {
            next_field_label(model.fields.iter().map(|f| f.label.as_str()))
        } else {
            config.label.clone()
        };
        model.fields.push(CustomField {
            id,
            label,
            format: field_from_wire(config),
            position: position_from_wire(config.x, config.y, None, None, (0.0, fallback_y)),
        });
    }

    model.code = CodeBlock {
        position: position_from_wire(blob.qr.x, blob.qr.y, None, None, (75.0, 60.0)),
        size: blob
            .qr
            .size
            .filter(|size| *size > 0.0)
            .map(|size| clamp_code_size(round_u32(size)))
            .unwrap_or(DEFAULT_CODE_SIZE),
    };

    model.logo = blob
        .logo
        .as_ref()
        .filter(|logo| !logo.url.trim().is_empty())
        .map(|logo| MediaBlock {
            asset: AssetRef::Url(logo.url.clone()),
            position: position_from_wire(logo.x, logo.y, logo.width, logo.height, (5.0, 5.0)),
        });

    model.background = blob
        .background_image
        .as_ref()
        .filter(|bg| !bg.url.trim().is_empty())
        .map(|bg| MediaBlock {
            asset: AssetRef::Url(bg.url.clone()),
            position: PositionedElement::at(0.0, 0.0),
        });

    for config in &blob.branding_media.items {
        if config.url.trim().is_empty() {
            warn!(id = ?config.id, "skipping branding item without url");
            continue;
        }
        let position =
            position_from_wire(config.x, config.y, config.width, config.height, (5.0, 85.0));
        model.branding.push(BrandingItem {
            persisted_id: config.id.clone().filter(|id| !id.is_empty()),
            name: config.name.clone(),
            website: config.website.clone(),
            ..BrandingItem::new(AssetRef::Url(config.url.clone()), position)
        });
    }

    model
}

// ============================================================================
// SAVE PAYLOAD
// ============================================================================

/// Everything besides the blob that a save hands to the hosting
/// application.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    /// Local files still to upload, in attach order.
    #[serde(serialize_with = "serialize_upload_manifest")]
    pub uploads: Vec<PendingUpload>,
    /// Persisted branding items deleted during the session.
    pub removed_branding_ids: Vec<String>,
    /// Whether the branding list was cleared remotely.
    pub clear_branding: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadManifestEntry<'a> {
    handle: &'a str,
    kind: String,
    file_name: &'a str,
    size: usize,
}

/// Uploads are listed without their bytes.
fn serialize_upload_manifest<S>(uploads: &[PendingUpload], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(uploads.iter().map(|upload| UploadManifestEntry {
        handle: &upload.handle.0,
        kind: upload.kind.to_string(),
        file_name: &upload.file_name,
        size: upload.bytes.len(),
    }))
}

impl SavePayload {
    pub fn has_uploads(&self) -> bool {
        !self.uploads.is_empty()
    }
}

/// Collect the outbound save bookkeeping of `model`.
pub fn prepare_save(model: &TemplateModel) -> SavePayload {
    SavePayload {
        uploads: model.pending_uploads().to_vec(),
        removed_branding_ids: model.removed_branding_ids().to_vec(),
        clear_branding: model.branding_cleared(),
    }
}
