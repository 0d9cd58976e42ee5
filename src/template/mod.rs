//! # Template Model
//!
//! The aggregate an editing session mutates: custom text fields, the code
//! block, optional logo and background, and the branding media list.
//!
//! All coordinates are relative to the session's
//! [`TemplateCanvas`](crate::canvas::TemplateCanvas).
//!
//! ## Asset handles
//!
//! Files attached during the session are referenced by a temporary handle
//! ([`AssetRef::Temporary`]) and their bytes are kept as a
//! [`PendingUpload`] until the hosting application returns a durable URL
//! (see [`TemplateModel::resolve_upload`]).

mod fields;
mod media;

pub use fields::{FIELD_LABEL_PREFIX, next_field_label};
pub use media::{DeleteRequest, MediaKey, MediaKind, Removal};

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::canvas::clamp_code_size;
use crate::format::{FormatChange, FormattingRecord};
use crate::position::PositionedElement;

pub const DEFAULT_CODE_SIZE: u32 = 70;
pub const DEFAULT_FIELD_Y_STEP: f64 = 5.0;

/// One custom text field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomField {
    pub id: String,
    pub label: String,
    pub format: FormattingRecord,
    pub position: PositionedElement,
}

/// A single update to a field, as produced by its editing surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "change", rename_all = "snake_case")]
pub enum FieldChange {
    Format(FormatChange),
    X(f64),
    Y(f64),
}

impl CustomField {
    pub fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::Format(change) => self.format.apply(change),
            FieldChange::X(x) => self.position.set_x(*x),
            FieldChange::Y(y) => self.position.set_y(*y),
        }
    }
}

/// Placement of the scannable code. `size` is the square edge in
/// template-space pixels and drives image regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CodeBlock {
    pub position: PositionedElement,
    pub size: u32,
}

impl Default for CodeBlock {
    fn default() -> Self {
        Self {
            position: PositionedElement::at(75.0, 60.0),
            size: DEFAULT_CODE_SIZE,
        }
    }
}

/// Handle for an asset that only exists in this session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TempHandle(pub String);

impl TempHandle {
    pub fn generate() -> Self {
        Self(format!("tmp-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for TempHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an asset's bytes live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AssetRef {
    /// Durable reference owned by the hosting application.
    Url(String),
    /// Local file awaiting upload.
    Temporary(TempHandle),
}

impl AssetRef {
    pub fn is_temporary(&self) -> bool {
        matches!(self, AssetRef::Temporary(_))
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            AssetRef::Url(url) => Some(url),
            AssetRef::Temporary(_) => None,
        }
    }
}

/// Logo or background.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaBlock {
    pub asset: AssetRef,
    pub position: PositionedElement,
}

/// One branding media item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandingItem {
    /// Session-local identity; stable while the list is edited.
    pub key: String,
    /// Identity in the hosting application, once stored there.
    pub persisted_id: Option<String>,
    pub asset: AssetRef,
    pub position: PositionedElement,
    pub name: Option<String>,
    pub website: Option<String>,
}

impl BrandingItem {
    pub fn new(asset: AssetRef, position: PositionedElement) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            persisted_id: None,
            asset,
            position,
            name: None,
            website: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted_id.is_some()
    }
}

/// Bytes of a locally attached file, waiting for the upload collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub handle: TempHandle,
    pub kind: MediaKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// What the upload collaborator returns for a stored asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    /// Identity of the stored item, when the host assigns one.
    pub id: Option<String>,
}

/// The template being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateModel {
    pub fields: Vec<CustomField>,
    pub code: CodeBlock,
    pub logo: Option<MediaBlock>,
    pub background: Option<MediaBlock>,
    pub branding: Vec<BrandingItem>,
    /// Vertical stagger (percent) between newly added fields.
    pub field_y_step: f64,
    uploads: Vec<PendingUpload>,
    removed_branding_ids: Vec<String>,
    clear_branding: bool,
    busy: BTreeSet<MediaKey>,
}

impl Default for TemplateModel {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            code: CodeBlock::default(),
            logo: None,
            background: None,
            branding: Vec::new(),
            field_y_step: DEFAULT_FIELD_Y_STEP,
            uploads: Vec::new(),
            removed_branding_ids: Vec::new(),
            clear_branding: false,
            busy: BTreeSet::new(),
        }
    }
}

impl TemplateModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the code size, clamped to the supported range. Returns
    /// whether the stored value actually changed.
    pub fn set_code_size(&mut self, size: u32) -> bool {
        let size = clamp_code_size(size);
        let changed = self.code.size != size;
        self.code.size = size;
        changed
    }

    pub fn pending_uploads(&self) -> &[PendingUpload] {
        &self.uploads
    }

    /// Persisted branding ids removed during this session.
    pub fn removed_branding_ids(&self) -> &[String] {
        &self.removed_branding_ids
    }

    /// Whether the branding list was cleared remotely during this session.
    pub fn branding_cleared(&self) -> bool {
        self.clear_branding
    }

    /// Temporary handles still referenced anywhere in the model.
    pub fn temporary_handles(&self) -> Vec<&TempHandle> {
        let slots = [self.logo.as_ref(), self.background.as_ref()];
        slots
            .into_iter()
            .flatten()
            .map(|block| &block.asset)
            .chain(self.branding.iter().map(|item| &item.asset))
            .filter_map(|asset| match asset {
                AssetRef::Temporary(handle) => Some(handle),
                AssetRef::Url(_) => None,
            })
            .collect()
    }

    /// Swap a temporary handle for the durable reference the host returned.
    ///
    /// Returns `false` when the handle is no longer referenced (the item was
    /// removed in the meantime).
    pub fn resolve_upload(&mut self, handle: &TempHandle, uploaded: UploadedAsset) -> bool {
        self.uploads.retain(|upload| &upload.handle != handle);
        let target = AssetRef::Temporary(handle.clone());

        for block in [self.logo.as_mut(), self.background.as_mut()].into_iter().flatten() {
            if block.asset == target {
                block.asset = AssetRef::Url(uploaded.url);
                return true;
            }
        }
        if let Some(item) = self.branding.iter_mut().find(|item| item.asset == target) {
            item.asset = AssetRef::Url(uploaded.url);
            if uploaded.id.is_some() {
                item.persisted_id = uploaded.id;
            }
            return true;
        }
        false
    }

    /// Drop the bytes behind a temporary handle.
    fn release(&mut self, asset: &AssetRef) {
        if let AssetRef::Temporary(handle) = asset {
            self.uploads.retain(|upload| &upload.handle != handle);
        }
    }

    /// Forget the outbound removal bookkeeping once a save has gone through.
    pub fn mark_saved(&mut self) {
        self.removed_branding_ids.clear();
        self.clear_branding = false;
    }
}
