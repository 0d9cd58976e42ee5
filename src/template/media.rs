//! Logo, background, and branding media lifecycle.
//!
//! Removal depends on whether the hosting application already stores the
//! asset:
//!
//! - local-only items (temporary handle, or branding without a persisted id)
//!   are removed at once and their pending upload is released;
//! - persisted items need confirmation and a remote delete. The two-phase
//!   [`TemplateModel::begin_delete`] / [`TemplateModel::finish_delete`]
//!   pair marks the item busy while the request is in flight, so it can be
//!   neither edited nor deleted twice, and only removes it locally once the
//!   remote delete succeeded.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{AssetRef, BrandingItem, MediaBlock, PendingUpload, TempHandle, TemplateModel};
use crate::error::BadgeError;
use crate::position::{Dimension, PositionedElement};

/// Media category, as understood by the delete collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Logo,
    Background,
    Branding,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Logo => "logo",
            MediaKind::Background => "background",
            MediaKind::Branding => "branding",
        })
    }
}

/// Addresses one media slot of the template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKey {
    Logo,
    Background,
    Branding(String),
    /// The whole branding list, for "clear all".
    AllBranding,
}

impl MediaKey {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaKey::Logo => MediaKind::Logo,
            MediaKey::Background => MediaKind::Background,
            MediaKey::Branding(_) | MediaKey::AllBranding => MediaKind::Branding,
        }
    }
}

impl fmt::Display for MediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKey::Logo => f.write_str("logo"),
            MediaKey::Background => f.write_str("background"),
            MediaKey::Branding(key) => write!(f, "branding:{key}"),
            MediaKey::AllBranding => f.write_str("branding:*"),
        }
    }
}

/// Outcome of asking to remove something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Removed locally; nothing else to do.
    Removed,
    /// Persisted remotely: confirm, then run the remote delete.
    NeedsConfirmation,
}

/// An in-flight remote delete. Identity is `None` for "clear all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: MediaKey,
    pub kind: MediaKind,
    pub identity: Option<String>,
}

impl TemplateModel {
    // ------------------------------------------------------------------
    // Attach
    // ------------------------------------------------------------------

    /// Attach a local logo file, replacing any current logo.
    pub fn attach_logo(&mut self, file_name: &str, bytes: Vec<u8>) -> TempHandle {
        let position = self
            .logo
            .as_ref()
            .map(|l| l.position)
            .unwrap_or_else(|| PositionedElement::at(5.0, 5.0));
        if let Some(previous) = self.logo.take() {
            self.release(&previous.asset);
        }
        let handle = self.stage_upload(MediaKind::Logo, file_name, bytes);
        self.logo = Some(MediaBlock {
            asset: AssetRef::Temporary(handle.clone()),
            position,
        });
        handle
    }

    /// Attach a local background file, replacing any current background.
    pub fn attach_background(&mut self, file_name: &str, bytes: Vec<u8>) -> TempHandle {
        if let Some(previous) = self.background.take() {
            self.release(&previous.asset);
        }
        let handle = self.stage_upload(MediaKind::Background, file_name, bytes);
        self.background = Some(MediaBlock {
            asset: AssetRef::Temporary(handle.clone()),
            position: PositionedElement::at(0.0, 0.0),
        });
        handle
    }

    /// Append a local branding file. Returns the item's session key.
    pub fn add_branding(&mut self, file_name: &str, bytes: Vec<u8>) -> String {
        let handle = self.stage_upload(MediaKind::Branding, file_name, bytes);
        let offset = (self.branding.len() % 10) as f64 * 8.0;
        let item = BrandingItem::new(
            AssetRef::Temporary(handle),
            PositionedElement::at(5.0 + offset, 85.0),
        );
        let key = item.key.clone();
        self.branding.push(item);
        key
    }

    fn stage_upload(&mut self, kind: MediaKind, file_name: &str, bytes: Vec<u8>) -> TempHandle {
        let handle = TempHandle::generate();
        debug!(%handle, %kind, file_name, size = bytes.len(), "staging upload");
        self.uploads.push(PendingUpload {
            handle: handle.clone(),
            kind,
            file_name: file_name.to_string(),
            bytes,
        });
        handle
    }

    // ------------------------------------------------------------------
    // Edit
    // ------------------------------------------------------------------

    pub fn branding_item(&self, key: &str) -> Option<&BrandingItem> {
        self.branding.iter().find(|item| item.key == key)
    }

    pub fn is_busy(&self, key: &MediaKey) -> bool {
        if self.busy.contains(key) {
            return true;
        }
        match key {
            MediaKey::Branding(_) => self.busy.contains(&MediaKey::AllBranding),
            MediaKey::AllBranding => self.busy.iter().any(|k| matches!(k, MediaKey::Branding(_))),
            _ => false,
        }
    }

    fn ensure_editable(&self, key: &MediaKey) -> Result<(), BadgeError> {
        if self.is_busy(key) {
            return Err(BadgeError::MediaBusy(key.to_string()));
        }
        Ok(())
    }

    fn position_mut(&mut self, key: &MediaKey) -> Result<&mut PositionedElement, BadgeError> {
        let unknown = || BadgeError::UnknownMedia(key.to_string());
        match key {
            MediaKey::Logo => self.logo.as_mut().map(|b| &mut b.position).ok_or_else(unknown),
            MediaKey::Background => self
                .background
                .as_mut()
                .map(|b| &mut b.position)
                .ok_or_else(unknown),
            MediaKey::Branding(k) => self
                .branding
                .iter_mut()
                .find(|item| &item.key == k)
                .map(|item| &mut item.position)
                .ok_or_else(unknown),
            MediaKey::AllBranding => Err(unknown()),
        }
    }

    /// Move a media element. Coordinates are clamped.
    pub fn move_media(&mut self, key: &MediaKey, x: f64, y: f64) -> Result<(), BadgeError> {
        self.ensure_editable(key)?;
        let position = self.position_mut(key)?;
        position.set_x(x);
        position.set_y(y);
        Ok(())
    }

    /// Resize a media element; [`Dimension::Auto`] restores intrinsic size.
    pub fn resize_media(
        &mut self,
        key: &MediaKey,
        width: Dimension,
        height: Dimension,
    ) -> Result<(), BadgeError> {
        self.ensure_editable(key)?;
        let position = self.position_mut(key)?;
        position.set_width(width);
        position.set_height(height);
        Ok(())
    }

    pub fn set_branding_details(
        &mut self,
        key: &str,
        name: Option<String>,
        website: Option<String>,
    ) -> Result<(), BadgeError> {
        let media_key = MediaKey::Branding(key.to_string());
        self.ensure_editable(&media_key)?;
        let item = self
            .branding
            .iter_mut()
            .find(|item| item.key == key)
            .ok_or_else(|| BadgeError::UnknownMedia(media_key.to_string()))?;
        item.name = name.filter(|n| !n.trim().is_empty());
        item.website = website.filter(|w| !w.trim().is_empty());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    /// Remote identity of a slot, `None` when it is local-only.
    fn persisted_identity(&self, key: &MediaKey) -> Result<Option<String>, BadgeError> {
        let unknown = || BadgeError::UnknownMedia(key.to_string());
        let from_block = |block: Option<&MediaBlock>| {
            block
                .map(|b| b.asset.url().map(str::to_string))
                .ok_or_else(unknown)
        };
        match key {
            MediaKey::Logo => from_block(self.logo.as_ref()),
            MediaKey::Background => from_block(self.background.as_ref()),
            MediaKey::Branding(k) => self
                .branding
                .iter()
                .find(|item| &item.key == k)
                .map(|item| item.persisted_id.clone())
                .ok_or_else(unknown),
            MediaKey::AllBranding => Ok(None),
        }
    }

    /// Ask to remove a single slot.
    ///
    /// Local-only items are removed immediately. Persisted items are left
    /// untouched and [`Removal::NeedsConfirmation`] is returned.
    pub fn request_removal(&mut self, key: &MediaKey) -> Result<Removal, BadgeError> {
        if matches!(key, MediaKey::AllBranding) {
            return Ok(self.request_clear_branding());
        }
        self.ensure_editable(key)?;
        if self.persisted_identity(key)?.is_some() {
            return Ok(Removal::NeedsConfirmation);
        }
        self.remove_local(key);
        debug!(%key, "removed local media");
        Ok(Removal::Removed)
    }

    /// Ask to clear the branding list.
    ///
    /// Clears at once when no item is persisted; otherwise nothing changes
    /// and confirmation is needed.
    pub fn request_clear_branding(&mut self) -> Removal {
        if self.branding.iter().any(BrandingItem::is_persisted) {
            return Removal::NeedsConfirmation;
        }
        for item in std::mem::take(&mut self.branding) {
            self.release(&item.asset);
        }
        Removal::Removed
    }

    /// Start the remote delete of a confirmed removal; marks the slot busy.
    pub fn begin_delete(&mut self, key: &MediaKey) -> Result<DeleteRequest, BadgeError> {
        self.ensure_editable(key)?;
        let identity = self.persisted_identity(key)?;
        if identity.is_none() && !matches!(key, MediaKey::AllBranding) {
            return Err(BadgeError::NotPersisted(key.to_string()));
        }
        self.busy.insert(key.clone());
        Ok(DeleteRequest {
            key: key.clone(),
            kind: key.kind(),
            identity,
        })
    }

    /// Settle a remote delete.
    ///
    /// On success the slot is removed locally; on failure the model is left
    /// as it was and the error is handed back for the user.
    pub fn finish_delete(
        &mut self,
        request: &DeleteRequest,
        outcome: Result<(), BadgeError>,
    ) -> Result<(), BadgeError> {
        self.busy.remove(&request.key);
        match outcome {
            Ok(()) => {
                info!(key = %request.key, "remote media delete succeeded");
                if matches!(request.key, MediaKey::AllBranding) {
                    for item in std::mem::take(&mut self.branding) {
                        self.release(&item.asset);
                    }
                    self.removed_branding_ids.clear();
                    self.clear_branding = true;
                } else {
                    if let Some(id) = &request.identity {
                        if request.kind == MediaKind::Branding {
                            self.removed_branding_ids.push(id.clone());
                        }
                    }
                    self.remove_local(&request.key);
                }
                Ok(())
            }
            Err(err) => {
                warn!(key = %request.key, error = %err, "remote media delete failed");
                Err(err)
            }
        }
    }

    fn remove_local(&mut self, key: &MediaKey) {
        let removed = match key {
            MediaKey::Logo => self.logo.take().map(|b| b.asset),
            MediaKey::Background => self.background.take().map(|b| b.asset),
            MediaKey::Branding(k) => self
                .branding
                .iter()
                .position(|item| &item.key == k)
                .map(|index| self.branding.remove(index).asset),
            MediaKey::AllBranding => None,
        };
        if let Some(asset) = removed {
            self.release(&asset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted_item(id: &str) -> BrandingItem {
        BrandingItem {
            persisted_id: Some(id.into()),
            ..BrandingItem::new(
                AssetRef::Url(format!("https://cdn/{id}.png")),
                PositionedElement::default(),
            )
        }
    }

    #[test]
    fn test_local_branding_removed_immediately() {
        let mut model = TemplateModel::new();
        let key = model.add_branding("a.png", vec![1]);
        assert_eq!(model.pending_uploads().len(), 1);

        let outcome = model.request_removal(&MediaKey::Branding(key)).unwrap();
        assert_eq!(outcome, Removal::Removed);
        assert!(model.branding.is_empty());
        assert!(model.pending_uploads().is_empty());
    }

    #[test]
    fn test_persisted_branding_needs_confirmation() {
        let mut model = TemplateModel::new();
        let item = persisted_item("p1");
        let key = MediaKey::Branding(item.key.clone());
        model.branding.push(item);

        assert_eq!(model.request_removal(&key).unwrap(), Removal::NeedsConfirmation);
        assert_eq!(model.branding.len(), 1);
    }

    #[test]
    fn test_delete_success_removes_and_records_id() {
        let mut model = TemplateModel::new();
        let item = persisted_item("p1");
        let key = MediaKey::Branding(item.key.clone());
        model.branding.push(item);

        let request = model.begin_delete(&key).unwrap();
        assert_eq!(request.identity.as_deref(), Some("p1"));
        assert_eq!(request.kind, MediaKind::Branding);
        assert!(model.is_busy(&key));
        assert_eq!(model.branding.len(), 1);

        model.finish_delete(&request, Ok(())).unwrap();
        assert!(model.branding.is_empty());
        assert!(!model.is_busy(&key));
        assert_eq!(model.removed_branding_ids(), ["p1".to_string()]);
    }

    #[test]
    fn test_delete_failure_leaves_state() {
        let mut model = TemplateModel::new();
        let item = persisted_item("p1");
        let key = MediaKey::Branding(item.key.clone());
        model.branding.push(item);
        let before = model.branding.clone();

        let request = model.begin_delete(&key).unwrap();
        let result = model.finish_delete(&request, Err(BadgeError::Delete("503".into())));
        assert!(matches!(result, Err(BadgeError::Delete(_))));
        assert_eq!(model.branding, before);
        assert!(!model.is_busy(&key));
        assert!(model.removed_branding_ids().is_empty());
    }

    #[test]
    fn test_busy_item_rejects_edits_and_second_delete() {
        let mut model = TemplateModel::new();
        let item = persisted_item("p1");
        let key = MediaKey::Branding(item.key.clone());
        model.branding.push(item);

        model.begin_delete(&key).unwrap();
        assert!(matches!(model.move_media(&key, 1.0, 1.0), Err(BadgeError::MediaBusy(_))));
        assert!(matches!(model.begin_delete(&key), Err(BadgeError::MediaBusy(_))));
        assert!(matches!(model.request_removal(&key), Err(BadgeError::MediaBusy(_))));
    }

    #[test]
    fn test_begin_delete_rejects_local_item() {
        let mut model = TemplateModel::new();
        let key = MediaKey::Branding(model.add_branding("a.png", vec![]));
        assert!(matches!(model.begin_delete(&key), Err(BadgeError::NotPersisted(_))));
    }

    #[test]
    fn test_clear_without_persisted_items() {
        let mut model = TemplateModel::new();
        model.add_branding("a.png", vec![1]);
        model.add_branding("b.png", vec![2]);
        assert_eq!(model.request_clear_branding(), Removal::Removed);
        assert!(model.branding.is_empty());
        assert!(model.pending_uploads().is_empty());
        assert!(!model.branding_cleared());
    }

    #[test]
    fn test_clear_with_persisted_items() {
        let mut model = TemplateModel::new();
        model.add_branding("a.png", vec![1]);
        model.branding.push(persisted_item("p1"));
        assert_eq!(model.request_clear_branding(), Removal::NeedsConfirmation);
        assert_eq!(model.branding.len(), 2);

        let request = model.begin_delete(&MediaKey::AllBranding).unwrap();
        assert_eq!(request.identity, None);
        let first = MediaKey::Branding(model.branding[0].key.clone());
        assert!(model.is_busy(&first));

        model.finish_delete(&request, Ok(())).unwrap();
        assert!(model.branding.is_empty());
        assert!(model.branding_cleared());
        assert!(model.pending_uploads().is_empty());
    }

    #[test]
    fn test_clear_all_waits_for_single_item_delete() {
        let mut model = TemplateModel::new();
        let item = persisted_item("p1");
        let key = MediaKey::Branding(item.key.clone());
        model.branding.push(item);
        model.branding.push(persisted_item("p2"));

        let single = model.begin_delete(&key).unwrap();
        assert!(model.is_busy(&MediaKey::AllBranding));
        assert!(matches!(
            model.begin_delete(&MediaKey::AllBranding),
            Err(BadgeError::MediaBusy(_))
        ));

        model.finish_delete(&single, Ok(())).unwrap();
        assert!(!model.is_busy(&MediaKey::AllBranding));
        let all = model.begin_delete(&MediaKey::AllBranding).unwrap();
        model.finish_delete(&all, Ok(())).unwrap();
        assert!(model.branding.is_empty());
        assert!(model.branding_cleared());
    }

    #[test]
    fn test_local_logo_removed_and_persisted_logo_confirmed() {
        let mut model = TemplateModel::new();
        model.attach_logo("logo.png", vec![1]);
        assert_eq!(model.request_removal(&MediaKey::Logo).unwrap(), Removal::Removed);
        assert!(model.logo.is_none());

        model.logo = Some(MediaBlock {
            asset: AssetRef::Url("https://cdn/logo.png".into()),
            position: PositionedElement::default(),
        });
        assert_eq!(
            model.request_removal(&MediaKey::Logo).unwrap(),
            Removal::NeedsConfirmation
        );
        let request = model.begin_delete(&MediaKey::Logo).unwrap();
        assert_eq!(request.identity.as_deref(), Some("https://cdn/logo.png"));
        model.finish_delete(&request, Ok(())).unwrap();
        assert!(model.logo.is_none());
        assert!(model.removed_branding_ids().is_empty());
    }

    #[test]
    fn test_attach_logo_replaces_and_releases_previous() {
        let mut model = TemplateModel::new();
        model.attach_logo("a.png", vec![1]);
        model.move_media(&MediaKey::Logo, 20.0, 30.0).unwrap();
        let second = model.attach_logo("b.png", vec![2]);
        assert_eq!(model.pending_uploads().len(), 1);
        assert_eq!(model.pending_uploads()[0].handle, second);
        let logo = model.logo.as_ref().unwrap();
        assert_eq!((logo.position.x, logo.position.y), (20.0, 30.0));
    }

    #[test]
    fn test_resize_and_details() {
        let mut model = TemplateModel::new();
        let key = model.add_branding("s.png", vec![]);
        let media_key = MediaKey::Branding(key.clone());
        model
            .resize_media(&media_key, Dimension::Px(120.0), Dimension::Auto)
            .unwrap();
        model
            .set_branding_details(&key, Some("Acme".into()), Some("  ".into()))
            .unwrap();
        let item = model.branding_item(&key).unwrap();
        assert_eq!(item.position.width, Some(120.0));
        assert_eq!(item.position.height, None);
        assert_eq!(item.name.as_deref(), Some("Acme"));
        assert_eq!(item.website, None);
    }

    #[test]
    fn test_unknown_media() {
        let mut model = TemplateModel::new();
        assert!(matches!(
            model.move_media(&MediaKey::Background, 0.0, 0.0),
            Err(BadgeError::UnknownMedia(_))
        ));
        assert!(matches!(
            model.request_removal(&MediaKey::Branding("x".into())),
            Err(BadgeError::UnknownMedia(_))
        ));
    }
}
