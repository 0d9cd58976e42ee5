//! # Editor Session
//!
//! One [`EditorSession`] owns one [`TemplateModel`] together with the editing
//! surfaces of its fields, the installed fonts, and the code image state.
//! It is the only place that talks to the hosting application's
//! collaborators:
//!
//! | Collaborator | Used for |
//! |--------------|----------|
//! | [`CodeEncoder`] | preview code image |
//! | [`MediaDeleter`] | confirmed removal of persisted media |
//! | [`HostStore`] | uploads and the final configuration save |
//!
//! Every collaborator call is bounded by the configured request timeout.
//! Mutation itself is synchronous; the session is driven from one task.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::canvas::{EngineConfig, TemplateCanvas};
use crate::editor::FieldEditingSurface;
use crate::error::BadgeError;
use crate::fonts::{FaceDefinition, FontDescriptor, FontRegistry};
use crate::persist::{self, ConfigBlob, SavePayload};
use crate::preview::{
    CodeEncoder, CodeImage, CodeImageState, CodeRequest, PreviewLayout, PreviewRenderer,
};
use crate::template::{
    FieldChange, MediaKey, MediaKind, PendingUpload, Removal, TemplateModel, UploadedAsset,
};

/// Remote media removal, provided by the hosting application.
#[async_trait]
pub trait MediaDeleter: Send + Sync {
    /// Delete one stored item.
    async fn delete(&self, kind: MediaKind, identity: &str) -> Result<(), BadgeError>;

    /// Delete every stored item of `kind`.
    async fn clear(&self, kind: MediaKind) -> Result<(), BadgeError>;
}

/// Asset storage and configuration persistence, provided by the hosting
/// application.
#[async_trait]
pub trait HostStore: Send + Sync {
    async fn upload(&self, upload: &PendingUpload) -> Result<UploadedAsset, BadgeError>;

    async fn save(&self, blob: &ConfigBlob, payload: &SavePayload) -> Result<(), BadgeError>;
}

/// Run a collaborator call under `limit`.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, BadgeError>
where
    F: Future<Output = Result<T, BadgeError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?limit, "collaborator call timed out");
            Err(BadgeError::Timeout {
                operation,
                timeout: limit,
            })
        }
    }
}

/// A code regeneration detached from the session, so several can be in
/// flight at once. Settle each with [`EditorSession::apply_code`].
#[derive(Debug, Clone)]
pub struct CodeJob {
    pub request: CodeRequest,
    payload: String,
    timeout: Duration,
}

impl CodeJob {
    pub async fn run(
        self,
        encoder: &dyn CodeEncoder,
    ) -> (CodeRequest, Result<CodeImage, BadgeError>) {
        let result = with_timeout(
            "code image",
            self.timeout,
            encoder.encode(&self.payload, self.request.size),
        )
        .await;
        (self.request, result)
    }
}

/// An open template editor.
#[derive(Debug)]
pub struct EditorSession {
    config: EngineConfig,
    canvas: TemplateCanvas,
    model: TemplateModel,
    surfaces: BTreeMap<String, FieldEditingSurface>,
    fonts: FontRegistry,
    code: CodeImageState,
}

impl EditorSession {
    /// Open a session on a stored configuration, or on an empty template.
    pub fn open(config: EngineConfig, blob: Option<&ConfigBlob>, fonts: &[FontDescriptor]) -> Self {
        let canvas = config.template_canvas();
        let mut model = blob
            .map(|blob| persist::deserialize_for(blob, &canvas))
            .unwrap_or_default();
        model.field_y_step = config.field_y_step;

        let mut registry = FontRegistry::new();
        let faces = registry.install(fonts);

        let surfaces = model
            .fields
            .iter()
            .map(|field| (field.id.clone(), FieldEditingSurface::new(field, canvas.font_sizes)))
            .collect();

        info!(
            canvas = canvas.name,
            fields = model.fields.len(),
            branding = model.branding.len(),
            faces = faces.len(),
            "opened editor session"
        );

        Self {
            config,
            canvas,
            model,
            surfaces,
            fonts: registry,
            code: CodeImageState::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn canvas(&self) -> TemplateCanvas {
        self.canvas
    }

    pub fn model(&self) -> &TemplateModel {
        &self.model
    }

    /// Direct model access for media edits. Call [`sync_field`](Self::sync_field)
    /// after changing a field behind its surface's back.
    pub fn model_mut(&mut self) -> &mut TemplateModel {
        &mut self.model
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    /// Install more font descriptors; returns every face now installed.
    pub fn install_fonts(&mut self, fonts: &[FontDescriptor]) -> Vec<FaceDefinition> {
        self.fonts.install(fonts)
    }

    pub fn surface(&self, id: &str) -> Option<&FieldEditingSurface> {
        self.surfaces.get(id)
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Add a field; returns its id.
    pub fn add_field(&mut self) -> String {
        let field = self.model.add_field();
        let id = field.id.clone();
        let surface = FieldEditingSurface::new(field, self.canvas.font_sizes);
        self.surfaces.insert(id.clone(), surface);
        id
    }

    pub fn remove_field(&mut self, id: &str) -> Result<(), BadgeError> {
        self.model.remove_field(id)?;
        self.surfaces.remove(id);
        Ok(())
    }

    /// Drive a field's surface and write the resulting changes into the
    /// model.
    pub fn edit_field<F>(&mut self, id: &str, edit: F) -> Result<Vec<FieldChange>, BadgeError>
    where
        F: FnOnce(&mut FieldEditingSurface) -> Vec<FieldChange>,
    {
        let surface = self
            .surfaces
            .get_mut(id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        let changes = edit(surface);
        self.model.apply_field_changes(id, &changes)?;
        Ok(changes)
    }

    /// Push the model's current values for a field into its surface.
    pub fn sync_field(&mut self, id: &str) -> Result<(), BadgeError> {
        let field = self
            .model
            .field(id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        let surface = self
            .surfaces
            .get_mut(id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        surface.reload(field);
        Ok(())
    }

    /// Replace the model with a freshly loaded configuration.
    ///
    /// Surfaces of fields that survive are reloaded through the guarded push
    /// path, so a surface being edited is not overwritten under the operator.
    pub fn reload(&mut self, blob: &ConfigBlob) {
        let mut model = persist::deserialize_for(blob, &self.canvas);
        model.field_y_step = self.config.field_y_step;

        let mut surfaces = BTreeMap::new();
        for field in &model.fields {
            let surface = match self.surfaces.remove(&field.id) {
                Some(mut surface) => {
                    surface.reload(field);
                    surface
                }
                None => FieldEditingSurface::new(field, self.canvas.font_sizes),
            };
            surfaces.insert(field.id.clone(), surface);
        }
        self.surfaces = surfaces;
        self.model = model;
        info!(fields = self.model.fields.len(), "reloaded configuration");
    }

    // ------------------------------------------------------------------
    // Code image
    // ------------------------------------------------------------------

    /// Change the code size. Returns a regeneration job when the size
    /// actually changed.
    pub fn set_code_size(&mut self, size: u32) -> Option<CodeJob> {
        if !self.model.set_code_size(size) {
            return None;
        }
        Some(self.code_job())
    }

    /// A regeneration job for the current code size.
    pub fn code_job(&mut self) -> CodeJob {
        CodeJob {
            request: self.code.request(self.model.code.size),
            payload: self.config.sample_payload.clone(),
            timeout: self.config.request_timeout(),
        }
    }

    /// Settle a code job; stale results are dropped.
    pub fn apply_code(
        &mut self,
        request: CodeRequest,
        result: Result<CodeImage, BadgeError>,
    ) -> bool {
        self.code.apply(request, result)
    }

    /// Regenerate the code image for the current size and wait for it.
    pub async fn regenerate_code(&mut self, encoder: &dyn CodeEncoder) -> bool {
        let (request, result) = self.code_job().run(encoder).await;
        self.apply_code(request, result)
    }

    pub fn code_image(&self) -> Option<&CodeImage> {
        self.code.image()
    }

    pub fn code_state(&self) -> &CodeImageState {
        &self.code
    }

    // ------------------------------------------------------------------
    // Media removal
    // ------------------------------------------------------------------

    pub fn request_removal(&mut self, key: &MediaKey) -> Result<Removal, BadgeError> {
        self.model.request_removal(key)
    }

    /// Run the remote delete of a confirmed removal.
    ///
    /// The slot is removed only when the delete succeeds; on failure or
    /// timeout the model is unchanged and the error is returned.
    pub async fn confirm_removal(
        &mut self,
        key: &MediaKey,
        deleter: &dyn MediaDeleter,
    ) -> Result<(), BadgeError> {
        let request = self.model.begin_delete(key)?;
        let limit = self.config.request_timeout();
        let outcome = match &request.identity {
            Some(identity) => {
                with_timeout("media delete", limit, deleter.delete(request.kind, identity)).await
            }
            None => with_timeout("media clear", limit, deleter.clear(request.kind)).await,
        };
        self.model.finish_delete(&request, outcome)
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    /// Upload pending assets, then persist the configuration.
    ///
    /// Uploads that succeed stay resolved even if a later step fails, so a
    /// retry only sends what is left. The removal bookkeeping is cleared
    /// once the host accepted the save.
    pub async fn save(&mut self, host: &dyn HostStore) -> Result<ConfigBlob, BadgeError> {
        let limit = self.config.request_timeout();
        let mut payload = persist::prepare_save(&self.model);

        for upload in std::mem::take(&mut payload.uploads) {
            let uploaded = with_timeout("upload", limit, host.upload(&upload)).await?;
            debug!(handle = %upload.handle, url = %uploaded.url, "upload resolved");
            if !self.model.resolve_upload(&upload.handle, uploaded) {
                warn!(handle = %upload.handle, "uploaded asset is no longer referenced");
            }
        }

        let blob = persist::serialize(&self.model)?;
        with_timeout("save", limit, host.save(&blob, &payload)).await?;
        self.model.mark_saved();
        info!(
            fields = blob.fields.len(),
            removed = payload.removed_branding_ids.len(),
            clear_branding = payload.clear_branding,
            "saved configuration"
        );
        Ok(blob)
    }

    // ------------------------------------------------------------------
    // Preview
    // ------------------------------------------------------------------

    pub fn preview(&self) -> PreviewLayout {
        PreviewRenderer::new(self.canvas, self.config.preview_width)
            .layout(&self.model, &self.fonts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Alignment, FormatChange};

    fn session() -> EditorSession {
        EditorSession::open(EngineConfig::default(), None, &[])
    }

    #[test]
    fn test_open_empty() {
        let session = session();
        assert!(session.model().fields.is_empty());
        assert_eq!(session.canvas(), TemplateCanvas::BADGE);
        assert!(session.code_image().is_none());
    }

    #[test]
    fn test_open_uses_configured_step_and_canvas() {
        let config = EngineConfig {
            canvas: "ticket".into(),
            field_y_step: 10.0,
            ..Default::default()
        };
        let mut session = EditorSession::open(config, None, &[]);
        let id = session.add_field();
        assert_eq!(session.model().field(&id).map(|f| f.position.y), Some(10.0));
        assert_eq!(session.canvas(), TemplateCanvas::TICKET);
    }

    #[test]
    fn test_edit_field_reaches_model() {
        let mut session = session();
        let id = session.add_field();
        let changes = session
            .edit_field(&id, |surface| surface.set_alignment(Alignment::Right))
            .unwrap();
        assert_eq!(
            changes,
            vec![
                FieldChange::Format(FormatChange::Alignment(Alignment::Right)),
                FieldChange::X(90.0),
            ]
        );
        let field = session.model().field(&id).unwrap();
        assert_eq!(field.format.alignment, Alignment::Right);
        assert_eq!(field.position.x, 90.0);
    }

    #[test]
    fn test_remove_field_drops_surface() {
        let mut session = session();
        let id = session.add_field();
        session.remove_field(&id).unwrap();
        assert!(session.surface(&id).is_none());
        assert!(matches!(
            session.edit_field(&id, |s| s.set_bold(true)),
            Err(BadgeError::UnknownField(_))
        ));
    }

    #[test]
    fn test_set_code_size_only_when_changed() {
        let mut session = session();
        assert!(session.set_code_size(70).is_none());
        let job = session.set_code_size(120).unwrap();
        assert_eq!(job.request.size, 120);
    }

    #[test]
    fn test_reload_keeps_surfaces_of_surviving_fields() {
        let mut session = session();
        let id = session.add_field();
        let mut blob = persist::serialize(session.model()).unwrap();
        blob.fields[0].text = "Reloaded".into();

        session.reload(&blob);
        let surface = session.surface(&id).unwrap();
        assert_eq!(surface.record().text, "Reloaded");
        assert!(surface.revision() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_surfaces_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, BadgeError>(())
        };
        let result = with_timeout("slow call", Duration::from_secs(1), slow).await;
        assert!(matches!(
            result,
            Err(BadgeError::Timeout { operation: "slow call", .. })
        ));
    }
}
