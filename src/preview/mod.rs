//! # Preview Rendering
//!
//! Maps a [`TemplateModel`] authored in template space onto a scaled
//! interactive preview with a single scalar:
//!
//! ```text
//! scale = preview_width / canvas.width
//! left  = x% of canvas.width  * scale
//! top   = y% of canvas.height * scale
//! ```
//!
//! Explicit sizes and font sizes are multiplied by `scale` for display only;
//! the stored values stay in template-space units.

pub mod code;

pub use code::{CodeEncoder, CodeImage, CodeImageState, CodeRequest, OVERLAY_RATIO, QrCodeEncoder};

use serde::Serialize;

use crate::canvas::TemplateCanvas;
use crate::fonts::FontRegistry;
use crate::format::Alignment;
use crate::position::PositionedElement;
use crate::template::{AssetRef, TemplateModel};

/// What a preview element shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewContent {
    Background {
        asset: AssetRef,
    },
    Branding {
        key: String,
        asset: AssetRef,
        name: Option<String>,
    },
    Logo {
        asset: AssetRef,
    },
    Code {
        /// Edge of the centered logo overlay, when a logo is present.
        overlay_size: Option<f64>,
    },
    Field {
        id: String,
        label: String,
        text: String,
        /// Font size scaled for the preview.
        font_size: f64,
        font_family: String,
        /// Whether a face for the family is installed (or built in).
        face_available: bool,
        color: String,
        bold: bool,
        italic: bool,
        underline: bool,
        alignment: Alignment,
    },
}

/// One placed element in preview pixels. Sizes of `None` are auto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewElement {
    pub left: f64,
    pub top: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    #[serde(flatten)]
    pub content: PreviewContent,
}

/// The whole preview, back to front.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewLayout {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub elements: Vec<PreviewElement>,
}

impl PreviewLayout {
    pub fn fields(&self) -> impl Iterator<Item = &PreviewElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e.content, PreviewContent::Field { .. }))
    }

    pub fn code(&self) -> Option<&PreviewElement> {
        self.elements
            .iter()
            .find(|e| matches!(e.content, PreviewContent::Code { .. }))
    }
}

/// Scales template-space layouts onto a preview surface.
#[derive(Debug, Clone, Copy)]
pub struct PreviewRenderer {
    canvas: TemplateCanvas,
    preview_width: f64,
}

impl PreviewRenderer {
    pub fn new(canvas: TemplateCanvas, preview_width: f64) -> Self {
        Self {
            canvas,
            preview_width,
        }
    }

    pub fn scale(&self) -> f64 {
        self.preview_width / self.canvas.width
    }

    pub fn preview_height(&self) -> f64 {
        self.canvas.height * self.scale()
    }

    /// Preview-pixel origin of a positioned element.
    pub fn origin(&self, position: &PositionedElement) -> (f64, f64) {
        let scale = self.scale();
        (
            self.canvas.percent_to_x(position.x) * scale,
            self.canvas.percent_to_y(position.y) * scale,
        )
    }

    fn place(&self, position: &PositionedElement, content: PreviewContent) -> PreviewElement {
        let scale = self.scale();
        let (left, top) = self.origin(position);
        PreviewElement {
            left,
            top,
            width: position.width.map(|w| w * scale),
            height: position.height.map(|h| h * scale),
            content,
        }
    }

    /// Lay out every element of `model`, back to front: background,
    /// branding, logo, code, then text fields.
    pub fn layout(&self, model: &TemplateModel, fonts: &FontRegistry) -> PreviewLayout {
        let scale = self.scale();
        let mut elements = Vec::new();

        if let Some(background) = &model.background {
            elements.push(self.place(
                &background.position,
                PreviewContent::Background {
                    asset: background.asset.clone(),
                },
            ));
        }

        for item in &model.branding {
            elements.push(self.place(
                &item.position,
                PreviewContent::Branding {
                    key: item.key.clone(),
                    asset: item.asset.clone(),
                    name: item.name.clone(),
                },
            ));
        }

        if let Some(logo) = &model.logo {
            elements.push(self.place(
                &logo.position,
                PreviewContent::Logo {
                    asset: logo.asset.clone(),
                },
            ));
        }

        let code_edge = model.code.size as f64 * scale;
        let (left, top) = self.origin(&model.code.position);
        elements.push(PreviewElement {
            left,
            top,
            width: Some(code_edge),
            height: Some(code_edge),
            content: PreviewContent::Code {
                overlay_size: model.logo.as_ref().map(|_| code_edge * OVERLAY_RATIO),
            },
        });

        for field in &model.fields {
            let format = &field.format;
            elements.push(self.place(
                &field.position,
                PreviewContent::Field {
                    id: field.id.clone(),
                    label: field.label.clone(),
                    text: format.text.clone(),
                    font_size: format.font_size as f64 * scale,
                    font_family: format.font_family.clone(),
                    face_available: fonts.is_available(&format.font_family),
                    color: format.color.clone(),
                    bold: format.is_bold,
                    italic: format.is_italic,
                    underline: format.is_underline,
                    alignment: format.alignment,
                },
            ));
        }

        PreviewLayout {
            width: self.preview_width,
            height: self.preview_height(),
            scale,
            elements,
        }
    }
}
