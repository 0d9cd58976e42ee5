//! Code image generation for the preview.
//!
//! The editor always encodes a fixed sample payload (see
//! [`SAMPLE_CODE_PAYLOAD`](crate::canvas::SAMPLE_CODE_PAYLOAD)); the real
//! per-attendee data is the export pipeline's business.
//!
//! Regeneration is fire-and-forget per size change. Results may resolve out
//! of order, so [`CodeImageState`] hands out a token per request and only
//! accepts the result of the most recent one.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage, imageops::FilterType};
use qrcode::{EcLevel, QrCode};
use tracing::{debug, warn};

use crate::canvas::MAX_CODE_SIZE;
use crate::error::BadgeError;

/// Edge of the centered logo overlay, relative to the code edge.
pub const OVERLAY_RATIO: f64 = 0.22;

/// A rendered code image.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeImage {
    /// Requested edge in template-space pixels.
    pub size: u32,
    /// PNG bytes.
    pub png: Vec<u8>,
}

/// Scannable-code encoder collaborator.
#[async_trait]
pub trait CodeEncoder: Send + Sync {
    async fn encode(&self, payload: &str, size_px: u32) -> Result<CodeImage, BadgeError>;
}

/// QR encoder rendering PNGs with the `qrcode` and `image` crates.
///
/// An optional overlay (typically the template logo) is composited at the
/// center. It is purely decorative; the H error-correction level keeps the
/// code readable underneath it.
#[derive(Debug, Clone, Default)]
pub struct QrCodeEncoder {
    overlay: Option<Arc<DynamicImage>>,
}

impl QrCodeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay(overlay: DynamicImage) -> Self {
        Self {
            overlay: Some(Arc::new(overlay)),
        }
    }

    /// Render synchronously.
    pub fn render(&self, payload: &str, size_px: u32) -> Result<CodeImage, BadgeError> {
        let png = render_qr_png(payload, size_px, self.overlay.as_deref())?;
        Ok(CodeImage { size: size_px, png })
    }
}

#[async_trait]
impl CodeEncoder for QrCodeEncoder {
    async fn encode(&self, payload: &str, size_px: u32) -> Result<CodeImage, BadgeError> {
        let encoder = self.clone();
        let payload = payload.to_string();
        tokio::task::spawn_blocking(move || encoder.render(&payload, size_px))
            .await
            .map_err(|e| BadgeError::CodeImage(format!("Task error: {}", e)))?
    }
}

/// Render `payload` as a square QR PNG of `size_px` (at least one pixel per
/// module).
fn render_qr_png(
    payload: &str,
    size_px: u32,
    overlay: Option<&DynamicImage>,
) -> Result<Vec<u8>, BadgeError> {
    if size_px > MAX_CODE_SIZE {
        return Err(BadgeError::CodeImage(format!(
            "Code size {}px exceeds the {}px maximum",
            size_px, MAX_CODE_SIZE
        )));
    }

    let code = QrCode::with_error_correction_level(payload, EcLevel::H)
        .map_err(|e| BadgeError::CodeImage(format!("QR code generation failed: {}", e)))?;

    let modules = code.width();
    let edge = (size_px as usize).max(modules);
    let cell = edge / modules;
    let offset = (edge - modules * cell) / 2;

    let mut img = RgbaImage::from_pixel(edge as u32, edge as u32, Rgba([255, 255, 255, 255]));
    for qy in 0..modules {
        for qx in 0..modules {
            if code[(qx, qy)] != qrcode::Color::Dark {
                continue;
            }
            for cy in 0..cell {
                for cx in 0..cell {
                    let px = (offset + qx * cell + cx) as u32;
                    let py = (offset + qy * cell + cy) as u32;
                    img.put_pixel(px, py, Rgba([0, 0, 0, 255]));
                }
            }
        }
    }

    if let Some(logo) = overlay {
        let overlay_edge = ((edge as f64 * OVERLAY_RATIO).round() as u32).max(1);
        let resized = image::imageops::resize(
            &logo.to_rgba8(),
            overlay_edge,
            overlay_edge,
            FilterType::Triangle,
        );
        let origin = ((edge as u32 - overlay_edge) / 2) as i64;
        image::imageops::overlay(&mut img, &resized, origin, origin);
    }

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| BadgeError::CodeImage(format!("PNG encoding failed: {}", e)))?;
    Ok(png)
}

/// One outstanding regeneration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeRequest {
    pub token: u64,
    pub size: u32,
}

/// Latest-request-wins bookkeeping for the preview code image.
#[derive(Debug, Clone, Default)]
pub struct CodeImageState {
    next_token: u64,
    latest: Option<CodeRequest>,
    resolved: bool,
    image: Option<CodeImage>,
}

impl CodeImageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a regeneration for `size`; older requests become stale.
    pub fn request(&mut self, size: u32) -> CodeRequest {
        self.next_token += 1;
        let request = CodeRequest {
            token: self.next_token,
            size,
        };
        self.latest = Some(request);
        self.resolved = false;
        request
    }

    /// Settle a request. Returns whether the displayed image changed.
    ///
    /// Stale results are dropped. Failures are logged and leave the previous
    /// image in place; they never block saving.
    pub fn apply(&mut self, request: CodeRequest, result: Result<CodeImage, BadgeError>) -> bool {
        if self.latest != Some(request) {
            debug!(token = request.token, size = request.size, "dropping superseded code image");
            return false;
        }
        self.resolved = true;
        match result {
            Ok(image) => {
                self.image = Some(image);
                true
            }
            Err(err) => {
                warn!(size = request.size, error = %err, "code image generation failed");
                false
            }
        }
    }

    pub fn image(&self) -> Option<&CodeImage> {
        self.image.as_ref()
    }

    /// Whether the latest request is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.latest.is_some() && !self.resolved
    }

    pub fn latest(&self) -> Option<CodeRequest> {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(size: u32) -> CodeImage {
        CodeImage { size, png: vec![size as u8] }
    }

    #[test]
    fn test_latest_request_wins_out_of_order() {
        let mut state = CodeImageState::new();
        let small = state.request(70);
        let large = state.request(120);

        assert!(state.apply(large, Ok(image(120))));
        assert!(!state.apply(small, Ok(image(70))));
        assert_eq!(state.image().map(|i| i.size), Some(120));
        assert!(!state.is_pending());
    }

    #[test]
    fn test_stale_result_before_latest() {
        let mut state = CodeImageState::new();
        let small = state.request(70);
        let large = state.request(120);
        assert!(!state.apply(small, Ok(image(70))));
        assert!(state.image().is_none());
        assert!(state.is_pending());
        assert!(state.apply(large, Ok(image(120))));
        assert_eq!(state.image().map(|i| i.size), Some(120));
    }

    #[test]
    fn test_same_size_twice_uses_token() {
        let mut state = CodeImageState::new();
        let first = state.request(120);
        let second = state.request(120);
        assert!(!state.apply(first, Ok(image(120))));
        assert!(state.apply(second, Ok(image(120))));
    }

    #[test]
    fn test_failure_keeps_previous_image() {
        let mut state = CodeImageState::new();
        let first = state.request(70);
        state.apply(first, Ok(image(70)));
        let second = state.request(90);
        assert!(!state.apply(second, Err(BadgeError::CodeImage("boom".into()))));
        assert_eq!(state.image().map(|i| i.size), Some(70));
        assert!(!state.is_pending());
    }

    #[test]
    fn test_qr_render_produces_png_of_requested_size() {
        let encoder = QrCodeEncoder::new();
        let code = encoder.render("BADGEKIT-SAMPLE", 120).unwrap();
        assert_eq!(code.size, 120);
        let decoded = image::load_from_memory(&code.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 120));
    }

    #[test]
    fn test_qr_render_tiny_size_grows_to_module_count() {
        let code = QrCodeEncoder::new().render("X", 4).unwrap();
        let decoded = image::load_from_memory(&code.png).unwrap();
        assert!(decoded.width() >= 21);
    }

    #[test]
    fn test_qr_render_rejects_oversized_edge() {
        let encoder = QrCodeEncoder::new();
        assert!(matches!(encoder.render("X", u32::MAX), Err(BadgeError::CodeImage(_))));
        assert!(matches!(
            encoder.render("X", MAX_CODE_SIZE + 1),
            Err(BadgeError::CodeImage(_))
        ));
    }

    #[test]
    fn test_overlay_is_composited_at_center() {
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255])));
        let code = QrCodeEncoder::with_overlay(logo).render("BADGEKIT", 200).unwrap();
        let decoded = image::load_from_memory(&code.png).unwrap().to_rgba8();
        let center = decoded.get_pixel(100, 100);
        assert!(center[0] > 200 && center[1] < 50 && center[2] < 50);
    }

    #[tokio::test]
    async fn test_async_encode() {
        let encoder = QrCodeEncoder::new();
        let code = encoder.encode("BADGEKIT", 90).await.unwrap();
        assert_eq!(code.size, 90);
        assert!(!code.png.is_empty());
    }
}
