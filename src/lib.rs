//! # Badgekit - Badge and Ticket Template Engine
//!
//! Badgekit is the layout and formatting core of a template editor for
//! printable event badges and tickets. It provides:
//!
//! - **Format codec**: a flat formatting record to and from rich-text markup
//! - **Positioning**: percentage coordinates on a fixed canvas, with clamping
//! - **Editing surfaces**: loop-free sync between a rich-text surface and
//!   the discrete controls bound to it
//! - **Preview**: scaled layout and a QR code image with a logo overlay
//! - **Persistence**: the configuration blob exchanged with the host
//!
//! ## Quick Start
//!
//! ```
//! use badgekit::{
//!     canvas::EngineConfig,
//!     format::Alignment,
//!     persist,
//!     session::EditorSession,
//! };
//!
//! let mut session = EditorSession::open(EngineConfig::default(), None, &[]);
//!
//! // First field: label "field1", x = 0, y = 5
//! let id = session.add_field();
//! session.edit_field(&id, |surface| surface.set_alignment(Alignment::Center))?;
//!
//! let blob = persist::serialize(session.model())?;
//! assert_eq!(blob.fields[0].label, "field1");
//! assert_eq!(blob.fields[0].x, Some(50.0));
//!
//! # Ok::<(), badgekit::BadgeError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`format`] | Formatting record and markup codec |
//! | [`fonts`] | Font face registry |
//! | [`position`] | Positioned elements, sizes, axis inputs |
//! | [`canvas`] | Template canvases and engine configuration |
//! | [`template`] | Template model: fields, code, media |
//! | [`editor`] | Field editing surface state machine |
//! | [`preview`] | Preview layout and code images |
//! | [`persist`] | Configuration blob and save payload |
//! | [`session`] | Editor session and host collaborators |
//! | [`error`] | Error types |
//!
//! ## Supported Canvases
//!
//! - Badge: 1280 × 960, font sizes 8–100px
//! - Ticket: 816 × 1056, font sizes 8–50px

pub mod canvas;
pub mod editor;
pub mod error;
pub mod fonts;
pub mod format;
pub mod persist;
pub mod position;
pub mod preview;
pub mod session;
pub mod template;

// Re-exports for convenience
pub use canvas::{EngineConfig, TemplateCanvas};
pub use error::BadgeError;
pub use session::EditorSession;
