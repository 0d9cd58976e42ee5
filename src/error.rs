//! # Error Types
//!
//! This module defines error types used throughout the badgekit library.
//!
//! Markup decoding never fails (it falls back to defaults), so nothing here
//! describes a parse error of rich text. Errors are reserved for rejected
//! model edits and collaborator failures.

use std::time::Duration;

use thiserror::Error;

/// Main error type for badgekit operations
#[derive(Debug, Error)]
pub enum BadgeError {
    /// A sizing value was neither `"auto"` nor a finite, non-negative number
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),

    /// No field with this id exists in the template
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// No media item with this key exists in the template
    #[error("Unknown media item: {0}")]
    UnknownMedia(String),

    /// The item has a remote delete in flight and cannot be edited
    #[error("Media item {0} has a pending remote delete")]
    MediaBusy(String),

    /// The operation requires a persisted asset but the item is local-only
    #[error("Media item {0} is not persisted")]
    NotPersisted(String),

    /// A temporary asset handle reached the final serialization step
    #[error("Temporary asset {0} has no durable reference")]
    UnresolvedAsset(String),

    /// Code image generation failed
    #[error("Code image error: {0}")]
    CodeImage(String),

    /// The hosting application rejected a media delete
    #[error("Remote delete failed: {0}")]
    Delete(String),

    /// The hosting application rejected an asset upload
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The hosting application rejected the configuration save
    #[error("Save failed: {0}")]
    Save(String),

    /// A collaborator call did not resolve in time
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
