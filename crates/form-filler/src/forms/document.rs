//! Narrow write capability the fill engine needs from a form document.
//!
//! The engine never sees a concrete PDF type; it opens template bytes through a
//! [`FormCodec`] and writes through the returned [`FormDocument`] handle.

use serde::Serialize;

use super::engine::FormFillError;

/// Kind of a named field in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Checkbox,
    Other,
}

/// Reasons a single field write was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldWriteError {
    #[error("field not found")]
    NotFound,
    #[error("field is a {actual:?} field, expected {expected:?}")]
    KindMismatch { expected: FieldKind, actual: FieldKind },
}

/// Mutable handle over one opened template.
pub trait FormDocument {
    fn set_text(&mut self, field: &str, value: &str) -> Result<(), FieldWriteError>;
    fn check(&mut self, field: &str) -> Result<(), FieldWriteError>;
    /// Serialize the document, consuming the handle.
    fn finish(self) -> Result<Vec<u8>, FormFillError>;
}

/// Opens template bytes into a fresh [`FormDocument`].
pub trait FormCodec: Send + Sync {
    type Document: FormDocument;

    fn open(&self, template: &[u8]) -> Result<Self::Document, FormFillError>;
}
