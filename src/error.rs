//! # Error Handling
//!
//! This module defines the custom error type for the `mushguard` library.
//!
//! The `MushguardError` enum represents all possible errors that can occur
//! within the library, providing a unified and consistent error-handling mechanism.
//! It uses the `thiserror` crate to derive the `Error` trait and provide
//! descriptive error messages.

use std::path::PathBuf;

use thiserror::Error;

use crate::file::ModelKind;

pub type Result<T, E = MushguardError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MushguardError {
    /// A required model file or its model card is absent.
    #[error("{kind} model artifact missing at {}", path.display())]
    MissingArtifact { kind: ModelKind, path: PathBuf },

    /// The supplied image could not be decoded.
    #[error("invalid image file: {0}")]
    Decode(#[from] image::ImageError),

    /// The decoded image has a zero width or height.
    #[error("invalid image file: image has no pixels")]
    EmptyImage,

    #[error("invalid model card {}: {reason}", path.display())]
    ModelCard { path: PathBuf, reason: String },

    #[error("onnx runtime error: {0}")]
    Ort(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("species table error: {0}")]
    SpeciesTable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl MushguardError {
    /// Returns `true` for user-facing validation failures on the input image.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::EmptyImage)
    }

    /// Returns `true` when a model artifact is absent from the model root.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }
}
