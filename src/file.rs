use crate::error::{MushguardError, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Default directory holding the three model artifacts.
pub const MODEL_ROOT: &str = "models";

const MODEL_EXTENSION: &str = "onnx";
const CARD_EXTENSION: &str = "json";

/// The three models the pipeline runs, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Mushroom / not-a-mushroom detector.
    Gate,
    /// Binary edible classifier.
    Edibility,
    /// Multi-class species classifier.
    Species,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Gate, ModelKind::Edibility, ModelKind::Species];

    /// File stem shared by the model and its model card.
    pub fn artifact_stem(&self) -> &'static str {
        match self {
            ModelKind::Gate => "mush",
            ModelKind::Edibility => "edibility_model",
            ModelKind::Species => "species_model",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Gate => "gate",
            ModelKind::Edibility => "edibility",
            ModelKind::Species => "species",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ModelKind::Gate => 0,
            ModelKind::Edibility => 1,
            ModelKind::Species => 2,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved on-disk locations of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub card: PathBuf,
}

/// A model artifact and its model card under a model root.
pub struct ModelFile {
    root: PathBuf,
    kind: ModelKind,
}

impl ModelFile {
    pub fn new<P: AsRef<Path>>(root: P, kind: ModelKind) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            kind,
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.root
            .join(self.kind.artifact_stem())
            .with_extension(MODEL_EXTENSION)
    }

    pub fn card_path(&self) -> PathBuf {
        self.root
            .join(self.kind.artifact_stem())
            .with_extension(CARD_EXTENSION)
    }

    /// Returns both paths, or `MissingArtifact` naming the first absent file.
    pub fn get(&self) -> Result<ArtifactPaths> {
        let model = self.model_path();
        let card = self.card_path();
        for path in [&model, &card] {
            if !path.is_file() {
                return Err(MushguardError::MissingArtifact {
                    kind: self.kind,
                    path: path.clone(),
                });
            }
        }
        Ok(ArtifactPaths { model, card })
    }
}
