//! Loading and caching the three pipeline models.
//!
//! `ModelStore::open` verifies every artifact up front so a deployment with a
//! missing model fails at startup instead of on the first request. Each model
//! is then loaded at most once, however many callers ask for it concurrently.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    error::Result,
    file::{ArtifactPaths, ModelFile, ModelKind},
    inference::OnnxClassifier,
};

/// One-time initialization cells, one per `ModelKind`.
#[derive(Debug)]
pub struct ModelCache<T> {
    cells: [OnceCell<Arc<T>>; 3],
}

impl<T> Default for ModelCache<T> {
    fn default() -> Self {
        Self {
            cells: std::array::from_fn(|_| OnceCell::new()),
        }
    }
}

impl<T> ModelCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `kind`, running `load` if there is none yet.
    ///
    /// Concurrent callers block until the first load finishes and then share
    /// its handle. A failed load leaves the cell empty.
    pub fn get_or_load<F>(&self, kind: ModelKind, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        self.cells[kind.index()]
            .get_or_try_init(|| load().map(Arc::new))
            .cloned()
    }

    pub fn get(&self, kind: ModelKind) -> Option<Arc<T>> {
        self.cells[kind.index()].get().cloned()
    }
}

/// The model root directory plus the lazily loaded models in it.
#[derive(Debug)]
pub struct ModelStore {
    root: PathBuf,
    artifacts: Vec<ArtifactPaths>,
    cache: ModelCache<OnnxClassifier>,
}

impl ModelStore {
    /// Opens a model root, failing if any of the three artifacts is absent.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let artifacts = ModelKind::ALL
            .iter()
            .map(|&kind| ModelFile::new(&root, kind).get())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root,
            artifacts,
            cache: ModelCache::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifacts(&self, kind: ModelKind) -> &ArtifactPaths {
        &self.artifacts[kind.index()]
    }

    /// Returns the loaded model for `kind`, loading it on first use.
    pub fn get(&self, kind: ModelKind) -> Result<Arc<OnnxClassifier>> {
        self.cache.get_or_load(kind, || {
            let paths = self.artifacts(kind);
            info!(model = %kind, path = %paths.model.display(), "Loading model");
            OnnxClassifier::load(&paths.model, &paths.card)
        })
    }

    /// Loads all three models.
    pub fn preload(&self) -> Result<()> {
        for kind in ModelKind::ALL {
            self.get(kind)?;
        }
        Ok(())
    }
}
