use anyhow::{Context, Error, Result};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use sha2::{Digest, Sha256};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info, warn};

use crate::{
    db::Database,
    file::{self, AnalysisRecord, FileReport},
};
use mushguard::{
    config::ElementType,
    file::ModelKind,
    inference::{init_runtime, Device},
    model::ModelStore,
    pipeline::MushroomPipeline,
    processor::decode_image,
    quantization::Quantization,
    species::SpeciesTable,
};

/// Holds the settings of an `analyze` run.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub paths: Vec<PathBuf>,
    pub models: PathBuf,
    pub species: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub jobs: usize,
    pub pretty: bool,
}

/// Verifies the model artifacts and builds the pipeline.
pub fn initialize_pipeline(models: &Path, species: Option<&Path>) -> Result<MushroomPipeline> {
    init_runtime(Device::cpu())?;

    let store = open_store(models)?;
    let table = match species {
        Some(path) => SpeciesTable::load(path)
            .with_context(|| format!("Failed to load species table {}", path.display()))?,
        None => SpeciesTable::default(),
    };

    let pipeline = MushroomPipeline::from_store(&store, table)?;
    info!(
        models = %store.root().display(),
        species = pipeline.species_table().len(),
        "Pipeline ready"
    );
    Ok(pipeline)
}

/// Opens the model root, pointing at the model flags when an artifact is absent.
fn open_store(models: &Path) -> Result<ModelStore> {
    ModelStore::open(models).map_err(|e| {
        let context = if e.is_missing_artifact() {
            format!(
                "Models not found in {}; pass --models or set MUSHGUARD_MODELS",
                models.display()
            )
        } else {
            format!("Failed to open models in {}", models.display())
        };
        Error::new(e).context(context)
    })
}

/// Analyzes every image under `config.paths` and prints one JSON line per file.
pub async fn run_analyze(config: AnalyzeConfig) -> Result<()> {
    let files = file::collect_inputs(&config.paths).await?;
    if files.is_empty() {
        warn!("No image files found");
        return Ok(());
    }

    let pipeline = {
        let models = config.models.clone();
        let species = config.species.clone();
        tokio::task::spawn_blocking(move || initialize_pipeline(&models, species.as_deref()))
            .await??
    };
    let pipeline = Arc::new(pipeline);

    let mut db = match &config.db {
        Some(path) => {
            let db = Database::new(path)?;
            db.init()?;
            Some(db)
        }
        None => None,
    };

    info!(files = files.len(), jobs = config.jobs, "Analyzing images");
    let mut analyses = stream::iter(files)
        .map(|path| analyze_in_background(Arc::clone(&pipeline), path))
        .buffered(config.jobs.max(1));

    let mut records = Vec::new();
    while let Some((report, record)) = analyses.next().await {
        let line = if config.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{}", line);
        records.extend(record);
    }

    if let Some(db) = db.as_mut() {
        db.save_analyses_batch(&records)?;
        info!(rows = records.len(), "Saved analyses");
    }
    Ok(())
}

/// Runs `analyze_file` on the blocking pool.
///
/// A task that panics is reported as an error for its own file so the rest
/// of the run, and its database records, are kept.
pub async fn analyze_in_background(
    pipeline: Arc<MushroomPipeline>,
    path: PathBuf,
) -> (FileReport, Option<AnalysisRecord>) {
    let name = path.display().to_string();
    match tokio::task::spawn_blocking(move || analyze_file(&pipeline, &path)).await {
        Ok(analysis) => analysis,
        Err(e) => {
            error!(file = %name, error = %e, "Analysis task failed");
            (FileReport::rejected(name, e.to_string()), None)
        }
    }
}

/// Validates, decodes and analyzes one file.
///
/// Files that fail validation or decoding are reported without running any
/// model and produce no database record.
pub fn analyze_file(pipeline: &MushroomPipeline, path: &Path) -> (FileReport, Option<AnalysisRecord>) {
    let name = path.display().to_string();
    if !file::is_image(path) {
        return (
            FileReport::rejected(name, "Invalid file type. Please upload a JPG or PNG image.".to_string()),
            None,
        );
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return (FileReport::rejected(name, e.to_string()), None),
    };
    let image = match decode_image(&bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!(file = %name, error = %e, "Skipping undecodable image");
            return (FileReport::rejected(name, e.to_string()), None);
        }
    };

    let result = pipeline.analyze(&image);
    let record = AnalysisRecord::from((&result, name.clone(), bytes.len() as u64, get_hash(&bytes)));
    (FileReport::analyzed(name, result), Some(record))
}

/// Loads the three models and prints their input and output details.
pub fn run_check(models: &Path) -> Result<()> {
    init_runtime(Device::cpu())?;
    let store = open_store(models)?;

    for kind in ModelKind::ALL {
        let model = store.get(kind)?;
        let card = model.card();
        let size = card.input_size();
        let artifacts = store.artifacts(kind);
        println!("{}: {}", kind, artifacts.model.display());
        println!(
            "  input  {}x{}x3 {}",
            size.height,
            size.width,
            encoding(card.input.dtype, card.input.active_quantization())
        );
        println!(
            "  output {} classes {}",
            card.num_classes(),
            encoding(card.output.dtype, card.output.active_quantization())
        );
        if kind == ModelKind::Species {
            let labels = SpeciesTable::default().labels().join(", ");
            println!("  built-in labels: {}", labels);
        }
    }
    Ok(())
}

fn encoding(dtype: ElementType, quantization: Option<&Quantization>) -> String {
    match quantization {
        Some(q) => format!("{} (scale {}, zero point {})", dtype, q.scale, q.zero_point),
        None => dtype.to_string(),
    }
}

/// Computes the SHA256 hash of a file's contents.
fn get_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
