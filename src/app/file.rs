use anyhow::Result;
use futures::stream::{self, StreamExt};
use mushguard::pipeline::AnalysisResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Extensions accepted for upload.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Check if the path is an image file.
pub fn is_image(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Get image files from a directory, sorted by name.
pub async fn get_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut tasks = vec![];

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let task = tokio::spawn(async move {
            match fs::metadata(&path).await {
                Ok(meta) if meta.is_file() && is_image(&path) => Some(path),
                _ => None,
            }
        });

        tasks.push(task);
    }

    let mut files: Vec<PathBuf> = stream::iter(tasks)
        .buffer_unordered(16)
        .filter_map(|result| async move { result.ok().flatten() })
        .collect()
        .await;
    files.sort();

    Ok(files)
}

/// Expand the command-line paths into image files.
///
/// Directories contribute their images (non-recursive). Anything else,
/// including paths that do not exist, is passed through as given so it is
/// reported per file rather than skipped.
pub async fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => files.extend(get_image_files(path).await?),
            _ => files.push(path.clone()),
        }
    }
    Ok(files)
}

/// One line of `analyze` output.
#[derive(Serialize, Debug)]
pub struct FileReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn analyzed(file: String, result: AnalysisResult) -> Self {
        Self {
            file,
            result: Some(result),
            error: None,
        }
    }

    pub fn rejected(file: String, error: String) -> Self {
        Self {
            file,
            result: None,
            error: Some(error),
        }
    }
}

/// A row of the `analyses` table.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AnalysisRecord {
    pub filename: String,
    pub size: u64,
    pub hash: String,
    pub confidence: Option<f64>,
    pub is_edible: Option<bool>,
    pub edibility_confidence: Option<f64>,
    pub species: Option<String>,
    pub species_confidence: Option<f64>,
    pub lifespan: Option<String>,
    pub preservation: Option<String>,
    pub error: Option<String>,
}

impl From<(&AnalysisResult, String, u64, String)> for AnalysisRecord {
    fn from((result, filename, size, hash): (&AnalysisResult, String, u64, String)) -> Self {
        let record = Self {
            filename,
            size,
            hash,
            ..Default::default()
        };

        match result {
            AnalysisResult::Rejected(rejection) => Self {
                confidence: Some(rejection.confidence),
                ..record
            },
            AnalysisResult::Analyzed(report) => {
                let species = report.species.as_ref();
                Self {
                    is_edible: Some(report.is_edible),
                    edibility_confidence: Some(report.edibility_confidence),
                    species: species.map(|s| s.species.clone()),
                    species_confidence: species.map(|s| s.species_confidence),
                    lifespan: species.map(|s| s.lifespan.clone()),
                    preservation: species.map(|s| s.preservation.clone()),
                    ..record
                }
            }
            AnalysisResult::Failed { error } => Self {
                error: Some(error.clone()),
                ..record
            },
        }
    }
}
