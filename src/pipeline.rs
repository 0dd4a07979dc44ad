//! This module provides a high-level `MushroomPipeline` for analyzing mushroom photographs.
//!
//! The pipeline runs three classifiers in sequence, each with its own
//! `ImagePreprocessor` sized from the model:
//!
//! 1. the gate model decides whether the image shows a mushroom at all,
//! 2. the edibility model decides whether it is edible,
//! 3. the species model names the species, only for edible mushrooms.
//!
//! A failed gate check or an inedible verdict ends the run early. Any error
//! raised by a stage is logged and returned as `AnalysisResult::Failed`, so a
//! caller never sees partial results.

use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::{
    classifier::{Classifier, OutputHead, Prediction},
    error::{MushguardError, Result},
    file::ModelKind,
    model::ModelStore,
    processor::{ImagePreprocessor, ImageProcessor},
    species::SpeciesTable,
};

/// Minimum mushroom confidence, in percent, for the analysis to continue.
///
/// Older documentation of the detector quotes 95%; the deployed check is 60%.
pub const GATE_THRESHOLD: f64 = 60.0;

/// Edible probabilities strictly above this value are classified as edible.
pub const EDIBLE_THRESHOLD: f64 = 0.5;

pub const NOT_A_MUSHROOM_MESSAGE: &str = "Image is not a mushroom. Please upload another image.";

/// Outcome of a gate check that did not pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateRejection {
    pub passed: bool,
    /// Mushroom confidence in percent.
    pub confidence: f64,
    pub message: String,
}

/// Species identified for an edible mushroom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesReport {
    pub species: String,
    pub species_confidence: f64,
    pub species_probability: f64,
    pub lifespan: String,
    pub preservation: String,
}

/// Edibility verdict, extended with the species when edible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdibilityReport {
    pub is_edible: bool,
    /// Distance from the decision boundary, rescaled to percent.
    pub edibility_confidence: f64,
    pub edibility_probability: f64,
    #[serde(flatten)]
    pub species: Option<SpeciesReport>,
}

/// The result of analyzing one image.
///
/// Serializes to one of the flat JSON shapes the web layer consumes:
/// `{passed, confidence, message}`, `{is_edible, edibility_confidence,
/// edibility_probability, [species fields]}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Rejected(GateRejection),
    Analyzed(EdibilityReport),
    Failed { error: String },
}

impl AnalysisResult {
    pub fn is_error(&self) -> bool {
        matches!(self, AnalysisResult::Failed { .. })
    }

    pub fn species(&self) -> Option<&SpeciesReport> {
        match self {
            AnalysisResult::Analyzed(report) => report.species.as_ref(),
            _ => None,
        }
    }
}

/// Mushroom confidence in percent from the gate model's output.
///
/// A single output is the probability of "not a mushroom"; with several
/// outputs the highest class probability is used.
pub fn gate_confidence(prediction: &Prediction) -> f64 {
    match prediction {
        Prediction::SingleClass(not_mushroom) => 100.0 - f64::from(*not_mushroom) * 100.0,
        Prediction::MultiClass(probs) => {
            let max = probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            f64::from(max) * 100.0
        }
    }
}

/// Edibility confidence in percent: `|p - 0.5| * 2 * 100`.
pub fn edibility_confidence(probability: f64) -> f64 {
    (probability - EDIBLE_THRESHOLD).abs() * 2.0 * 100.0
}

/// Index and value of the highest probability; ties go to the lowest index.
pub fn select_class(probs: &[f32]) -> Option<(usize, f32)> {
    probs.iter().copied().enumerate().fold(None, |best, (idx, p)| match best {
        Some((_, best_p)) if p <= best_p || p.is_nan() => best,
        _ if p.is_nan() => best,
        _ => Some((idx, p)),
    })
}

/// One classifier with the preprocessor sized for it.
struct Stage {
    kind: ModelKind,
    model: Arc<dyn Classifier>,
    preprocessor: ImagePreprocessor,
}

impl Stage {
    fn new(kind: ModelKind, model: Arc<dyn Classifier>) -> Self {
        let preprocessor = ImagePreprocessor::for_model(model.as_ref());
        Self {
            kind,
            model,
            preprocessor,
        }
    }

    fn run(&self, image: &DynamicImage) -> Result<Prediction> {
        let tensor = self.preprocessor.process(image)?;
        debug!(stage = %self.kind, shape = ?tensor.shape(), "Preprocessed image");
        let prediction = self.model.classify(tensor)?;
        debug!(stage = %self.kind, output = ?prediction.probabilities(), "Stage output");
        Ok(prediction)
    }
}

/// An end-to-end pipeline for mushroom analysis.
pub struct MushroomPipeline {
    gate: Stage,
    edibility: Stage,
    species: Stage,
    species_table: SpeciesTable,
}

impl MushroomPipeline {
    /// Creates a pipeline from loaded models.
    ///
    /// The species model must be multi-class with one class per label in
    /// `species_table`, in the same order.
    pub fn new(
        gate: Arc<dyn Classifier>,
        edibility: Arc<dyn Classifier>,
        species: Arc<dyn Classifier>,
        species_table: SpeciesTable,
    ) -> Result<Self> {
        for (kind, model) in [
            (ModelKind::Gate, &gate),
            (ModelKind::Edibility, &edibility),
            (ModelKind::Species, &species),
        ] {
            if model.head().num_classes() == 0 {
                return Err(MushguardError::Inference(format!(
                    "{kind} model declares no output classes"
                )));
            }
        }

        match species.head() {
            OutputHead::MultiClass(n) if n == species_table.len() => {}
            head => {
                return Err(MushguardError::SpeciesTable(format!(
                    "species model has {} classes, species table has {} labels",
                    head.num_classes(),
                    species_table.len()
                )))
            }
        }

        Ok(Self {
            gate: Stage::new(ModelKind::Gate, gate),
            edibility: Stage::new(ModelKind::Edibility, edibility),
            species: Stage::new(ModelKind::Species, species),
            species_table,
        })
    }

    /// Loads all three models from `store` and builds the pipeline.
    pub fn from_store(store: &ModelStore, species_table: SpeciesTable) -> Result<Self> {
        store.preload()?;
        Self::new(
            store.get(ModelKind::Gate)?,
            store.get(ModelKind::Edibility)?,
            store.get(ModelKind::Species)?,
            species_table,
        )
    }

    pub fn species_table(&self) -> &SpeciesTable {
        &self.species_table
    }

    /// Analyzes a decoded image.
    pub fn analyze(&self, image: &DynamicImage) -> AnalysisResult {
        match self.run(image) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Error in mushroom analysis");
                AnalysisResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn run(&self, image: &DynamicImage) -> Result<AnalysisResult> {
        info!("Starting mushroom analysis");

        let confidence = gate_confidence(&self.gate.run(image)?);
        info!(confidence, "Mushroom detector confidence");
        if confidence < GATE_THRESHOLD {
            return Ok(AnalysisResult::Rejected(GateRejection {
                passed: false,
                confidence,
                message: NOT_A_MUSHROOM_MESSAGE.to_string(),
            }));
        }

        let edibility = self.edibility.run(image)?;
        let probability = edibility
            .probabilities()
            .first()
            .copied()
            .map(f64::from)
            .ok_or_else(|| MushguardError::Inference("edibility model returned no scores".to_string()))?;
        let is_edible = probability > EDIBLE_THRESHOLD;
        info!(probability, is_edible, "Edibility verdict");

        let species = if is_edible {
            Some(self.identify_species(&self.species.run(image)?)?)
        } else {
            None
        };

        Ok(AnalysisResult::Analyzed(EdibilityReport {
            is_edible,
            edibility_confidence: edibility_confidence(probability),
            edibility_probability: probability,
            species,
        }))
    }

    fn identify_species(&self, prediction: &Prediction) -> Result<SpeciesReport> {
        let (index, probability) = select_class(prediction.probabilities())
            .ok_or_else(|| MushguardError::Inference("species model returned no scores".to_string()))?;
        let label = self.species_table.label(index).ok_or_else(|| {
            MushguardError::Inference(format!("no species label for class {index}"))
        })?;
        let advisory = self.species_table.advisory(label);
        info!(species = label, probability, "Species identified");

        let probability = f64::from(probability);
        Ok(SpeciesReport {
            species: label.to_string(),
            species_confidence: probability * 100.0,
            species_probability: probability,
            lifespan: advisory.lifespan,
            preservation: advisory.preservation,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gate_confidence_single_output() {
        let confidence = gate_confidence(&Prediction::SingleClass(0.25));
        assert_eq!(confidence, 75.0);
        assert_eq!(gate_confidence(&Prediction::SingleClass(0.0)), 100.0);
    }

    #[test]
    fn test_gate_confidence_multi_output_ignores_order() {
        let a = gate_confidence(&Prediction::MultiClass(vec![0.25, 0.75]));
        let b = gate_confidence(&Prediction::MultiClass(vec![0.75, 0.25]));
        assert_eq!(a, 75.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_edibility_confidence() {
        assert_eq!(edibility_confidence(0.5), 0.0);
        assert_eq!(edibility_confidence(1.0), 100.0);
        assert_eq!(edibility_confidence(0.0), 100.0);
        assert_eq!(edibility_confidence(0.75), 50.0);
    }

    #[test]
    fn test_select_class_prefers_first_maximum() {
        assert_eq!(select_class(&[0.1, 0.4, 0.4, 0.1]), Some((1, 0.4)));
        assert_eq!(select_class(&[0.1, 0.05, 0.7, 0.1, 0.05]), Some((2, 0.7)));
        assert_eq!(select_class(&[0.2]), Some((0, 0.2)));
        assert_eq!(select_class(&[]), None);
    }

    #[test]
    fn test_select_class_skips_nan() {
        assert_eq!(select_class(&[f32::NAN, 0.3, 0.2]), Some((1, 0.3)));
    }

    #[test]
    fn test_result_shapes() {
        let rejected = AnalysisResult::Rejected(GateRejection {
            passed: false,
            confidence: 40.0,
            message: NOT_A_MUSHROOM_MESSAGE.to_string(),
        });
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            serde_json::json!({
                "passed": false,
                "confidence": 40.0,
                "message": NOT_A_MUSHROOM_MESSAGE,
            })
        );

        let inedible = AnalysisResult::Analyzed(EdibilityReport {
            is_edible: false,
            edibility_confidence: 60.0,
            edibility_probability: 0.2,
            species: None,
        });
        assert_eq!(
            serde_json::to_value(&inedible).unwrap(),
            serde_json::json!({
                "is_edible": false,
                "edibility_confidence": 60.0,
                "edibility_probability": 0.2,
            })
        );

        let failed = AnalysisResult::Failed {
            error: "boom".to_string(),
        };
        assert!(failed.is_error());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "error": "boom" })
        );
    }
}
