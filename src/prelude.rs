pub use crate::{
    classifier::{Classifier, OutputHead, Prediction},
    config::{InputSize, ModelCard},
    error::{MushguardError, Result},
    file::{ModelKind, MODEL_ROOT},
    inference::{init_runtime, Device, OnnxClassifier},
    model::ModelStore,
    pipeline::{AnalysisResult, EdibilityReport, GateRejection, MushroomPipeline, SpeciesReport},
    processor::{decode_image, open_image, ImagePreprocessor, ImageProcessor},
    species::{Advisory, SpeciesTable},
};
