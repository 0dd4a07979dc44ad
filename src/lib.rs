//! # MushGuard
//!
//! MushGuard is a library for analyzing mushroom photographs with three ONNX
//! classifiers. Given an image it decides whether the image shows a mushroom,
//! whether that mushroom is edible, and for edible mushrooms which species it
//! is, together with storage advice for that species.
//!
//! ## Features
//!
//! - **High-level API**: `MushroomPipeline::analyze` for end-to-end analysis.
//! - **ONNX Runtime**: Powered by `ort` for efficient, cross-platform inference.
//! - **Quantized models**: Integer inputs and outputs are (de)quantized from
//!   the scale and zero-point declared in each model card.
//! - **Execution Providers**: Supports CPU, CUDA, and other execution providers.
//! - **Extensible**: Stages run against the `Classifier` trait.
//!
//! ## Modules
//!
//! - `pipeline`: The main entry point and the analysis result types.
//! - `model`: Verifies and loads the three models, once each.
//! - `inference`: ONNX Runtime sessions and execution providers.
//! - `classifier`: The `Classifier` trait and output interpretation.
//! - `quantization`: Linear quantization of model inputs and outputs.
//! - `processor`: Image decoding and preprocessing.
//! - `species`: The species reference table.
//! - `config`: Model card definitions.
//! - `file`: Model artifact locations.
//! - `error`: Contains the error types for the library.
//! - `prelude`: A collection of the most commonly used types.

pub mod classifier;
pub mod config;
pub mod error;
pub mod file;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod processor;
pub mod quantization;
pub mod species;
