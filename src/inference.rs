//! This module provides the `OnnxClassifier` struct for running ONNX image classifiers.
//!
//! It includes functionality for:
//! - Loading a model and its model card from local paths.
//! - Selecting execution providers (e.g., CPU, CUDA).
//! - Encoding inputs into the model's declared element type, quantizing when required.
//! - Running predictions and dequantizing the raw outputs.
//!
//! The `Device` enum allows for specifying the hardware to run the model on,
//! and the `OnnxClassifier` handles the ONNX Runtime session and prediction logic.

use std::{fmt, path::Path, sync::Mutex};

use ndarray::{Array, ArrayViewD, Ix4};
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, info};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;

#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;

use crate::{
    classifier::{Classifier, OutputHead},
    config::{ElementType, InputSize, ModelCard},
    error::{MushguardError, Result},
    quantization::{
        decode_float_output, decode_output, encode_input, EncodedTensor, Quantization,
        QuantizedElement,
    },
};

/// Represents the execution device for the ONNX models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    /// Use the CPU for inference.
    Cpu,
    /// Use the CUDA execution provider.
    #[cfg(feature = "cuda")]
    Cuda(i32),
    /// Use the TensorRT execution provider.
    #[cfg(feature = "tensorrt")]
    TensorRT(i32),
    /// Use the CoreML execution provider (for macOS).
    #[cfg(feature = "coreml")]
    CoreML,
}

impl Device {
    /// Creates a list of `Device` instances for CPU execution.
    pub fn cpu() -> Vec<Self> {
        vec![Self::Cpu]
    }

    /// Creates a list of `Device` instances for CUDA execution on specified GPUs.
    #[cfg(feature = "cuda")]
    pub fn cuda_devices(device_ids: Vec<i32>) -> Vec<Self> {
        device_ids.into_iter().map(Self::Cuda).collect()
    }

    /// Creates a list of `Device` instances for TensorRT execution on specified GPUs.
    #[cfg(feature = "tensorrt")]
    pub fn tensorrt_devices(device_ids: Vec<i32>) -> Vec<Self> {
        device_ids.into_iter().map(Self::TensorRT).collect()
    }

    /// Creates a list of `Device` instances for CoreML execution.
    #[cfg(feature = "coreml")]
    pub fn coreml() -> Vec<Self> {
        vec![Self::CoreML]
    }
}

fn ort_error(e: impl fmt::Display) -> MushguardError {
    MushguardError::Ort(e.to_string())
}

/// Initializes the ONNX Runtime with a list of execution providers.
///
/// Call once before loading any model. Sessions built before this call use
/// the runtime's defaults.
pub fn init_runtime(devices: Vec<Device>) -> Result<()> {
    let mut providers = Vec::new();
    for device in devices {
        let provider = match device {
            Device::Cpu => CPUExecutionProvider::default().build(),
            #[cfg(feature = "cuda")]
            Device::Cuda(device_id) => CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            #[cfg(feature = "tensorrt")]
            Device::TensorRT(device_id) => TensorRTExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            #[cfg(feature = "coreml")]
            Device::CoreML => CoreMLExecutionProvider::default().build(),
        };
        providers.push(provider);
    }

    ort::init()
        .with_execution_providers(providers)
        .commit()
        .map_err(ort_error)?;
    Ok(())
}

/// A loaded ONNX classifier and the metadata from its model card.
///
/// `Session::run` needs exclusive access, so concurrent predictions on the
/// same handle take turns on the session lock.
#[derive(Debug)]
pub struct OnnxClassifier {
    session: Mutex<Session>,
    card: ModelCard,
    head: OutputHead,
    input_name: String,
    output_name: String,
}

impl OnnxClassifier {
    /// Loads a model from a local `.onnx` file and its model card.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, card_path: Q) -> Result<Self> {
        let card = ModelCard::load(card_path)?;

        let session = Session::builder()
            .map_err(ort_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort_error)?
            .with_intra_threads(num_cpus::get())
            .map_err(ort_error)?
            .commit_from_file(model_path.as_ref())
            .map_err(ort_error)?;

        let input_name = match &card.input.name {
            Some(name) => name.clone(),
            None => session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| MushguardError::Ort("Model has no inputs".to_string()))?,
        };
        let output_name = match &card.output.name {
            Some(name) => name.clone(),
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| MushguardError::Ort("Model has no outputs".to_string()))?,
        };

        let head = OutputHead::from_num_classes(card.num_classes());
        info!(
            model = %model_path.as_ref().display(),
            input = %input_name,
            input_shape = ?card.input.shape,
            input_dtype = %card.input.dtype,
            input_quantization = ?card.input.active_quantization(),
            output = %output_name,
            output_shape = ?card.output.shape,
            output_dtype = %card.output.dtype,
            output_quantization = ?card.output.active_quantization(),
            "Model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            card,
            head,
            input_name,
            output_name,
        })
    }

    pub fn card(&self) -> &ModelCard {
        &self.card
    }

    fn run(&self, input: EncodedTensor<Ix4>) -> Result<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MushguardError::Inference("session lock poisoned".to_string()))?;
        let name = self.input_name.as_str();

        let outputs = match input {
            EncodedTensor::Float32(a) => {
                session.run(ort::inputs![name => Tensor::from_array(a).map_err(ort_error)?])
            }
            EncodedTensor::Uint8(a) => {
                session.run(ort::inputs![name => Tensor::from_array(a).map_err(ort_error)?])
            }
            EncodedTensor::Int8(a) => {
                session.run(ort::inputs![name => Tensor::from_array(a).map_err(ort_error)?])
            }
            EncodedTensor::Int16(a) => {
                session.run(ort::inputs![name => Tensor::from_array(a).map_err(ort_error)?])
            }
        }
        .map_err(ort_error)?;

        let output = &outputs[self.output_name.as_str()];
        let quantization = self.card.output.active_quantization();
        let values = match self.card.output.dtype {
            ElementType::Float32 => {
                let raw = output.try_extract_array::<f32>().map_err(ort_error)?;
                decode_float_output(raw.iter().copied(), quantization)
            }
            ElementType::Uint8 => {
                decode_integer(output.try_extract_array::<u8>().map_err(ort_error)?, quantization)
            }
            ElementType::Int8 => {
                decode_integer(output.try_extract_array::<i8>().map_err(ort_error)?, quantization)
            }
            ElementType::Int16 => {
                decode_integer(output.try_extract_array::<i16>().map_err(ort_error)?, quantization)
            }
        };
        Ok(values)
    }
}

fn decode_integer<T: QuantizedElement>(
    raw: ArrayViewD<'_, T>,
    quantization: Option<&Quantization>,
) -> Vec<f32> {
    decode_output(raw.iter().copied(), quantization)
}

impl Classifier for OnnxClassifier {
    fn input_size(&self) -> InputSize {
        self.card.input_size()
    }

    fn head(&self) -> OutputHead {
        self.head
    }

    /// Runs prediction on a preprocessed `[1, H, W, 3]` tensor.
    ///
    /// Returns the first (and only) batch row, dequantized to `f32`.
    fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>> {
        let size = self.input_size();
        let expected = [1, size.height as usize, size.width as usize, 3];
        if input.shape() != expected {
            return Err(MushguardError::Inference(format!(
                "input tensor shape {:?} does not match model input {:?}",
                input.shape(),
                expected
            )));
        }

        let encoded = encode_input(input, self.card.input.dtype, self.card.input.active_quantization());
        debug!(input = %self.input_name, dtype = %encoded.element_type(), "Running model");
        let values = self.run(encoded)?;

        let num_classes = self.head.num_classes();
        if values.len() != num_classes {
            return Err(MushguardError::Inference(format!(
                "model {} returned {} values, card declares {} classes",
                self.output_name,
                values.len(),
                num_classes
            )));
        }
        Ok(values)
    }
}
