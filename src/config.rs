use crate::{
    error::{MushguardError, Result},
    quantization::Quantization,
};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path};

/// Element type of a model input or output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Uint8,
    Int8,
    Int16,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Uint8 => "uint8",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
        };
        f.write_str(name)
    }
}

/// Declared layout and encoding of one tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    /// Tensor name in the graph. Defaults to the first input/output.
    #[serde(default)]
    pub name: Option<String>,
    pub shape: Vec<i64>, // -1 marks a dynamic batch dimension
    pub dtype: ElementType,
    #[serde(default)]
    pub quantization: Option<Quantization>,
}

impl TensorSpec {
    /// The quantization parameters, if they describe an actual transform.
    pub fn active_quantization(&self) -> Option<&Quantization> {
        self.quantization.as_ref().filter(|q| q.is_active())
    }
}

/// Spatial size a model expects its images in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub height: u32,
    pub width: u32,
}

impl InputSize {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }
}

/// Metadata stored next to every model artifact.
///
/// ```json
/// {
///   "input":  { "shape": [1, 224, 224, 3], "dtype": "uint8",
///               "quantization": { "scale": 0.003921569, "zero_point": 0 } },
///   "output": { "shape": [1, 5], "dtype": "float32" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    pub input: TensorSpec,
    pub output: TensorSpec,
}

impl ModelCard {
    pub fn load<P: AsRef<Path>>(card_path: P) -> Result<Self> {
        let path = card_path.as_ref();
        let json = fs::read_to_string(path)?;
        let card: ModelCard = serde_json::from_str(&json).map_err(|e| MushguardError::ModelCard {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        card.validate().map_err(|reason| MushguardError::ModelCard {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(card)
    }

    /// Checks the card describes an NHWC RGB image classifier with batch size 1.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let input = &self.input.shape;
        if input.len() != 4 {
            return Err(format!("input shape must have rank 4, got {:?}", input));
        }
        if !is_unit_batch(input[0]) {
            return Err(format!("input batch dimension must be 1, got {}", input[0]));
        }
        if input[1] <= 0 || input[2] <= 0 || input[1] > u32::MAX as i64 || input[2] > u32::MAX as i64 {
            return Err(format!("input spatial dimensions must be positive, got {:?}", input));
        }
        if input[3] != 3 {
            return Err(format!("input must have 3 channels, got {}", input[3]));
        }

        let output = &self.output.shape;
        if output.len() != 2 {
            return Err(format!("output shape must have rank 2, got {:?}", output));
        }
        if !is_unit_batch(output[0]) {
            return Err(format!("output batch dimension must be 1, got {}", output[0]));
        }
        if output[1] < 1 {
            return Err(format!("output must have at least one class, got {}", output[1]));
        }
        Ok(())
    }

    /// Spatial input size, read from the declared `[1, H, W, 3]` shape.
    pub fn input_size(&self) -> InputSize {
        InputSize::new(self.input.shape[1] as u32, self.input.shape[2] as u32)
    }

    pub fn num_classes(&self) -> usize {
        self.output.shape[1] as usize
    }
}

fn is_unit_batch(dim: i64) -> bool {
    dim == 1 || dim == -1
}
