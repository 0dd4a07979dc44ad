//! Linear per-tensor quantization used by models exported with integer I/O.
//!
//! A quantized tensor stores `q = round(x / scale + zero_point)` in an integer
//! element type and is read back as `x = scale * (q - zero_point)`. A scale of
//! zero means the tensor is not quantized. Rounding is half-to-even and all
//! arithmetic is carried out in `f32`, so values land on the same integer the
//! exporting toolchain would produce.

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

use crate::config::ElementType;

/// Scale and zero-point of a linearly quantized tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub scale: f32,
    #[serde(default)]
    pub zero_point: i32,
}

impl Quantization {
    pub fn new(scale: f32, zero_point: i32) -> Self {
        Self { scale, zero_point }
    }

    /// A zero scale disables the transform.
    pub fn is_active(&self) -> bool {
        self.scale != 0.0
    }

    /// Maps a real value into the (unclamped, rounded) integer domain.
    pub fn quantize_value(&self, value: f32) -> f32 {
        (value / self.scale + self.zero_point as f32).round_ties_even()
    }

    /// Maps an integer-domain value back to a real value.
    pub fn dequantize_value(&self, raw: f32) -> f32 {
        self.scale * (raw - self.zero_point as f32)
    }
}

/// Integer element types a quantized tensor may be stored in.
pub trait QuantizedElement: Copy {
    const MIN: f32;
    const MAX: f32;

    /// Cast from a value already rounded and clamped to `MIN..=MAX`.
    fn from_clamped(value: f32) -> Self;

    fn to_f32(self) -> f32;
}

macro_rules! quantized_element {
    ($($ty:ty),*) => {
        $(
            impl QuantizedElement for $ty {
                const MIN: f32 = <$ty>::MIN as f32;
                const MAX: f32 = <$ty>::MAX as f32;

                fn from_clamped(value: f32) -> Self {
                    value as $ty
                }

                fn to_f32(self) -> f32 {
                    self as f32
                }
            }
        )*
    };
}

quantized_element!(u8, i8, i16);

/// Quantizes a single value into `T`, saturating at the type's range.
pub fn quantize<T: QuantizedElement>(value: f32, quantization: &Quantization) -> T {
    T::from_clamped(quantization.quantize_value(value).clamp(T::MIN, T::MAX))
}

/// Dequantizes a single stored value.
pub fn dequantize<T: QuantizedElement>(raw: T, quantization: &Quantization) -> f32 {
    quantization.dequantize_value(raw.to_f32())
}

/// A model input tensor in the element type the model declares.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedTensor<D: Dimension> {
    Float32(Array<f32, D>),
    Uint8(Array<u8, D>),
    Int8(Array<i8, D>),
    Int16(Array<i16, D>),
}

impl<D: Dimension> EncodedTensor<D> {
    pub fn element_type(&self) -> ElementType {
        match self {
            EncodedTensor::Float32(_) => ElementType::Float32,
            EncodedTensor::Uint8(_) => ElementType::Uint8,
            EncodedTensor::Int8(_) => ElementType::Int8,
            EncodedTensor::Int16(_) => ElementType::Int16,
        }
    }
}

fn encode_integer<T: QuantizedElement, D: Dimension>(
    tensor: &Array<f32, D>,
    quantization: Option<&Quantization>,
) -> Array<T, D> {
    match quantization {
        Some(q) => tensor.mapv(|v| quantize::<T>(v, q)),
        // Plain cast, saturating like the quantized path.
        None => tensor.mapv(|v| T::from_clamped(v.clamp(T::MIN, T::MAX))),
    }
}

/// Converts a float tensor into the declared input encoding.
///
/// With an active quantization the values are rounded into the integer domain
/// and clamped to the integer type's range; a float input with an active
/// quantization is rounded but not clamped. Without quantization the values
/// are cast unchanged.
pub fn encode_input<D: Dimension>(
    tensor: Array<f32, D>,
    element_type: ElementType,
    quantization: Option<&Quantization>,
) -> EncodedTensor<D> {
    let quantization = quantization.filter(|q| q.is_active());
    match element_type {
        ElementType::Float32 => match quantization {
            Some(q) => EncodedTensor::Float32(tensor.mapv(|v| q.quantize_value(v))),
            None => EncodedTensor::Float32(tensor),
        },
        ElementType::Uint8 => EncodedTensor::Uint8(encode_integer(&tensor, quantization)),
        ElementType::Int8 => EncodedTensor::Int8(encode_integer(&tensor, quantization)),
        ElementType::Int16 => EncodedTensor::Int16(encode_integer(&tensor, quantization)),
    }
}

/// Converts raw integer outputs to `f32`, dequantizing when the scale is non-zero.
pub fn decode_output<T: QuantizedElement>(
    raw: impl IntoIterator<Item = T>,
    quantization: Option<&Quantization>,
) -> Vec<f32> {
    match quantization.filter(|q| q.is_active()) {
        Some(q) => raw.into_iter().map(|v| dequantize(v, q)).collect(),
        None => raw.into_iter().map(T::to_f32).collect(),
    }
}

/// Float outputs are only rescaled when the model declares an active quantization.
pub fn decode_float_output(
    raw: impl IntoIterator<Item = f32>,
    quantization: Option<&Quantization>,
) -> Vec<f32> {
    match quantization.filter(|q| q.is_active()) {
        Some(q) => raw.into_iter().map(|v| q.dequantize_value(v)).collect(),
        None => raw.into_iter().collect(),
    }
}
