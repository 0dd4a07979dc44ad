//! The `Classifier` trait the pipeline stages run against.
//!
//! A classifier takes a `[1, H, W, 3]` image tensor and returns one score per
//! class. Whether a model yields a single probability or a distribution over
//! several classes is fixed when it is loaded and recorded as an `OutputHead`.

use ndarray::{Array, Ix4};

use crate::{
    config::InputSize,
    error::{MushguardError, Result},
};

/// Shape of a classifier's output, decided once from its declared output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputHead {
    /// One output value.
    SingleClass,
    /// One output value per class.
    MultiClass(usize),
}

impl OutputHead {
    pub fn from_num_classes(num_classes: usize) -> Self {
        if num_classes == 1 {
            OutputHead::SingleClass
        } else {
            OutputHead::MultiClass(num_classes)
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            OutputHead::SingleClass => 1,
            OutputHead::MultiClass(n) => *n,
        }
    }

    /// Tags raw model output with this head, rejecting outputs of the wrong length.
    pub fn interpret(&self, raw: Vec<f32>) -> Result<Prediction> {
        if raw.len() != self.num_classes() {
            return Err(MushguardError::Inference(format!(
                "expected {} output values, got {}",
                self.num_classes(),
                raw.len()
            )));
        }
        Ok(match self {
            OutputHead::SingleClass => Prediction::SingleClass(raw[0]),
            OutputHead::MultiClass(_) => Prediction::MultiClass(raw),
        })
    }
}

/// Output of one classifier call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    SingleClass(f32),
    MultiClass(Vec<f32>),
}

impl Prediction {
    /// All output values in class order.
    pub fn probabilities(&self) -> &[f32] {
        match self {
            Prediction::SingleClass(p) => std::slice::from_ref(p),
            Prediction::MultiClass(probs) => probs,
        }
    }
}

/// An image classifier with a fixed input size.
pub trait Classifier: Send + Sync {
    /// Spatial size images must be resized to before `predict`.
    fn input_size(&self) -> InputSize;

    fn head(&self) -> OutputHead;

    /// Runs the model on a `[1, H, W, 3]` tensor and returns the raw per-class values.
    fn predict(&self, input: Array<f32, Ix4>) -> Result<Vec<f32>>;

    fn classify(&self, input: Array<f32, Ix4>) -> Result<Prediction> {
        let raw = self.predict(input)?;
        self.head().interpret(raw)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_head_from_num_classes() {
        assert_eq!(OutputHead::from_num_classes(1), OutputHead::SingleClass);
        assert_eq!(OutputHead::from_num_classes(5), OutputHead::MultiClass(5));
        assert_eq!(OutputHead::MultiClass(5).num_classes(), 5);
    }

    #[test]
    fn test_interpret() {
        let single = OutputHead::SingleClass.interpret(vec![0.3]).unwrap();
        assert_eq!(single, Prediction::SingleClass(0.3));
        assert_eq!(single.probabilities(), &[0.3]);

        let multi = OutputHead::MultiClass(2).interpret(vec![0.3, 0.7]).unwrap();
        assert_eq!(multi.probabilities(), &[0.3, 0.7]);
    }

    #[test]
    fn test_interpret_length_mismatch() {
        let err = OutputHead::MultiClass(5).interpret(vec![0.5; 4]).unwrap_err();
        assert_eq!(err.to_string(), "inference failed: expected 5 output values, got 4");
        assert!(OutputHead::SingleClass.interpret(vec![]).is_err());
    }
}
