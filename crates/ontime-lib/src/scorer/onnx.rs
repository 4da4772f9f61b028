//! ONNX scorer using tract
//!
//! Lets a classifier trained outside this workspace (for example an XGBoost
//! model exported with `onnxmltools`) be packaged into a bundle. The model
//! must take a single `[1, 13]` f32 input in schema order and emit a float
//! probability tensor (`[1, 2]` class probabilities or a single `[1, 1]`
//! late-class probability). Exports with a ZipMap output are not supported.

use super::Scorer;
use crate::error::ScorerError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxScorer {
    model: TractModel,
    /// Original model bytes, kept so the bundle can be re-serialized
    model_bytes: Vec<u8>,
    checksum: String,
}

impl std::fmt::Debug for OnnxScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxScorer")
            .field("size_bytes", &self.model_bytes.len())
            .field("checksum", &self.checksum)
            .finish()
    }
}

impl OnnxScorer {
    /// Load and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: Vec<u8>) -> Result<Self, ScorerError> {
        let model = Self::load_model(&model_bytes)?;
        let checksum = compute_checksum(&model_bytes);
        Ok(Self {
            model,
            model_bytes,
            checksum,
        })
    }

    fn load_model(model_bytes: &[u8]) -> Result<TractModel, ScorerError> {
        let onnx_err = |stage: &str, e: TractError| ScorerError::Onnx(format!("{stage}: {e}"));

        tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| onnx_err("failed to parse ONNX model", e))?
            .with_input_fact(0, f32::fact([1, FEATURE_COUNT]).into())
            .map_err(|e| onnx_err("failed to set input shape", e))?
            .into_optimized()
            .map_err(|e| onnx_err("failed to optimize model", e))?
            .into_runnable()
            .map_err(|e| onnx_err("failed to create runnable model", e))
    }

    pub fn model_bytes(&self) -> &[u8] {
        &self.model_bytes
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn features_to_tensor(features: &FeatureVector) -> Result<Tensor, ScorerError> {
        tract_ndarray::Array2::from_shape_vec((1, FEATURE_COUNT), features.as_slice().to_vec())
            .map(Tensor::from)
            .map_err(|e| ScorerError::Onnx(format!("failed to build input tensor: {e}")))
    }
}

/// Late-class probability from the first float output
fn late_probability(outputs: &[TValue]) -> Result<f64, ScorerError> {
    for output in outputs {
        let Ok(view) = output.to_array_view::<f32>() else {
            // label outputs are int64
            continue;
        };
        let values: Vec<f32> = view.iter().copied().collect();
        return match values.as_slice() {
            [p] => Ok(*p as f64),
            [_, late, ..] => Ok(*late as f64),
            [] => Err(ScorerError::Onnx("empty probability output".to_string())),
        };
    }
    Err(ScorerError::Onnx(
        "model has no float probability output".to_string(),
    ))
}

impl Scorer for OnnxScorer {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScorerError> {
        let start = Instant::now();
        let input = Self::features_to_tensor(features)?;

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| ScorerError::Onnx(format!("inference failed: {e}")))?;
        let probability = late_probability(&outputs)?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(probability)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = OnnxScorer::from_bytes(b"definitely not a protobuf".to_vec()).unwrap_err();
        assert!(matches!(err, ScorerError::Onnx(_)));
    }

    #[test]
    fn test_checksum_consistency() {
        let a = compute_checksum(b"model");
        assert_eq!(a, compute_checksum(b"model"));
        assert_ne!(a, compute_checksum(b"model2"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_probability_from_two_class_output() {
        let probs: Tensor = tract_ndarray::arr2(&[[0.25_f32, 0.75]]).into();
        let labels: Tensor = tract_ndarray::arr1(&[1_i64]).into();
        let p = late_probability(&[labels.into(), probs.into()]).unwrap();
        assert!((p - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_probability_from_single_output() {
        let probs: Tensor = tract_ndarray::arr2(&[[0.4_f32]]).into();
        let p = late_probability(&[probs.into()]).unwrap();
        assert!((p - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_no_float_output() {
        let labels: Tensor = tract_ndarray::arr1(&[0_i64]).into();
        assert!(late_probability(&[labels.into()]).is_err());
    }
}
