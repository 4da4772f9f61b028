//! Probability scorers
//!
//! A scorer maps an assembled [`FeatureVector`] to the late-class
//! probability. The native gradient-boosted model is fitted by the training
//! pipeline; an ONNX model exported elsewhere can be packaged instead.

pub mod boosted;
pub mod onnx;

pub use boosted::{BoostingParams, GradientBoostedTrees, RegressionTree, TreeNode};
pub use onnx::{compute_checksum, OnnxScorer};

use crate::error::{BundleLoadError, ScorerError};
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Trait for probability scorers
pub trait Scorer: Send + Sync {
    /// Late-class probability for one feature vector
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScorerError>;

    /// Short label used in metadata and metrics
    fn kind(&self) -> &'static str;
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// The scorer held by a loaded bundle
#[derive(Debug)]
pub enum ScorerModel {
    Boosted(GradientBoostedTrees),
    Onnx(OnnxScorer),
}

impl ScorerModel {
    /// Persisted form of this scorer
    pub fn to_stored(&self) -> StoredScorer {
        match self {
            ScorerModel::Boosted(model) => StoredScorer::Boosted(model.clone()),
            ScorerModel::Onnx(model) => StoredScorer::Onnx {
                model_hex: hex::encode(model.model_bytes()),
                checksum: model.checksum().to_string(),
            },
        }
    }

    fn inner(&self) -> &dyn Scorer {
        match self {
            ScorerModel::Boosted(model) => model as &dyn Scorer,
            ScorerModel::Onnx(model) => model as &dyn Scorer,
        }
    }
}

impl Scorer for ScorerModel {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64, ScorerError> {
        self.inner().predict_proba(features)
    }

    fn kind(&self) -> &'static str {
        self.inner().kind()
    }
}

/// Scorer as written in the bundle file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoredScorer {
    Boosted(GradientBoostedTrees),
    Onnx {
        /// Hex-encoded ONNX protobuf
        model_hex: String,
        /// SHA256 of the decoded model bytes
        checksum: String,
    },
}

impl StoredScorer {
    /// Rebuild a runnable scorer, verifying structure and checksums
    pub fn restore(self) -> Result<ScorerModel, BundleLoadError> {
        match self {
            StoredScorer::Boosted(model) => {
                model.validate()?;
                Ok(ScorerModel::Boosted(model))
            }
            StoredScorer::Onnx {
                model_hex,
                checksum,
            } => {
                let bytes = hex::decode(&model_hex).map_err(|e| {
                    ScorerError::InvalidParameters(format!("model_hex is not valid hex: {e}"))
                })?;
                let actual = compute_checksum(&bytes);
                if actual != checksum {
                    return Err(BundleLoadError::ChecksumMismatch {
                        expected: checksum,
                        actual,
                    });
                }
                Ok(ScorerModel::Onnx(OnnxScorer::from_bytes(bytes)?))
            }
        }
    }
}
