//! Error taxonomy for training, bundle loading and prediction

use crate::models::CategoryField;
use std::path::PathBuf;
use thiserror::Error;

/// A scheduled departure that could not be read as a calendar date-time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid scheduled departure '{input}': expected an ISO-8601 date-time")]
pub struct ParseError {
    pub input: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Failures raised by a scorer implementation
#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("scorer produced an invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("onnx runtime error: {0}")]
    Onnx(String),

    #[error("invalid scorer parameters: {0}")]
    InvalidParameters(String),
}

/// Per-request prediction failures
#[derive(Debug, Error)]
pub enum PredictError {
    /// The artifact bundle never loaded; no computation was attempted
    #[error("prediction service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("prediction failed: {0}")]
    Computation(String),
}

impl From<ScorerError> for PredictError {
    fn from(err: ScorerError) -> Self {
        PredictError::Computation(err.to_string())
    }
}

impl PredictError {
    /// Stable label used in metrics and API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ServiceUnavailable(_) => "service_unavailable",
            PredictError::Parse(_) => "invalid_input",
            PredictError::Computation(_) => "internal_error",
        }
    }
}

/// Startup-time failures reading an artifact bundle
#[derive(Debug, Error)]
pub enum BundleLoadError {
    #[error("failed to read bundle {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bundle is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("unsupported bundle format version {found} (expected {expected})")]
    UnsupportedFormat { expected: u32, found: u32 },

    #[error("feature schema mismatch: bundle has {found:?}, expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("decision threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("{0} encoding classes are not sorted and unique")]
    MalformedEncoding(CategoryField),

    #[error("scorer checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to restore scorer: {0}")]
    Scorer(#[from] ScorerError),
}

/// Failures of the offline training pipeline
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no usable training rows after filtering ({0} records read)")]
    EmptyCorpus(usize),

    #[error("training corpus contains a single class ({positives} late, {negatives} on time)")]
    SingleClass { positives: usize, negatives: usize },

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scorer(#[from] ScorerError),
}
