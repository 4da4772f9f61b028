//! Flight delay prediction library
//!
//! This crate provides the core functionality for:
//! - Temporal feature extraction and feature vector assembly
//! - Categorical encoding and historical statistics tables
//! - Gradient-boosted and ONNX scorers
//! - Artifact bundle persistence
//! - Training and inference pipelines
//! - Health checks and observability

pub mod bundle;
pub mod encoding;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod scorer;
pub mod stats;

pub use bundle::{ArtifactBundle, BundleMetadata, BundleSummary};
pub use error::{BundleLoadError, ParseError, PredictError, ScorerError, TrainError};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use pipeline::{InferencePipeline, Prediction, TrainingConfig};
