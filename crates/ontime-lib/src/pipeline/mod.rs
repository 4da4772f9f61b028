//! Training and inference pipelines

pub mod evaluation;
pub mod inference;
pub mod training;

pub use evaluation::{evaluate, EvaluationReport};
pub use inference::{decide, round_probability, InferencePipeline, Prediction};
pub use training::{train, ScorerSource, TrainingConfig, TrainingOutcome, TrainingSummary};

#[cfg(test)]
mod tests;
