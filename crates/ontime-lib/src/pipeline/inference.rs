//! Per-request scoring against a loaded bundle

use crate::bundle::ArtifactBundle;
use crate::encoding::UnseenFields;
use crate::error::{BundleLoadError, PredictError, ScorerError};
use crate::features::{self, FeatureVector};
use crate::models::{FlightQuery, PredictionResult};
use crate::scorer::Scorer;
use std::sync::Arc;
use tracing::debug;

/// Decimal places kept in the reported probability
pub const PROBABILITY_DECIMALS: i32 = 4;

/// Strict decision rule: exactly-at-threshold is on time
pub fn decide(probability: f64, threshold: f64) -> bool {
    probability > threshold
}

pub fn round_probability(probability: f64) -> f64 {
    let scale = 10f64.powi(PROBABILITY_DECIMALS);
    (probability * scale).round() / scale
}

/// Scoring output with the intermediate values that produced it
#[derive(Debug, Clone)]
pub struct Prediction {
    pub result: PredictionResult,
    /// Scorer output before rounding
    pub raw_probability: f64,
    pub features: FeatureVector,
    pub unseen: UnseenFields,
}

#[derive(Debug, Clone)]
enum BundleState {
    Loaded(Arc<ArtifactBundle>),
    /// Load failed at startup; holds the reason
    Unavailable(String),
}

/// Inference entry point shared by all request handlers.
///
/// Cloning is cheap; clones share the same read-only bundle.
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    state: BundleState,
}

impl InferencePipeline {
    pub fn new(bundle: Arc<ArtifactBundle>) -> Self {
        Self {
            state: BundleState::Loaded(bundle),
        }
    }

    /// A pipeline that rejects every request
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: BundleState::Unavailable(reason.into()),
        }
    }

    pub fn from_load_result(result: Result<ArtifactBundle, BundleLoadError>) -> Self {
        match result {
            Ok(bundle) => Self::new(Arc::new(bundle)),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }

    pub fn bundle(&self) -> Option<&Arc<ArtifactBundle>> {
        match &self.state {
            BundleState::Loaded(bundle) => Some(bundle),
            BundleState::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.bundle().is_some()
    }

    /// Why the bundle is unavailable, if it is
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            BundleState::Loaded(_) => None,
            BundleState::Unavailable(reason) => Some(reason),
        }
    }

    fn loaded(&self) -> Result<&ArtifactBundle, PredictError> {
        match &self.state {
            BundleState::Loaded(bundle) => Ok(bundle.as_ref()),
            BundleState::Unavailable(reason) => {
                Err(PredictError::ServiceUnavailable(reason.clone()))
            }
        }
    }

    pub fn predict(&self, query: &FlightQuery) -> Result<PredictionResult, PredictError> {
        self.predict_detailed(query).map(|p| p.result)
    }

    pub fn predict_detailed(&self, query: &FlightQuery) -> Result<Prediction, PredictError> {
        let bundle = self.loaded()?;
        score(bundle, query)
    }

    /// Score each query independently.
    ///
    /// Only an unavailable bundle fails the whole batch.
    pub fn predict_batch(
        &self,
        queries: &[FlightQuery],
    ) -> Result<Vec<Result<Prediction, PredictError>>, PredictError> {
        let bundle = self.loaded()?;
        Ok(queries.iter().map(|q| score(bundle, q)).collect())
    }
}

fn score(bundle: &ArtifactBundle, query: &FlightQuery) -> Result<Prediction, PredictError> {
    let temporal = features::extract(&query.scheduled_departure)?;
    let (vector, unseen) = features::derive(
        bundle.encoders(),
        bundle.stats(),
        &query.airline,
        &query.origin,
        &query.destination,
        &temporal,
    );

    let probability = bundle.scorer().predict_proba(&vector)?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ScorerError::InvalidProbability(probability).into());
    }

    let is_likely_late = decide(probability, bundle.decision_threshold());
    debug!(
        airline = %query.airline,
        origin = %query.origin,
        destination = %query.destination,
        probability = probability,
        is_likely_late = is_likely_late,
        unseen = unseen.fields().len(),
        "Flight scored"
    );

    Ok(Prediction {
        result: PredictionResult {
            is_likely_late,
            probability: round_probability(probability),
        },
        raw_probability: probability,
        features: vector,
        unseen,
    })
}
