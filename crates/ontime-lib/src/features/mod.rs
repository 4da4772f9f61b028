//! Feature derivation shared by training and inference
//!
//! Anything that turns a flight into scorer input lives here so the two
//! pipelines cannot drift apart.

pub mod temporal;
pub mod vector;

pub use temporal::{extract, parse_departure, TemporalFeatures};
pub use vector::{
    assemble, feature_names, schema_matches, EncodedCategories, FeatureVector, HistoricalStats,
    FEATURE_COUNT, FEATURE_NAMES, SCHEMA_VERSION,
};

use crate::encoding::{CategoryEncoders, UnseenFields};
use crate::stats::StatisticsTables;

/// Encode, look up and assemble one flight.
///
/// Called with identical arguments by the training pipeline (for every
/// corpus row) and the inference pipeline (for every request).
pub fn derive(
    encoders: &CategoryEncoders,
    stats: &StatisticsTables,
    airline: &str,
    origin: &str,
    destination: &str,
    temporal: &TemporalFeatures,
) -> (FeatureVector, UnseenFields) {
    let (categories, unseen) = encoders.encode(airline, origin, destination);
    let historical = stats.lookup_all(airline, origin, destination, temporal.hour);
    (assemble(temporal, &categories, &historical), unseen)
}
