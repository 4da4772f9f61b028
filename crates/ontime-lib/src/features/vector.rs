//! Fixed-order feature vector assembly
//!
//! The scorer only sees positions, so this module is the single owner of the
//! schema: names, order and count. Both pipelines assemble through
//! [`assemble`], and the names are persisted in every bundle and checked on load.

use super::temporal::TemporalFeatures;
use serde::{Deserialize, Serialize};

/// Number of scorer inputs
pub const FEATURE_COUNT: usize = 13;

/// Bumped whenever [`FEATURE_NAMES`] or the meaning of a position changes
pub const SCHEMA_VERSION: u32 = 1;

/// Scorer input names, in positional order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "airline_encoded",
    "origin_encoded",
    "destination_encoded",
    "hour",
    "day_of_week",
    "month",
    "is_weekend",
    "is_rush_hour",
    "is_high_season",
    "is_month_edge",
    "airline_avg_delay",
    "route_avg_delay",
    "hour_delay_rate",
];

/// Category IDs after encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedCategories {
    pub airline: u32,
    pub origin: u32,
    pub destination: u32,
}

/// Historical aggregates after lookup (missing keys already resolved)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalStats {
    pub airline_avg_delay: f64,
    pub route_avg_delay: f64,
    pub hour_delay_rate: f64,
}

/// Scorer input in schema order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_array(&self) -> &[f32; FEATURE_COUNT] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value by schema name
    pub fn get(&self, name: &str) -> Option<f32> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.0[idx])
    }

    /// (name, value) pairs in schema order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Place every input at its schema position
pub fn assemble(
    temporal: &TemporalFeatures,
    categories: &EncodedCategories,
    stats: &HistoricalStats,
) -> FeatureVector {
    FeatureVector([
        categories.airline as f32,
        categories.origin as f32,
        categories.destination as f32,
        temporal.hour as f32,
        temporal.day_of_week as f32,
        temporal.month as f32,
        flag(temporal.is_weekend),
        flag(temporal.is_rush_hour),
        flag(temporal.is_high_season),
        flag(temporal.is_month_edge),
        stats.airline_avg_delay as f32,
        stats.route_avg_delay as f32,
        stats.hour_delay_rate as f32,
    ])
}

/// True when persisted names match the compiled schema exactly
pub fn schema_matches(names: &[String]) -> bool {
    names.len() == FEATURE_COUNT && names.iter().zip(FEATURE_NAMES).all(|(a, b)| a == b)
}

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::temporal;

    fn sample() -> FeatureVector {
        let t = temporal::extract("2024-01-15T08:00:00").unwrap();
        assemble(
            &t,
            &EncodedCategories {
                airline: 101,
                origin: 202,
                destination: 303,
            },
            &HistoricalStats {
                airline_avg_delay: 12.5,
                route_avg_delay: -3.25,
                hour_delay_rate: 0.375,
            },
        )
    }

    #[test]
    fn test_schema_order() {
        let v = sample();
        let expected: [f32; FEATURE_COUNT] = [
            101.0, 202.0, 303.0, 8.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 12.5, -3.25, 0.375,
        ];
        assert_eq!(v.as_array(), &expected);
        assert_eq!(v.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_named_lookup_matches_positions() {
        let v = sample();
        assert_eq!(v.get("airline_encoded"), Some(101.0));
        assert_eq!(v.get("destination_encoded"), Some(303.0));
        assert_eq!(v.get("hour"), Some(8.0));
        assert_eq!(v.get("is_rush_hour"), Some(1.0));
        assert_eq!(v.get("route_avg_delay"), Some(-3.25));
        assert_eq!(v.get("hour_delay_rate"), Some(0.375));
        assert_eq!(v.get("unknown"), None);
        assert_eq!(v.named().count(), FEATURE_COUNT);
    }

    #[test]
    fn test_schema_matches() {
        assert!(schema_matches(&feature_names()));

        let mut swapped = feature_names();
        swapped.swap(0, 1);
        assert!(!schema_matches(&swapped));

        let mut short = feature_names();
        short.pop();
        assert!(!schema_matches(&short));
    }
}
