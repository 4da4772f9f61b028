//! Integration tests across training, persistence and inference
//!
//! These tests verify:
//! - A trained bundle survives a save/load cycle and serves predictions
//! - Training and serving derive identical features for the same flight
//! - Unseen categories, bad timestamps and missing bundles at the pipeline edge

use super::*;
use crate::bundle::ArtifactBundle;
use crate::error::{BundleLoadError, PredictError};
use crate::models::{CategoryField, FlightQuery, FlightRecord};
use crate::scorer::{BoostingParams, Scorer};
use std::sync::Arc;
use tempfile::TempDir;

fn record(
    airline: &str,
    origin: &str,
    destination: &str,
    scheduled: &str,
    actual: &str,
) -> FlightRecord {
    FlightRecord {
        airline: Some(airline.to_string()),
        origin: Some(origin.to_string()),
        destination: Some(destination.to_string()),
        status: Some("Realizado".to_string()),
        scheduled_departure: Some(scheduled.to_string()),
        actual_departure: Some(actual.to_string()),
    }
}

/// GLO morning departures from SBGR run ~40 minutes late, AZU afternoons are punctual
fn corpus() -> Vec<FlightRecord> {
    let mut records = Vec::new();
    for day in 1..=28 {
        records.push(record(
            "GLO",
            "SBGR",
            "SBRJ",
            &format!("2024-02-{day:02}T08:00:00"),
            &format!("2024-02-{day:02}T08:40:00"),
        ));
        records.push(record(
            "AZU",
            "SBKP",
            "SBPA",
            &format!("2024-02-{day:02}T15:00:00"),
            &format!("2024-02-{day:02}T15:03:00"),
        ));
    }
    records
}

fn config() -> TrainingConfig {
    TrainingConfig {
        boosting: BoostingParams {
            n_estimators: 20,
            max_depth: 3,
            learning_rate: 0.3,
            subsample: 1.0,
            colsample_bytree: 1.0,
            ..BoostingParams::default()
        },
        ..TrainingConfig::default()
    }
}

fn trained_bundle() -> ArtifactBundle {
    train(&corpus(), &config(), ScorerSource::Fit)
        .expect("training should succeed")
        .bundle
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_saved_bundle_predicts_like_the_trained_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight_model.json");

        let trained = trained_bundle();
        let checksum = trained.save(&path).unwrap();
        let loaded = ArtifactBundle::load(&path).unwrap();
        assert_eq!(loaded.checksum(), Some(checksum.as_str()));

        let before = InferencePipeline::new(Arc::new(trained));
        let after = InferencePipeline::new(Arc::new(loaded));

        for departure in ["2024-03-04T08:00:00", "2024-03-09T15:00:00"] {
            for (airline, origin, destination) in
                [("GLO", "SBGR", "SBRJ"), ("AZU", "SBKP", "SBPA")]
            {
                let q = FlightQuery::new(airline, origin, destination, departure);
                assert_eq!(before.predict(&q).unwrap(), after.predict(&q).unwrap());
            }
        }
    }

    #[test]
    fn test_learned_pattern_separates_routes() {
        let pipeline = InferencePipeline::new(Arc::new(trained_bundle()));

        let late = pipeline
            .predict(&FlightQuery::new("GLO", "SBGR", "SBRJ", "2024-03-04T08:00:00"))
            .unwrap();
        let punctual = pipeline
            .predict(&FlightQuery::new("AZU", "SBKP", "SBPA", "2024-03-04T15:00:00"))
            .unwrap();

        assert!(late.probability > punctual.probability);
        assert!(late.is_likely_late);
        assert!(!punctual.is_likely_late);
    }

    #[test]
    fn test_tampered_schema_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight_model.json");
        trained_bundle().save(&path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let names = doc["metadata"]["feature_names"].as_array_mut().unwrap();
        names.swap(0, 1);
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let err = ArtifactBundle::load(&path).unwrap_err();
        assert!(matches!(err, BundleLoadError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_identical_queries_on_reloaded_bundle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flight_model.json");
        trained_bundle().save(&path).unwrap();

        let pipeline = InferencePipeline::new(Arc::new(ArtifactBundle::load(&path).unwrap()));
        let q = FlightQuery::new("GLO", "SBGR", "SBRJ", "2024-01-15T08:00:00");
        let first = pipeline.predict(&q).unwrap();
        for _ in 0..10 {
            assert_eq!(pipeline.predict(&q).unwrap(), first);
        }
    }
}

mod feature_parity_tests {
    use super::*;

    #[test]
    fn test_training_and_serving_features_match() {
        let records = corpus();
        let cfg = config();
        let bundle = trained_bundle();

        let (rows, _) = training::clean_records(&records, &cfg);
        let offline = training::feature_rows(&rows, bundle.encoders(), bundle.stats());

        let pipeline = InferencePipeline::new(Arc::new(bundle));
        for ((record, row), expected) in records.iter().zip(&rows).zip(&offline) {
            let q = FlightQuery::new(
                &row.airline,
                &row.origin,
                &row.destination,
                record.scheduled_departure.as_deref().unwrap(),
            );
            let served = pipeline.predict_detailed(&q).unwrap();
            assert_eq!(&served.features, expected);
        }
    }

    #[test]
    fn test_raw_probability_matches_scorer() {
        let bundle = Arc::new(trained_bundle());
        let pipeline = InferencePipeline::new(bundle.clone());

        let prediction = pipeline
            .predict_detailed(&FlightQuery::new("GLO", "SBGR", "SBRJ", "2024-03-04T08:00:00"))
            .unwrap();
        let direct = bundle.scorer().predict_proba(&prediction.features).unwrap();

        assert_eq!(prediction.raw_probability, direct);
        assert_eq!(prediction.result.probability, round_probability(direct));
        assert_eq!(
            prediction.result.is_likely_late,
            decide(direct, bundle.decision_threshold())
        );
    }
}

mod edge_case_tests {
    use super::*;

    #[test]
    fn test_unseen_airline_completes() {
        let pipeline = InferencePipeline::new(Arc::new(trained_bundle()));

        let prediction = pipeline
            .predict_detailed(&FlightQuery::new("ONE", "SBGR", "SBRJ", "2024-03-04T08:00:00"))
            .unwrap();

        assert!(prediction.unseen.contains(CategoryField::Airline));
        assert!(!prediction.unseen.contains(CategoryField::Origin));
        assert_eq!(prediction.features.get("airline_encoded"), Some(0.0));
        assert_eq!(prediction.features.get("airline_avg_delay"), Some(0.0));
        assert!((0.0..=1.0).contains(&prediction.result.probability));
    }

    #[test]
    fn test_malformed_timestamp_leaves_pipeline_usable() {
        let pipeline = InferencePipeline::new(Arc::new(trained_bundle()));

        let err = pipeline
            .predict(&FlightQuery::new("GLO", "SBGR", "SBRJ", "not-a-date"))
            .unwrap_err();
        assert!(matches!(err, PredictError::Parse(_)));
        assert!(err.to_string().contains("not-a-date"));

        assert!(pipeline
            .predict(&FlightQuery::new("GLO", "SBGR", "SBRJ", "2024-03-04T08:00:00"))
            .is_ok());
    }

    #[test]
    fn test_missing_bundle_rejects_every_request() {
        let dir = TempDir::new().unwrap();
        let pipeline = InferencePipeline::from_load_result(ArtifactBundle::load(
            &dir.path().join("missing.json"),
        ));
        assert!(!pipeline.is_available());

        // even an unparseable timestamp reports unavailability, not a parse failure
        for departure in ["2024-03-04T08:00:00", "not-a-date"] {
            let err = pipeline
                .predict(&FlightQuery::new("GLO", "SBGR", "SBRJ", departure))
                .unwrap_err();
            assert!(matches!(err, PredictError::ServiceUnavailable(_)));
        }
    }
}
