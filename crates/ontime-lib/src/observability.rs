//! Metrics and structured event logging
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, errors, unseen categories, bundle info)
//! - Named JSON log events emitted through tracing

use crate::encoding::UnseenFields;
use crate::pipeline::TrainingSummary;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, register_int_gauge,
    GaugeVec, Histogram, IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info};

/// Histogram buckets for per-request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    unseen_categories_total: IntCounterVec,
    bundle_info: GaugeVec,
    bundle_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "ontime_prediction_latency_seconds",
                "Time spent scoring a single flight",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "ontime_predictions_total",
                "Predictions served, by outcome",
                &["outcome"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "ontime_prediction_errors_total",
                "Failed prediction requests, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            unseen_categories_total: register_int_counter_vec!(
                "ontime_unseen_categories_total",
                "Categorical inputs absent from the training corpus",
                &["field"]
            )
            .expect("Failed to register unseen_categories_total"),

            bundle_info: register_gauge_vec!(
                "ontime_bundle_info",
                "Information about the currently loaded artifact bundle",
                &["checksum", "scorer"]
            )
            .expect("Failed to register bundle_info"),

            bundle_loaded: register_int_gauge!(
                "ontime_bundle_loaded",
                "1 when an artifact bundle is loaded, 0 when serving degraded"
            )
            .expect("Failed to register bundle_loaded"),
        }
    }
}

/// Handle to the process-wide service metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn record_prediction(&self, is_likely_late: bool, unseen: &UnseenFields) {
        let outcome = if is_likely_late { "late" } else { "on_time" };
        self.inner()
            .predictions_total
            .with_label_values(&[outcome])
            .inc();
        for field in unseen.fields() {
            self.inner()
                .unseen_categories_total
                .with_label_values(&[field.as_str()])
                .inc();
        }
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Publish the loaded bundle, replacing any previous one
    pub fn set_bundle(&self, checksum: &str, scorer: &str) {
        self.inner().bundle_info.reset();
        self.inner()
            .bundle_info
            .with_label_values(&[checksum, scorer])
            .set(1.0);
        self.inner().bundle_loaded.set(1);
    }

    pub fn set_bundle_unavailable(&self) {
        self.inner().bundle_info.reset();
        self.inner().bundle_loaded.set(0);
    }
}

/// Structured logger for service and training events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, bind_address: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            bind_address = %bind_address,
            "Prediction service started"
        );
    }

    pub fn log_bundle_loaded(
        &self,
        path: &Path,
        checksum: &str,
        scorer: &str,
        threshold: f64,
        training_rows: usize,
    ) {
        info!(
            event = "bundle_loaded",
            service = %self.service,
            path = ?path,
            checksum = %checksum,
            scorer = %scorer,
            decision_threshold = threshold,
            training_rows = training_rows,
            "Artifact bundle loaded"
        );
    }

    pub fn log_bundle_load_failed(&self, path: &Path, reason: &str) {
        error!(
            event = "bundle_load_failed",
            service = %self.service,
            path = ?path,
            reason = %reason,
            "Artifact bundle failed to load, serving degraded"
        );
    }

    /// One scored flight; raw inputs are logged so unseen values can be traced
    pub fn log_prediction(
        &self,
        airline: &str,
        origin: &str,
        destination: &str,
        probability: f64,
        is_likely_late: bool,
        unseen: &UnseenFields,
    ) {
        let unseen: Vec<&str> = unseen.fields().iter().map(|f| f.as_str()).collect();
        info!(
            event = "prediction_served",
            service = %self.service,
            airline = %airline,
            origin = %origin,
            destination = %destination,
            probability = probability,
            is_likely_late = is_likely_late,
            unseen = ?unseen,
            "Prediction served"
        );
    }

    pub fn log_training_completed(&self, output: &Path, checksum: &str, summary: &TrainingSummary) {
        info!(
            event = "training_completed",
            service = %self.service,
            output = ?output,
            checksum = %checksum,
            records_read = summary.records_read,
            training_rows = summary.training_rows,
            validation_rows = summary.validation_rows,
            scale_pos_weight = summary.scale_pos_weight,
            scorer = %summary.scorer,
            "Training completed, bundle written"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Prediction service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    fn exposition() -> String {
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_service_metrics_exposed() {
        let metrics = ServiceMetrics::new();
        metrics.observe_prediction_latency(0.0002);
        metrics.record_prediction(true, &UnseenFields::default());
        metrics.inc_prediction_errors("invalid_input");
        metrics.set_bundle("abc123", "boosted");

        let text = exposition();
        assert!(text.contains("ontime_prediction_latency_seconds"));
        assert!(text.contains(r#"ontime_predictions_total{outcome="late"}"#));
        assert!(text.contains(r#"ontime_prediction_errors_total{kind="invalid_input"}"#));
        assert!(text.contains(r#"checksum="abc123""#));
    }

    #[test]
    fn test_handles_share_collectors() {
        let a = ServiceMetrics::new();
        let b = a.clone();
        a.inc_prediction_errors("internal_error");
        b.inc_prediction_errors("internal_error");
        assert!(exposition().contains(r#"kind="internal_error""#));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("ontime-test");
        assert_eq!(logger.service, "ontime-test");
    }
}
