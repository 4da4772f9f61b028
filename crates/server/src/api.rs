//! HTTP API for predictions, health checks and Prometheus metrics

use crate::config::ServerConfig;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ontime_lib::{
    bundle::{ArtifactBundle, BundleSummary},
    health::{Component, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    pipeline::InferencePipeline,
    scorer::Scorer,
    FlightQuery, PredictError, PredictionResult,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: InferencePipeline,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        pipeline: InferencePipeline,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            pipeline,
            health_registry,
            metrics,
            logger,
        }
    }
}

/// Load the bundle and register components.
///
/// A load failure is not fatal: the state comes back with an unavailable
/// pipeline and an unhealthy bundle component.
pub async fn initialize_state(config: &ServerConfig) -> Arc<AppState> {
    let health_registry = HealthRegistry::new();

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    let pipeline = match ArtifactBundle::load(&config.bundle_path) {
        Ok(bundle) => {
            let checksum = bundle.checksum().unwrap_or_default().to_string();
            let scorer = bundle.scorer().kind();
            metrics.set_bundle(&checksum, scorer);
            logger.log_bundle_loaded(
                &config.bundle_path,
                &checksum,
                scorer,
                bundle.decision_threshold(),
                bundle.metadata().training_rows,
            );
            InferencePipeline::new(Arc::new(bundle))
        }
        Err(e) => {
            let reason = e.to_string();
            metrics.set_bundle_unavailable();
            logger.log_bundle_load_failed(&config.bundle_path, &reason);
            health_registry
                .set_unhealthy(Component::Bundle, reason.clone())
                .await;
            InferencePipeline::unavailable(reason)
        }
    };

    health_registry.mark_initialized().await;
    Arc::new(AppState::new(pipeline, health_registry, metrics, logger))
}

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&PredictError> for ErrorBody {
    fn from(err: &PredictError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Failures turned into HTTP responses
pub enum ApiError {
    Predict(PredictError),
    /// Body was not valid JSON or did not match the request shape
    InvalidBody(JsonRejection),
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        Self::Predict(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection)
    }
}

fn status_for(err: &PredictError) -> StatusCode {
    match err {
        PredictError::Parse(_) => StatusCode::BAD_REQUEST,
        PredictError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::Computation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Predict(err) => {
                (status_for(&err), Json(ErrorBody::from(&err))).into_response()
            }
            ApiError::InvalidBody(rejection) => {
                let body = ErrorBody {
                    error: "invalid_input".to_string(),
                    message: rejection.body_text(),
                };
                (rejection.status(), Json(body)).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub flights: Vec<FlightQuery>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Ok(PredictionResult),
    Err(ErrorBody),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

/// Unwrap a JSON body, counting rejected ones as invalid input
fn accept_body<T>(
    state: &AppState,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            state.metrics.inc_prediction_errors("invalid_input");
            Err(rejection.into())
        }
    }
}

async fn record_success(state: &AppState) {
    state
        .health_registry
        .clear_degraded(Component::Predictor)
        .await;
}

async fn record_failure(state: &AppState, err: &PredictError) {
    state.metrics.inc_prediction_errors(err.kind());
    if let PredictError::Computation(message) = err {
        warn!(error = %message, "Prediction computation failed");
        state
            .health_registry
            .set_degraded(Component::Predictor, message.clone())
            .await;
    }
}

/// Score one flight
async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FlightQuery>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let query = accept_body(&state, body)?;
    let start = Instant::now();
    let outcome = state.pipeline.predict_detailed(&query);
    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());

    match outcome {
        Ok(prediction) => {
            state
                .metrics
                .record_prediction(prediction.result.is_likely_late, &prediction.unseen);
            state.logger.log_prediction(
                &query.airline,
                &query.origin,
                &query.destination,
                prediction.raw_probability,
                prediction.result.is_likely_late,
                &prediction.unseen,
            );
            record_success(&state).await;
            Ok(Json(prediction.result))
        }
        Err(e) => {
            record_failure(&state, &e).await;
            Err(e.into())
        }
    }
}

/// Score several flights; failures are reported per item
async fn predict_batch(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let request = accept_body(&state, body)?;
    let start = Instant::now();
    let outcomes = match state.pipeline.predict_batch(&request.flights) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            record_failure(&state, &e).await;
            return Err(e.into());
        }
    };

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(prediction) => {
                state
                    .metrics
                    .record_prediction(prediction.result.is_likely_late, &prediction.unseen);
                record_success(&state).await;
                results.push(BatchItem::Ok(prediction.result));
            }
            Err(e) => {
                record_failure(&state, &e).await;
                results.push(BatchItem::Err(ErrorBody::from(&e)));
            }
        }
    }

    info!(
        flights = results.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "Batch prediction served"
    );
    Ok(Json(BatchResponse { results }))
}

/// Describe the loaded bundle
async fn model(State(state): State<Arc<AppState>>) -> Result<Json<BundleSummary>, ApiError> {
    match state.pipeline.bundle() {
        Some(bundle) => Ok(Json(bundle.summary())),
        None => Err(PredictError::ServiceUnavailable(
            state
                .pipeline
                .unavailable_reason()
                .unwrap_or("bundle not loaded")
                .to_string(),
        )
        .into()),
    }
}

/// Health check response - 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .route("/model", get(model))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
