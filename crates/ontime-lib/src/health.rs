//! Component health and readiness for the prediction service
//!
//! The service stays up when the bundle fails to load; readiness is what
//! tells orchestrators to keep traffic away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but something failed recently
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Healthy or degraded
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Parts of the service tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    /// Artifact bundle loaded at startup
    Bundle,
    /// Per-request scoring
    Predictor,
}

impl Component {
    pub const ALL: [Component; 2] = [Component::Bundle, Component::Predictor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Bundle => "bundle",
            Component::Predictor => "predictor",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub since: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: Utc::now(),
        }
    }

    pub fn healthy() -> Self {
        Self::new(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across components
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
struct RegistryState {
    initialized: bool,
    components: BTreeMap<Component, ComponentHealth>,
}

/// Shared view of component health.
///
/// Every [`Component`] starts healthy; the service is not ready until
/// [`HealthRegistry::mark_initialized`] is called.
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        let components = Component::ALL
            .into_iter()
            .map(|c| (c, ComponentHealth::healthy()))
            .collect();
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                initialized: false,
                components,
            })),
        }
    }

    pub async fn set(&self, component: Component, health: ComponentHealth) {
        self.state.write().await.components.insert(component, health);
    }

    pub async fn set_healthy(&self, component: Component) {
        self.set(component, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentHealth::unhealthy(message)).await;
    }

    /// Reset a degraded component to healthy; other states are left alone
    pub async fn clear_degraded(&self, component: Component) {
        let degraded = |state: &RegistryState| {
            state
                .components
                .get(&component)
                .is_some_and(|h| h.status == ComponentStatus::Degraded)
        };
        let is_degraded = degraded(&*self.state.read().await);
        if !is_degraded {
            return;
        }

        let mut state = self.state.write().await;
        if degraded(&*state) {
            state.components.insert(component, ComponentHealth::healthy());
        }
    }

    /// Startup finished, successfully or not
    pub async fn mark_initialized(&self) {
        self.state.write().await.initialized = true;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse {
            status,
            components: state.components.clone(),
        }
    }

    /// Ready once initialized with no unhealthy component
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if !state.initialized {
            return ReadinessResponse {
                ready: false,
                reason: Some("Service not yet initialized".to_string()),
            };
        }

        let failures: Vec<String> = state
            .components
            .iter()
            .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
            .map(|(component, h)| match &h.message {
                Some(message) => format!("{component}: {message}"),
                None => component.to_string(),
            })
            .collect();

        ReadinessResponse {
            ready: failures.is_empty(),
            reason: (!failures.is_empty()).then(|| failures.join("; ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_components_start_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), Component::ALL.len());
        assert!(health
            .components
            .values()
            .all(|h| h.status == ComponentStatus::Healthy));
    }

    #[tokio::test]
    async fn test_not_ready_until_initialized() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());

        registry.mark_initialized().await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }

    #[tokio::test]
    async fn test_degraded_predictor_keeps_service_ready() {
        let registry = HealthRegistry::new();
        registry.mark_initialized().await;
        registry
            .set_degraded(Component::Predictor, "Scorer returned NaN")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);
        assert!(registry.readiness().await.ready);

        registry.set_healthy(Component::Predictor).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_clear_degraded_leaves_unhealthy_alone() {
        let registry = HealthRegistry::new();
        registry.set_degraded(Component::Predictor, "Scorer returned NaN").await;
        registry.set_unhealthy(Component::Bundle, "bundle file missing").await;

        registry.clear_degraded(Component::Predictor).await;
        registry.clear_degraded(Component::Bundle).await;

        let health = registry.health().await;
        assert_eq!(
            health.components[&Component::Predictor].status,
            ComponentStatus::Healthy
        );
        assert_eq!(
            health.components[&Component::Bundle].status,
            ComponentStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_failed_bundle_blocks_readiness() {
        let registry = HealthRegistry::new();
        registry.mark_initialized().await;
        registry.set_degraded(Component::Predictor, "slow").await;
        registry
            .set_unhealthy(Component::Bundle, "bundle file missing")
            .await;

        // worst status wins
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("bundle: bundle file missing")
        );
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&ComponentStatus::Degraded).unwrap(),
            r#""degraded""#
        );

        let mut components = BTreeMap::new();
        components.insert(Component::Bundle, ComponentHealth::unhealthy("missing"));
        let json = serde_json::to_value(HealthResponse {
            status: ComponentStatus::Unhealthy,
            components,
        })
        .unwrap();
        assert_eq!(json["components"]["bundle"]["status"], "unhealthy");
        assert_eq!(json["components"]["bundle"]["message"], "missing");
    }

    #[test]
    fn test_status_ordering() {
        assert!(ComponentStatus::Healthy < ComponentStatus::Degraded);
        assert!(ComponentStatus::Degraded < ComponentStatus::Unhealthy);
        assert!(ComponentStatus::Degraded.is_operational());
        assert!(!ComponentStatus::Unhealthy.is_operational());
    }
}
