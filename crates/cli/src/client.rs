//! API client for communicating with the prediction service

use anyhow::{Context, Result};
use ontime_lib::{
    bundle::BundleSummary, FlightQuery, HealthResponse, PredictionResult, ReadinessResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

/// Error body returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

async fn api_error(response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => anyhow::anyhow!("API error ({}): {} ({})", status, err.message, err.error),
        Err(_) => anyhow::anyhow!("API error ({}): {}", status, body),
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.get_with_status(path).await?;
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body);
        }
        serde_json::from_str(&body).context("Failed to parse response")
    }

    /// GET returning the status alongside the raw body.
    ///
    /// Probes answer 503 with a meaningful JSON body, so callers decide.
    async fn get_with_status(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;
        Ok((status, body))
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn predict(&self, query: &FlightQuery) -> Result<PredictionResult> {
        self.post("predict", query).await
    }

    pub async fn model(&self) -> Result<BundleSummary> {
        self.get("model").await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let (_, body) = self.get_with_status("healthz").await?;
        serde_json::from_str(&body).context("Failed to parse health response")
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        let (_, body) = self.get_with_status("readyz").await?;
        serde_json::from_str(&body).context("Failed to parse readiness response")
    }
}
