//! HTTP implementation of [`SimulationTransport`] backed by `reqwest`.

use crate::error::EnvError;
use crate::transport::SimulationTransport;
use crate::types::{DynamicSimulationRequest, DynamicSimulationResponse, HealthStatus};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// JSON-over-HTTP client for the simulation service.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Service address used when nothing else is configured.
    pub const DEFAULT_URL: &'static str = "http://localhost:8000";

    /// Environment variable consulted by [`HttpTransport::from_env`].
    pub const URL_ENV: &'static str = "METAFLUX_SERVICE_URL";

    /// Creates a transport for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a transport from the environment
    ///
    /// Optional: METAFLUX_SERVICE_URL (defaults to http://localhost:8000)
    pub fn from_env() -> Self {
        let url = std::env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.into());
        Self::new(url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Pulls the most specific message out of an error body.
///
/// FastAPI answers `{"detail": "..."}`, or a list of validation issues under
/// `detail`; anything else falls back to the raw text, then the status reason.
pub(crate) fn error_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(other) => return other.to_string(),
            None => {}
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

#[async_trait]
impl SimulationTransport for HttpTransport {
    async fn simulate_dynamic(
        &self,
        request: DynamicSimulationRequest,
    ) -> Result<DynamicSimulationResponse, EnvError> {
        let response = self
            .client
            .post(self.url("simulate-dynamic"))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| EnvError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvError::server(status.as_u16(), error_detail(status, &body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EnvError::malformed(e.to_string()))?;

        DynamicSimulationResponse::from_json(body)
    }

    async fn health(&self) -> Result<HealthStatus, EnvError> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(|e| EnvError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnvError::server(status.as_u16(), error_detail(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| EnvError::malformed(e.to_string()))
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let transport = HttpTransport::new("http://sim.local:8000/");
        assert_eq!(transport.url("health"), "http://sim.local:8000/health");
        assert_eq!(transport.endpoint(), "http://sim.local:8000");
    }

    #[test]
    fn test_error_detail_from_fastapi_string() {
        let detail = error_detail(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Model iML1515 not found"}"#,
        );
        assert_eq!(detail, "Model iML1515 not found");
    }

    #[test]
    fn test_error_detail_from_validation_list() {
        let detail = error_detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"msg": "field required"}]}"#,
        );
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_error_detail_falls_back_to_text_then_reason() {
        assert_eq!(
            error_detail(StatusCode::BAD_GATEWAY, "upstream crashed\n"),
            "upstream crashed"
        );
        assert_eq!(
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "Internal Server Error"
        );
    }
}
