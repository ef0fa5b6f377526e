//! Simulation-service transport abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{DynamicSimulationRequest, DynamicSimulationResponse, HealthStatus};

/// Abstraction for the request/response exchange with the remote
/// simulation service.
///
/// # Implementations
///
/// - **Production**: `HttpTransport` - JSON over HTTP via `reqwest`
/// - **Simulation**: `ScriptedTransport` - per-attempt fault plans
///
/// # Flow
///
/// ```text
/// Orchestrator                 Transport                  Service
///   |                              |                         |
///   |-- simulate_dynamic(req) ---->|                         |
///   |                              |-- POST /simulate-dynamic>|
///   |                              |<-------- body ----------|
///   |<-- Ok(response) / Err(e) ----|                         |
/// ```
///
/// Implementations do not enforce a deadline; the caller bounds each
/// attempt.
#[async_trait]
pub trait SimulationTransport: Send + Sync + 'static {
    /// Runs one dynamic simulation request.
    ///
    /// # Returns
    /// * `Ok(response)` - A decoded, shape-checked body
    /// * `Err(EnvError::NetworkFailure)` - Connection could not be used
    /// * `Err(EnvError::ServerFailure)` - Non-success status or `success: false`
    /// * `Err(EnvError::MalformedResponse)` - Body did not decode
    async fn simulate_dynamic(
        &self,
        request: DynamicSimulationRequest,
    ) -> Result<DynamicSimulationResponse, EnvError>;

    /// Probes the service health endpoint.
    async fn health(&self) -> Result<HealthStatus, EnvError>;

    /// Returns a printable description of the remote end (for logging).
    fn endpoint(&self) -> String;
}
