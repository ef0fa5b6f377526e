//! Request orchestration - fetches a dynamic simulation with one degraded retry.
//!
//! ```text
//! attempt 1 (history as requested) ──ok──► Full
//!        │ err
//!        ▼  notify Retry
//! attempt 2 (no history) ──ok──► Degraded   (notify DegradedResult)
//!        │ err
//!        ▼  notify FetchFailed
//!   SimulationError
//! ```
//!
//! Attempts run strictly one after the other, each bounded by
//! [`OrchestratorConfig::request_timeout`]. There is never a third attempt.

use crate::notify::{Notification, NotificationLevel, NotificationTopic, Notifier};
use crate::result::DynamicSimulationResult;
use metaflux_env::{DynamicSimulationRequest, EnvError, HealthStatus, PlaybackContext, SimulationTransport};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Parameters of one dynamic simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicParams {
    pub model_id: String,

    /// Initial substrate concentration, mmol/L (default: 20.0)
    pub initial_glucose: f64,

    /// Initial biomass, gDW/L (default: 0.01)
    pub initial_biomass: f64,

    /// Simulated horizon in hours (default: 24.0)
    pub total_time: f64,

    /// Fixed integration step in hours (default: 1.0)
    pub time_step: f64,

    pub knockouts: Vec<String>,

    /// Whether the primary attempt asks for flux history (default: true)
    pub include_flux_history: bool,
}

impl Default for DynamicParams {
    fn default() -> Self {
        Self {
            model_id: "e_coli_core".to_string(),
            initial_glucose: 20.0,
            initial_biomass: 0.01,
            total_time: 24.0,
            time_step: 1.0,
            knockouts: Vec::new(),
            include_flux_history: true,
        }
    }
}

impl DynamicParams {
    /// Builds the wire request for one attempt.
    pub fn request(&self, include_flux_history: bool) -> DynamicSimulationRequest {
        DynamicSimulationRequest {
            model_id: self.model_id.clone(),
            initial_glucose: self.initial_glucose,
            initial_biomass: self.initial_biomass,
            total_time: self.total_time,
            time_step: self.time_step,
            knockouts: self.knockouts.clone(),
            include_flux_history,
        }
    }
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fidelity {
    /// Everything requested was delivered
    Full,
    /// Fallback attempt, flux history dropped
    Degraded,
}

/// A validated result plus the path that produced it.
#[derive(Debug, Clone)]
pub struct FetchedResult {
    pub result: Arc<DynamicSimulationResult>,
    pub fidelity: Fidelity,
}

impl FetchedResult {
    pub fn is_degraded(&self) -> bool {
        self.fidelity == Fidelity::Degraded
    }
}

/// Terminal failure after both attempts.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("dynamic simulation failed: {diagnostic}")]
pub struct SimulationError {
    /// Most specific message available from the final attempt
    pub diagnostic: String,

    /// Why the primary attempt failed
    pub primary: EnvError,

    /// Why the fallback attempt failed
    #[source]
    pub fallback: EnvError,
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Budget for each attempt (default: 60s)
    pub request_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Fetches dynamic simulation results with bounded degradation.
pub struct RequestOrchestrator<Ctx, T>
where
    Ctx: PlaybackContext,
    T: SimulationTransport,
{
    context: Arc<Ctx>,
    transport: Arc<T>,
    notifier: Notifier,
    config: OrchestratorConfig,
}

impl<Ctx, T> RequestOrchestrator<Ctx, T>
where
    Ctx: PlaybackContext,
    T: SimulationTransport,
{
    /// Creates an orchestrator reporting through `notifier`.
    pub fn new(context: Arc<Ctx>, transport: Arc<T>, notifier: Notifier) -> Self {
        Self {
            context,
            transport,
            notifier,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Runs a dynamic simulation, retrying once without flux history.
    pub async fn run_dynamic_simulation(
        &self,
        params: &DynamicParams,
    ) -> Result<FetchedResult, SimulationError> {
        let wants_history = params.include_flux_history;

        let primary = match self.attempt(params, wants_history).await {
            Ok(result) => {
                info!(
                    model = %params.model_id,
                    samples = result.len(),
                    history = result.has_flux_history(),
                    "dynamic simulation received"
                );
                return Ok(FetchedResult {
                    result,
                    fidelity: Fidelity::Full,
                });
            }
            Err(err) => err,
        };

        warn!(
            model = %params.model_id,
            error = %primary,
            "primary attempt failed, retrying without flux history"
        );
        self.notifier.notify(Notification::new(
            NotificationLevel::Info,
            NotificationTopic::Retry,
            "High-resolution data could not be retrieved; retrying in reduced-fidelity mode",
        ));

        match self.attempt(params, false).await {
            Ok(result) => {
                let fidelity = if wants_history {
                    Fidelity::Degraded
                } else {
                    Fidelity::Full
                };
                info!(
                    model = %params.model_id,
                    samples = result.len(),
                    ?fidelity,
                    "dynamic simulation received on fallback"
                );
                if fidelity == Fidelity::Degraded {
                    self.notifier.notify(Notification::new(
                        NotificationLevel::Success,
                        NotificationTopic::DegradedResult,
                        "Simulation complete (reduced-fidelity mode)",
                    ));
                }
                Ok(FetchedResult { result, fidelity })
            }
            Err(fallback) => {
                let diagnostic = fallback.diagnostic();
                error!(model = %params.model_id, %diagnostic, "dynamic simulation failed");
                self.notifier.notify(Notification::new(
                    NotificationLevel::Error,
                    NotificationTopic::FetchFailed,
                    format!("Simulation failed: {}", diagnostic),
                ));
                Err(SimulationError {
                    diagnostic,
                    primary,
                    fallback,
                })
            }
        }
    }

    /// Probes the service once. Failure raises a `ServiceUnreachable` notice.
    pub async fn check_health(&self) -> Result<HealthStatus, EnvError> {
        let outcome = match self.bounded(self.transport.health()).await {
            Ok(status) if status.is_ok() => Ok(status),
            Ok(status) => Err(EnvError::server(200, format!("service status `{}`", status.status))),
            Err(err) => Err(err),
        };

        match &outcome {
            Ok(_) => info!(endpoint = %self.transport.endpoint(), "simulation service reachable"),
            Err(err) => {
                error!(endpoint = %self.transport.endpoint(), error = %err, "simulation service unreachable");
                self.notifier.notify(Notification::new(
                    NotificationLevel::Error,
                    NotificationTopic::ServiceUnreachable,
                    "Could not reach the simulation service; check that the backend is running",
                ));
            }
        }
        outcome
    }

    async fn attempt(
        &self,
        params: &DynamicParams,
        include_flux_history: bool,
    ) -> Result<Arc<DynamicSimulationResult>, EnvError> {
        let request = params.request(include_flux_history);
        let response = self.bounded(self.transport.simulate_dynamic(request)).await?;

        let mut result = DynamicSimulationResult::from_response(response)?;
        if !include_flux_history {
            result = result.without_flux_history();
        }
        Ok(Arc::new(result))
    }

    /// Races `call` against the per-attempt deadline.
    async fn bounded<R, F>(&self, call: F) -> Result<R, EnvError>
    where
        F: Future<Output = Result<R, EnvError>>,
    {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            outcome = call => outcome,
            _ = self.context.sleep(timeout) => Err(EnvError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::result::tests::response_with_time;
    use async_trait::async_trait;
    use metaflux_env::{DynamicSimulationResponse, TokioContext};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What the fake service does for one call.
    pub(crate) enum Reply {
        Ok(DynamicSimulationResponse),
        Fail(EnvError),
        Hang,
    }

    /// Transport fake answering from a queue and recording requests.
    #[derive(Default)]
    pub(crate) struct QueueTransport {
        replies: Mutex<VecDeque<Reply>>,
        pub requests: Mutex<Vec<DynamicSimulationRequest>>,
    }

    impl QueueTransport {
        pub(crate) fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<DynamicSimulationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SimulationTransport for QueueTransport {
        async fn simulate_dynamic(
            &self,
            request: DynamicSimulationRequest,
        ) -> Result<DynamicSimulationResponse, EnvError> {
            self.requests.lock().unwrap().push(request);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Ok(response)) => Ok(response),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                None => panic!("unexpected extra request"),
            }
        }

        async fn health(&self) -> Result<HealthStatus, EnvError> {
            Ok(HealthStatus {
                status: "ok".to_string(),
            })
        }

        fn endpoint(&self) -> String {
            "queue://test".to_string()
        }
    }

    fn orchestrator(
        replies: Vec<Reply>,
    ) -> (
        RequestOrchestrator<TokioContext, QueueTransport>,
        tokio::sync::mpsc::UnboundedReceiver<Notification>,
    ) {
        let (notifier, rx) = Notifier::channel();
        let orchestrator = RequestOrchestrator::new(
            TokioContext::shared(),
            Arc::new(QueueTransport::new(replies)),
            notifier,
        );
        (orchestrator, rx)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    fn full_response() -> DynamicSimulationResponse {
        response_with_time(vec![0.0, 1.0, 2.0])
    }

    #[tokio::test]
    async fn test_primary_success_is_full_and_silent() {
        let (orchestrator, mut rx) = orchestrator(vec![Reply::Ok(full_response())]);
        let fetched = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap();

        assert_eq!(fetched.fidelity, Fidelity::Full);
        assert!(fetched.result.has_flux_history());

        let requests = orchestrator.transport().requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].include_flux_history);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_timeout_falls_back_once() {
        let (orchestrator, mut rx) = orchestrator(vec![Reply::Hang, Reply::Ok(full_response())]);
        let fetched = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap();

        assert_eq!(fetched.fidelity, Fidelity::Degraded);
        assert!(fetched.is_degraded());
        assert!(fetched.result.flux_history().is_none());

        let requests = orchestrator.transport().requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].include_flux_history);
        assert!(!requests[1].include_flux_history);
        assert_eq!(requests[0].model_id, requests[1].model_id);

        let notes = drain(&mut rx);
        let advisories = notes.iter().filter(|n| n.topic == NotificationTopic::Retry).count();
        assert_eq!(advisories, 1);
        assert_eq!(notes[0].topic, NotificationTopic::Retry);
        assert_eq!(notes.last().unwrap().topic, NotificationTopic::DegradedResult);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_uses_configured_budget() {
        let (orchestrator, _rx) = orchestrator(vec![Reply::Hang, Reply::Hang]);
        let orchestrator = orchestrator.with_config(OrchestratorConfig {
            request_timeout: Duration::from_millis(250),
        });

        let start = tokio::time::Instant::now();
        let err = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.primary, EnvError::Timeout(250));
        assert_eq!(err.fallback, EnvError::Timeout(250));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(510));
    }

    #[tokio::test]
    async fn test_both_attempts_fail_is_terminal() {
        let (orchestrator, mut rx) = orchestrator(vec![
            Reply::Fail(EnvError::network("connection refused")),
            Reply::Fail(EnvError::server(500, "Model not optimal")),
        ]);
        let err = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.diagnostic, "Model not optimal");
        assert_eq!(err.primary, EnvError::network("connection refused"));
        assert_eq!(orchestrator.transport().requests().len(), 2);

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].level, NotificationLevel::Error);
        assert!(notes[1].message.contains("Model not optimal"));
    }

    #[tokio::test]
    async fn test_transport_message_used_without_server_detail() {
        let (orchestrator, _rx) = orchestrator(vec![
            Reply::Fail(EnvError::server(500, "boom")),
            Reply::Fail(EnvError::network("connection reset by peer")),
        ]);
        let err = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.diagnostic, "Network failure: connection reset by peer");
    }

    #[tokio::test]
    async fn test_malformed_primary_triggers_fallback() {
        let mut broken = full_response();
        broken.growth_rates.pop();
        let (orchestrator, _rx) = orchestrator(vec![Reply::Ok(broken), Reply::Ok(full_response())]);

        let fetched = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap();
        assert_eq!(fetched.fidelity, Fidelity::Degraded);
    }

    #[tokio::test]
    async fn test_fallback_strips_history_even_if_sent() {
        let (orchestrator, _rx) = orchestrator(vec![
            Reply::Fail(EnvError::network("refused")),
            Reply::Ok(full_response()),
        ]);
        let fetched = orchestrator
            .run_dynamic_simulation(&DynamicParams::default())
            .await
            .unwrap();
        assert!(!fetched.result.has_flux_history());
    }

    #[tokio::test]
    async fn test_history_not_requested_retry_is_full() {
        let (orchestrator, mut rx) = orchestrator(vec![
            Reply::Fail(EnvError::network("refused")),
            Reply::Ok(full_response()),
        ]);
        let params = DynamicParams {
            include_flux_history: false,
            ..DynamicParams::default()
        };
        let fetched = orchestrator.run_dynamic_simulation(&params).await.unwrap();

        assert_eq!(fetched.fidelity, Fidelity::Full);
        let requests = orchestrator.transport().requests();
        assert!(requests.iter().all(|r| !r.include_flux_history));

        let topics: Vec<_> = drain(&mut rx).into_iter().map(|n| n.topic).collect();
        assert_eq!(topics, vec![NotificationTopic::Retry]);
    }

    #[tokio::test]
    async fn test_health_check_ok() {
        let (orchestrator, mut rx) = orchestrator(vec![]);
        let status = orchestrator.check_health().await.unwrap();
        assert!(status.is_ok());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_params_default_matches_service_defaults() {
        let params = DynamicParams::default();
        let request = params.request(true);
        assert_eq!(request.initial_glucose, 20.0);
        assert_eq!(request.initial_biomass, 0.01);
        assert_eq!(request.total_time, 24.0);
        assert_eq!(request.time_step, 1.0);
        assert!(request.knockouts.is_empty());
    }

    #[test]
    fn test_error_display_carries_diagnostic() {
        let err = SimulationError {
            diagnostic: "Infeasible".to_string(),
            primary: EnvError::Timeout(60_000),
            fallback: EnvError::server(200, "Infeasible"),
        };
        assert_eq!(err.to_string(), "dynamic simulation failed: Infeasible");
    }
}
