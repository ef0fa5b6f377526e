//! Simulated simulation service with per-attempt fault injection.

use crate::context::SimContext;
use async_trait::async_trait;
use metaflux_env::{
    DynamicSimulationRequest, DynamicSimulationResponse, EnvError, HealthStatus, PlaybackContext,
    SimulationTransport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the fake service does with one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultPlan {
    /// Answer immediately with the fixture
    Succeed,
    /// Answer with the fixture after a virtual delay
    Latency(Duration),
    /// Never answer
    Hang,
    /// Connection refused
    Refuse,
    /// Non-success status with a detail message
    ServerError { status: u16, detail: String },
    /// Answer with a body whose series lengths disagree
    Malformed,
}

impl FaultPlan {
    pub fn server_error(status: u16, detail: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            detail: detail.into(),
        }
    }
}

/// Scripted stand-in for the remote simulation service.
///
/// Plans are consumed one per request in order; once the script runs out
/// every further request uses the fallback plan. Latencies at or beyond the
/// hang threshold never answer, so a racing timeout always wins.
pub struct ScriptedTransport {
    context: Arc<SimContext>,
    fixture: DynamicSimulationResponse,
    script: Mutex<VecDeque<FaultPlan>>,
    fallback_plan: FaultPlan,
    hang_threshold: Duration,
    jitter: Duration,
    healthy: Mutex<bool>,
    requests: Mutex<Vec<DynamicSimulationRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport serving `fixture` according to `script`.
    pub fn new(
        context: Arc<SimContext>,
        fixture: DynamicSimulationResponse,
        script: Vec<FaultPlan>,
    ) -> Self {
        Self {
            context,
            fixture,
            script: Mutex::new(script.into()),
            fallback_plan: FaultPlan::Succeed,
            hang_threshold: Duration::from_secs(60),
            jitter: Duration::ZERO,
            healthy: Mutex::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plan used once the script is exhausted (default: `Succeed`).
    pub fn with_fallback_plan(mut self, plan: FaultPlan) -> Self {
        self.fallback_plan = plan;
        self
    }

    /// Latency at or beyond which a request hangs (default: 60s).
    pub fn with_hang_threshold(mut self, threshold: Duration) -> Self {
        self.hang_threshold = threshold;
        self
    }

    /// Adds a seeded random delay in `[0, jitter)` to every answer.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Switches the health endpoint between `ok` and refused.
    pub fn set_healthy(&self, healthy: bool) {
        *lock(&self.healthy) = healthy;
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<DynamicSimulationRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_plan(&self) -> FaultPlan {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback_plan.clone())
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let extra = self.context.random_below(self.jitter.as_millis() as u64);
        delay + Duration::from_millis(extra)
    }

    fn answer(&self, request: &DynamicSimulationRequest) -> DynamicSimulationResponse {
        let mut response = self.fixture.clone();
        if !request.include_flux_history {
            response.flux_history = None;
        }
        response
    }
}

#[async_trait]
impl SimulationTransport for ScriptedTransport {
    async fn simulate_dynamic(
        &self,
        request: DynamicSimulationRequest,
    ) -> Result<DynamicSimulationResponse, EnvError> {
        lock(&self.requests).push(request.clone());
        let plan = self.next_plan();
        debug!(
            attempt = self.request_count(),
            history = request.include_flux_history,
            ?plan,
            "scripted request"
        );

        let delay = match &plan {
            FaultPlan::Latency(latency) => self.jittered(*latency),
            _ => self.jittered(Duration::ZERO),
        };
        if plan == FaultPlan::Hang || delay >= self.hang_threshold {
            return std::future::pending().await;
        }
        self.context.sleep(delay).await;

        match plan {
            FaultPlan::Succeed | FaultPlan::Latency(_) => Ok(self.answer(&request)),
            FaultPlan::Refuse => Err(EnvError::network("connection refused")),
            FaultPlan::ServerError { status, detail } => Err(EnvError::server(status, detail)),
            FaultPlan::Malformed => {
                let mut response = self.answer(&request);
                response.biomass.push(0.0);
                Ok(response)
            }
            FaultPlan::Hang => std::future::pending().await,
        }
    }

    async fn health(&self) -> Result<HealthStatus, EnvError> {
        if *lock(&self.healthy) {
            Ok(HealthStatus {
                status: "ok".to_string(),
            })
        } else {
            Err(EnvError::network("connection refused"))
        }
    }

    fn endpoint(&self) -> String {
        format!("sim://seed-{}", self.context.seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fixture() -> DynamicSimulationResponse {
        DynamicSimulationResponse {
            time: vec![0.0, 1.0],
            biomass: vec![0.01, 0.02],
            glucose: vec![20.0, 19.0],
            growth_rates: vec![0.5, 0.5],
            byproducts: BTreeMap::new(),
            flux_history: Some(vec![BTreeMap::new(), BTreeMap::new()]),
            toxicity_alerts: Vec::new(),
        }
    }

    fn request(include_flux_history: bool) -> DynamicSimulationRequest {
        DynamicSimulationRequest {
            model_id: "e_coli_core".to_string(),
            initial_glucose: 20.0,
            initial_biomass: 0.01,
            total_time: 1.0,
            time_step: 1.0,
            knockouts: Vec::new(),
            include_flux_history,
        }
    }

    #[tokio::test]
    async fn test_script_is_consumed_in_order() {
        let ctx = SimContext::shared(1);
        let transport = ScriptedTransport::new(
            ctx,
            fixture(),
            vec![FaultPlan::Refuse, FaultPlan::server_error(500, "Model not optimal")],
        );

        let first = transport.simulate_dynamic(request(true)).await.unwrap_err();
        let second = transport.simulate_dynamic(request(false)).await.unwrap_err();
        let third = transport.simulate_dynamic(request(false)).await;

        assert_eq!(first, EnvError::network("connection refused"));
        assert_eq!(second, EnvError::server(500, "Model not optimal"));
        assert!(third.is_ok());
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_history_stripped_when_not_requested() {
        let transport = ScriptedTransport::new(SimContext::shared(1), fixture(), Vec::new());

        let full = transport.simulate_dynamic(request(true)).await.unwrap();
        let lean = transport.simulate_dynamic(request(false)).await.unwrap();

        assert!(full.flux_history.is_some());
        assert!(lean.flux_history.is_none());
        assert!(!transport.requests()[1].include_flux_history);
    }

    #[tokio::test]
    async fn test_latency_advances_virtual_clock() {
        let ctx = SimContext::shared(1);
        let transport = ScriptedTransport::new(
            Arc::clone(&ctx),
            fixture(),
            vec![FaultPlan::Latency(Duration::from_secs(5))],
        );

        transport.simulate_dynamic(request(true)).await.unwrap();
        assert_eq!(ctx.now(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_latency_past_threshold_hangs() {
        let ctx = SimContext::shared(1);
        let transport = ScriptedTransport::new(
            Arc::clone(&ctx),
            fixture(),
            vec![FaultPlan::Latency(Duration::from_secs(90))],
        );

        let call = transport.simulate_dynamic(request(true));
        tokio::select! {
            biased;
            _ = call => panic!("request past the hang threshold answered"),
            _ = tokio::task::yield_now() => {}
        }
        assert_eq!(ctx.now(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_malformed_breaks_series_lengths() {
        let transport =
            ScriptedTransport::new(SimContext::shared(1), fixture(), vec![FaultPlan::Malformed]);
        let response = transport.simulate_dynamic(request(true)).await.unwrap();
        assert_ne!(response.biomass.len(), response.time.len());
    }

    #[tokio::test]
    async fn test_health_toggle() {
        let transport = ScriptedTransport::new(SimContext::shared(1), fixture(), Vec::new());
        assert!(transport.health().await.unwrap().is_ok());

        transport.set_healthy(false);
        assert!(transport.health().await.is_err());
    }
}
