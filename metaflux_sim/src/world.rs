//! PlaybackWorld - one playback session wired to simulated collaborators.

use crate::context::SimContext;
use crate::exporter::PlaybackFrame;
use crate::fixtures::{BatchCulture, CultureParams};
use crate::timer::LedgerTimer;
use crate::transport::{FaultPlan, ScriptedTransport};

use metaflux_core::{
    DeadlineTimer, DynamicParams, Fidelity, Notification, Notifier, OrchestratorConfig,
    PlaybackPhase, PlaybackSession, RequestOrchestrator, SimulationError, TimelineConfig,
    TimelineController,
};
use metaflux_env::{DynamicSimulationResponse, PlaybackContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Tick timer used by simulated sessions.
pub type SimTimer = LedgerTimer<DeadlineTimer<SimContext>>;

/// Playback session over simulated collaborators.
pub type SimSession = PlaybackSession<SimContext, ScriptedTransport, SimTimer>;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Wall-clock interval between playback ticks
    pub tick_interval: Duration,

    /// Simulated hours per tick at 1x
    pub base_step: f64,

    /// Budget for each fetch attempt
    pub request_timeout: Duration,

    /// Culture the fake service integrates
    pub culture: CultureParams,

    /// Upper bound of the seeded delay added to every service answer
    pub service_jitter: Duration,

    /// What the fake service does once its script runs out
    pub service_fallback: FaultPlan,
}

impl Default for SimConfig {
    fn default() -> Self {
        let timeline = TimelineConfig::default();
        Self {
            seed: 42,
            tick_interval: timeline.tick_interval,
            base_step: timeline.base_step,
            request_timeout: OrchestratorConfig::default().request_timeout,
            culture: CultureParams::default(),
            service_jitter: Duration::ZERO,
            service_fallback: FaultPlan::Succeed,
        }
    }
}

/// The PlaybackWorld - container for one simulated session.
///
/// Virtual time only moves when the world fires a tick or a collaborator
/// sleeps on the shared [`SimContext`].
pub struct PlaybackWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Fake simulation service
    pub transport: Arc<ScriptedTransport>,

    session: SimSession,
    notifications: mpsc::UnboundedReceiver<Notification>,
    received: Vec<Notification>,
    frames: Vec<PlaybackFrame>,
    tick_count: u64,
}

impl PlaybackWorld {
    /// Creates a world whose service serves the configured culture.
    pub fn new(config: SimConfig, script: Vec<FaultPlan>) -> Self {
        let fixture = BatchCulture::new(config.culture.clone()).simulate();
        Self::with_fixture(config, fixture, script)
    }

    /// Creates a world whose service serves `fixture`.
    pub fn with_fixture(
        config: SimConfig,
        fixture: DynamicSimulationResponse,
        script: Vec<FaultPlan>,
    ) -> Self {
        let context = SimContext::shared(config.seed);
        let transport = Arc::new(
            ScriptedTransport::new(Arc::clone(&context), fixture, script)
                .with_hang_threshold(config.request_timeout)
                .with_jitter(config.service_jitter)
                .with_fallback_plan(config.service_fallback.clone()),
        );

        let (notifier, notifications) = Notifier::channel();
        let orchestrator =
            RequestOrchestrator::new(Arc::clone(&context), Arc::clone(&transport), notifier)
                .with_config(OrchestratorConfig {
                    request_timeout: config.request_timeout,
                });
        let timeline = TimelineController::new(
            TimelineConfig {
                tick_interval: config.tick_interval,
                base_step: config.base_step,
            },
            LedgerTimer::new(DeadlineTimer::new(Arc::clone(&context))),
        );

        Self {
            config,
            context,
            transport,
            session: PlaybackSession::new(orchestrator, timeline),
            notifications,
            received: Vec::new(),
            frames: Vec::new(),
            tick_count: 0,
        }
    }

    /// Request parameters matching the configured culture.
    pub fn params(&self) -> DynamicParams {
        let culture = &self.config.culture;
        DynamicParams {
            initial_glucose: culture.initial_glucose,
            initial_biomass: culture.initial_biomass,
            total_time: culture.total_time,
            time_step: culture.time_step,
            ..DynamicParams::default()
        }
    }

    /// Fetches from the fake service and starts playback.
    pub async fn simulate(&mut self) -> Result<Fidelity, SimulationError> {
        let params = self.params();
        self.session.simulate(&params).await
    }

    pub fn session(&self) -> &SimSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SimSession {
        &mut self.session
    }

    pub fn timeline(&self) -> &TimelineController<SimTimer> {
        self.session.timeline()
    }

    pub fn timeline_mut(&mut self) -> &mut TimelineController<SimTimer> {
        self.session.timeline_mut()
    }

    pub fn timer(&self) -> &SimTimer {
        self.session.timeline().timer()
    }

    /// Jumps the clock to the armed deadline and applies that tick.
    ///
    /// Returns false when no timer is armed.
    pub fn tick(&mut self) -> bool {
        let Some(deadline) = self.timer().inner().next_deadline() else {
            return false;
        };
        self.context.advance_to(deadline);

        let timeline = self.session.timeline_mut();
        let Some(id) = timeline.timer_mut().inner_mut().fire() else {
            return false;
        };
        let moved = timeline.on_tick(id);
        if moved {
            self.tick_count += 1;
            self.frames
                .push(PlaybackFrame::capture(self.context.now(), self.session.timeline()));
        }
        moved
    }

    /// Advances virtual time, applying every tick that falls due.
    ///
    /// Returns the number of ticks applied.
    pub fn advance(&mut self, duration: Duration) -> u64 {
        let target = self.context.now() + duration;
        let mut applied = 0;

        while let Some(deadline) = self.timer().inner().next_deadline() {
            if deadline > target {
                break;
            }
            if self.tick() {
                applied += 1;
            }
        }

        self.context.advance_to(target);
        applied
    }

    /// Ticks until playback leaves `Playing` or `max_ticks` is reached.
    pub fn play_to_end(&mut self, max_ticks: u64) -> u64 {
        let mut applied = 0;
        while applied < max_ticks && self.timeline().phase() == PlaybackPhase::Playing {
            if !self.tick() {
                break;
            }
            applied += 1;
        }
        applied
    }

    /// Every notification raised so far.
    pub fn notifications(&mut self) -> &[Notification] {
        while let Ok(notification) = self.notifications.try_recv() {
            self.received.push(notification);
        }
        &self.received
    }

    /// One frame per applied tick.
    pub fn frames(&self) -> &[PlaybackFrame] {
        &self.frames
    }

    /// Ticks applied since the world was created.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
