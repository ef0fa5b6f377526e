//! Scenario runner - executes deterministic playback scenarios.

use crate::exporter::SimExport;
use crate::fixtures::{BatchCulture, CultureParams};
use crate::scenarios::ScenarioId;
use crate::transport::FaultPlan;
use crate::world::{PlaybackWorld, SimConfig};

use metaflux_core::{
    project, AlertSeverity, DynamicSimulationResult, FetchedResult, Fidelity, NotificationTopic,
    PlaybackPhase, PlaybackSpeed,
};
use metaflux_env::{EnvError, FailureKind, PlaybackContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on ticks when playing a result to the end.
const MAX_TICKS: u64 = 10_000;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Playback ticks applied
    pub ticks: u64,

    /// Requests received by the fake service
    pub requests: usize,

    /// Final virtual clock in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Notifications raised
    pub notifications: usize,

    /// Tick timers armed
    pub timers_armed: u64,

    /// Cancel calls, including repeats
    pub timers_cancelled: u64,

    /// Most tick timers alive at once
    pub max_live_timers: usize,

    /// Toxicity markers on the loaded result
    pub alerts: usize,

    /// Scripted user operations applied
    pub operations: u64,
}

/// Assertion log for one run.
#[derive(Debug, Default)]
struct Observations {
    failures: Vec<String>,
    operations: u64,
}

impl Observations {
    fn expect(&mut self, ok: bool, reason: impl Into<String>) {
        if !ok {
            self.failures.push(reason.into());
        }
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.failures.push(reason.into());
    }

    fn failure_reason(&self) -> Option<String> {
        if self.failures.is_empty() {
            None
        } else {
            Some(self.failures.join("; "))
        }
    }
}

fn topics(world: &mut PlaybackWorld) -> Vec<NotificationTopic> {
    world.notifications().iter().map(|n| n.topic).collect()
}

/// Runs playback scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// World configuration shared by every scenario
    config: SimConfig,

    /// User operations issued by the scrub storm
    storm_operations: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: SimConfig {
                seed,
                ..SimConfig::default()
            },
            storm_operations: 400,
        }
    }

    /// Replaces the world configuration; the runner's seed is kept.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = SimConfig {
            seed: self.seed,
            ..config
        };
        self
    }

    /// Sets the number of scrub storm operations.
    pub fn with_storm_operations(mut self, operations: u64) -> Self {
        self.storm_operations = operations;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_exported(scenario).0
    }

    /// Runs a scenario and also returns its frame export.
    pub fn run_exported(&self, scenario: ScenarioId) -> (ScenarioResult, SimExport) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let runtime = match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                let mut observations = Observations::default();
                observations.fail(format!("could not build runtime: {}", err));
                let world = self.world(Vec::new());
                return self.finish(scenario, world, observations);
            }
        };

        let (world, observations) = runtime.block_on(self.execute(scenario));
        self.finish(scenario, world, observations)
    }

    async fn execute(&self, scenario: ScenarioId) -> (PlaybackWorld, Observations) {
        match scenario {
            ScenarioId::PrimaryTimeout => self.run_primary_timeout().await,
            ScenarioId::TotalOutage => self.run_total_outage().await,
            ScenarioId::ServerDetail => self.run_server_detail().await,
            ScenarioId::MalformedPayload => self.run_malformed_payload().await,
            ScenarioId::HappyPath => self.run_happy_path().await,
            ScenarioId::ScrubStorm => self.run_scrub_storm().await,
            ScenarioId::SpeedCycle => self.run_speed_cycle().await,
            ScenarioId::ToxicityAlignment => self.run_toxicity_alignment().await,
            ScenarioId::LateResultSwap => self.run_late_result_swap().await,
            ScenarioId::SlowPrimary => self.run_slow_primary().await,
            ScenarioId::ServiceDown => self.run_service_down().await,
        }
    }

    fn world(&self, script: Vec<FaultPlan>) -> PlaybackWorld {
        PlaybackWorld::new(self.config.clone(), script)
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        mut world: PlaybackWorld,
        observations: Observations,
    ) -> (ScenarioResult, SimExport) {
        let notifications = world.notifications().to_vec();
        let failure_reason = observations.failure_reason();
        let passed = failure_reason.is_none();

        let timer = world.timer();
        let metrics = ScenarioMetrics {
            notifications: notifications.len(),
            timers_armed: timer.armed(),
            timers_cancelled: timer.cancelled(),
            max_live_timers: timer.max_live(),
            alerts: world.session().alerts().len(),
            operations: observations.operations,
        };

        let mut export = SimExport::new(scenario.name(), self.seed);
        export.fidelity = world.session().fidelity();
        for frame in world.frames() {
            export.add_frame(frame.clone());
        }
        export.notifications = notifications;
        export.finalize(passed, failure_reason.clone());

        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            ticks: world.tick_count(),
            requests: world.transport.request_count(),
            final_time_secs: world.context.now().as_secs_f64(),
            failure_reason,
            metrics,
        };

        if result.passed {
            info!(
                "✓ {} complete: {} ticks, {} requests, {} notifications",
                scenario.name(),
                result.ticks,
                result.requests,
                result.metrics.notifications
            );
        } else {
            warn!(
                "✗ {} failed: {}",
                scenario.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }

        (result, export)
    }

    /// DST-001: PrimaryTimeout - the primary attempt never answers.
    ///
    /// **Assertion**: exactly one retry without flux history, a degraded
    /// result, and the advisory raised before the completion notice.
    async fn run_primary_timeout(&self) -> (PlaybackWorld, Observations) {
        info!("DST-001: PrimaryTimeout - hang past the request budget");
        let mut world = self.world(vec![FaultPlan::Hang]);
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.expect(
                fidelity == Fidelity::Degraded,
                format!("expected a degraded result, got {:?}", fidelity),
            ),
            Err(err) => obs.fail(format!("fallback should have succeeded: {}", err)),
        }

        let requests = world.transport.requests();
        obs.expect(requests.len() == 2, format!("expected 2 requests, saw {}", requests.len()));
        obs.expect(
            requests.first().map_or(false, |r| r.include_flux_history),
            "primary attempt did not ask for flux history",
        );
        obs.expect(
            requests.get(1).map_or(false, |r| !r.include_flux_history),
            "fallback attempt asked for flux history",
        );
        obs.expect(
            world.context.now() >= self.config.request_timeout,
            "primary attempt was abandoned before its deadline",
        );

        let has_history = world
            .timeline()
            .result()
            .map_or(true, |result| result.has_flux_history());
        obs.expect(!has_history, "degraded result kept its flux history");

        let seen = topics(&mut world);
        obs.expect(
            seen == [NotificationTopic::Retry, NotificationTopic::DegradedResult],
            format!("unexpected notifications {:?}", seen),
        );

        world.play_to_end(MAX_TICKS);
        obs.expect(
            world.session().snapshot().map_or(false, |s| s.fluxes.is_none()),
            "snapshot carries fluxes after a degraded fetch",
        );

        (world, obs)
    }

    /// DST-002: TotalOutage - both attempts are refused.
    ///
    /// **Assertion**: one terminal error, no third request, nothing loaded.
    async fn run_total_outage(&self) -> (PlaybackWorld, Observations) {
        info!("DST-002: TotalOutage - connection refused twice");
        // The service refuses everything, so a third attempt would be visible
        let config = SimConfig {
            service_fallback: FaultPlan::Refuse,
            ..self.config.clone()
        };
        let mut world = PlaybackWorld::new(config, Vec::new());
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.fail(format!("expected a terminal error, got a {:?} result", fidelity)),
            Err(err) => {
                obs.expect(
                    err.primary.kind() == FailureKind::Network,
                    format!("primary failure misclassified: {}", err.primary),
                );
                obs.expect(
                    err.diagnostic.contains("connection refused"),
                    format!("diagnostic `{}` lost the transport message", err.diagnostic),
                );
            }
        }

        let requests = world.transport.request_count();
        obs.expect(requests == 2, format!("expected 2 requests, saw {}", requests));
        obs.expect(
            world.timeline().phase() == PlaybackPhase::Stopped,
            "timeline left Stopped without a result",
        );

        let seen = topics(&mut world);
        obs.expect(
            seen == [NotificationTopic::Retry, NotificationTopic::FetchFailed],
            format!("unexpected notifications {:?}", seen),
        );

        (world, obs)
    }

    /// DST-003: ServerDetail - the service explains both failures.
    ///
    /// **Assertion**: the fallback's detail message is the diagnostic.
    async fn run_server_detail(&self) -> (PlaybackWorld, Observations) {
        const DETAIL: &str = "Model 'e_coli_core' did not reach an optimal solution";

        info!("DST-003: ServerDetail - detail message surfaces");
        let mut world = self.world(vec![
            FaultPlan::server_error(503, "Service warming up"),
            FaultPlan::server_error(500, DETAIL),
        ]);
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.fail(format!("expected a terminal error, got a {:?} result", fidelity)),
            Err(err) => {
                obs.expect(
                    err.diagnostic == DETAIL,
                    format!("diagnostic `{}` is not the server detail", err.diagnostic),
                );
                obs.expect(
                    err.primary == EnvError::server(503, "Service warming up"),
                    format!("primary failure recorded as {}", err.primary),
                );
            }
        }

        let last = world.notifications().last().cloned();
        obs.expect(
            last.map_or(false, |n| {
                n.topic == NotificationTopic::FetchFailed && n.message.contains(DETAIL)
            }),
            "failure notification does not carry the server detail",
        );

        (world, obs)
    }

    /// DST-004: MalformedPayload - the primary body fails validation.
    ///
    /// **Assertion**: validation failure triggers the same fallback as a
    /// transport failure.
    async fn run_malformed_payload(&self) -> (PlaybackWorld, Observations) {
        info!("DST-004: MalformedPayload - series length mismatch");
        let mut world = self.world(vec![FaultPlan::Malformed]);
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.expect(
                fidelity == Fidelity::Degraded,
                format!("expected a degraded result, got {:?}", fidelity),
            ),
            Err(err) => obs.fail(format!("fallback should have succeeded: {}", err)),
        }

        let requests = world.transport.request_count();
        obs.expect(requests == 2, format!("expected 2 requests, saw {}", requests));

        let expected = BatchCulture::new(self.config.culture.clone()).simulate().time.len();
        let loaded = world.timeline().result().map_or(0, |r| r.len());
        obs.expect(
            loaded == expected,
            format!("loaded {} samples, fixture has {}", loaded, expected),
        );

        (world, obs)
    }

    /// DST-005: HappyPath - full fetch played to the end.
    ///
    /// **Assertion**: one request, flux history kept, one tick per base
    /// step, cursor parked on the horizon.
    async fn run_happy_path(&self) -> (PlaybackWorld, Observations) {
        info!("DST-005: HappyPath - full-fidelity playback");
        let mut world = self.world(Vec::new());
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.expect(
                fidelity == Fidelity::Full,
                format!("expected a full result, got {:?}", fidelity),
            ),
            Err(err) => {
                obs.fail(format!("simulation failed: {}", err));
                return (world, obs);
            }
        }

        let requests = world.transport.request_count();
        obs.expect(requests == 1, format!("expected 1 request, saw {}", requests));
        obs.expect(
            world.timeline().result().map_or(false, |r| r.has_flux_history()),
            "full result lost its flux history",
        );
        let seen = topics(&mut world);
        obs.expect(
            !seen.iter().any(|t| {
                matches!(
                    t,
                    NotificationTopic::Retry | NotificationTopic::DegradedResult | NotificationTopic::FetchFailed
                )
            }),
            format!("unexpected fetch notifications {:?}", seen),
        );

        let total = world.timeline().total_time();
        let expected_ticks = (total / self.config.base_step).ceil() as u64;
        let applied = world.play_to_end(MAX_TICKS);

        obs.expect(
            applied == expected_ticks,
            format!("expected {} ticks, applied {}", expected_ticks, applied),
        );
        obs.expect(
            world.timeline().phase() == PlaybackPhase::Ended,
            format!("playback finished in {:?}", world.timeline().phase()),
        );
        obs.expect(
            world.timeline().state().current_time == total,
            "cursor did not stop on the horizon",
        );

        let last_index = world.timeline().result().map(|r| r.len().saturating_sub(1));
        obs.expect(
            world.session().snapshot().map(|s| s.index) == last_index,
            "final snapshot is not the last sample",
        );
        obs.expect(world.timer().live() == 0, "tick timer still armed after the end");
        obs.expect(world.timer().max_live() <= 1, "more than one tick timer was alive");

        (world, obs)
    }

    /// DST-006: ScrubStorm - seeded random user input.
    ///
    /// Tests the timeline state machine under a seeded mix of seeks (NaN and
    /// out of range included), play, pause, toggle, speed changes and
    /// clock advances.
    ///
    /// **Assertion**: after every operation at most one timer is alive, the
    /// cursor is within the horizon and the phase agrees with `is_playing`.
    async fn run_scrub_storm(&self) -> (PlaybackWorld, Observations) {
        info!("DST-006: ScrubStorm - {} operations", self.storm_operations);
        let mut world = self.world(Vec::new());
        let mut obs = Observations::default();

        if let Err(err) = world.simulate().await {
            obs.fail(format!("simulation failed: {}", err));
            return (world, obs);
        }

        let ctx = Arc::clone(&world.context);
        let total = world.timeline().total_time();
        let samples = world.timeline().result().map_or(0, |r| r.len());

        for op in 0..self.storm_operations {
            match ctx.random_below(7) {
                0 => world.timeline_mut().seek(ctx.random_range(-2.0, total + 2.0)),
                1 => {
                    world.timeline_mut().play();
                }
                2 => {
                    world.timeline_mut().pause();
                }
                3 => {
                    world.timeline_mut().toggle();
                }
                4 => {
                    world.timeline_mut().cycle_speed();
                }
                5 => {
                    world.advance(Duration::from_millis(ctx.random_below(1500)));
                }
                _ => {
                    let edge = if ctx.random_below(2) == 0 { f64::NAN } else { total };
                    world.timeline_mut().seek(edge);
                }
            }
            obs.operations += 1;

            if let Some(violation) = storm_violation(&world, total, samples) {
                obs.fail(format!("operation {}: {}", op, violation));
                break;
            }

            if op % 100 == 0 {
                debug!(
                    "  op={} | t={:.2} | phase={:?} | speed={}",
                    op,
                    world.timeline().state().current_time,
                    world.timeline().phase(),
                    world.timeline().state().speed
                );
            }
        }

        obs.expect(world.timer().max_live() <= 1, "more than one tick timer was alive");
        (world, obs)
    }

    /// DST-007: SpeedCycle - multiplier order and tick phase.
    ///
    /// **Assertion**: speeds cycle 1 -> 2 -> 5 -> 10 -> 1, each tick advances
    /// by `base_step * speed`, and a speed change between ticks does not
    /// move the next tick deadline.
    async fn run_speed_cycle(&self) -> (PlaybackWorld, Observations) {
        info!("DST-007: SpeedCycle - multipliers and phase");
        let mut world = self.world(Vec::new());
        let mut obs = Observations::default();

        if let Err(err) = world.simulate().await {
            obs.fail(format!("simulation failed: {}", err));
            return (world, obs);
        }
        world.timeline_mut().pause();

        let cycled: Vec<PlaybackSpeed> = (0..4).map(|_| world.timeline_mut().cycle_speed()).collect();
        obs.expect(
            cycled == [PlaybackSpeed::X2, PlaybackSpeed::X5, PlaybackSpeed::X10, PlaybackSpeed::X1],
            format!("speed cycle went {:?}", cycled),
        );

        let base = self.config.base_step;
        for speed in PlaybackSpeed::ALL {
            while world.timeline().state().speed != speed {
                world.timeline_mut().cycle_speed();
            }
            world.timeline_mut().seek(0.0);
            world.timeline_mut().play();
            world.tick();

            let moved = world.timeline().state().current_time;
            let expected = base * speed.multiplier() as f64;
            obs.expect(
                (moved - expected).abs() < 1e-9,
                format!("one tick at {} moved {} hours, expected {}", speed, moved, expected),
            );
            world.timeline_mut().pause();
        }

        // Back to 1x, then change speed halfway between ticks
        world.timeline_mut().cycle_speed();
        world.timeline_mut().seek(0.0);
        world.timeline_mut().play();

        let half = self.config.tick_interval / 2;
        let before = world.advance(half);
        world.timeline_mut().cycle_speed();
        let after = world.advance(half);

        obs.expect(
            before == 0 && after == 1,
            format!("speed change shifted the tick phase ({} then {} ticks)", before, after),
        );
        let expected = base * PlaybackSpeed::X2.multiplier() as f64;
        obs.expect(
            (world.timeline().state().current_time - expected).abs() < 1e-9,
            "tick after the speed change did not use the new speed",
        );

        (world, obs)
    }

    /// DST-008: ToxicityAlignment - markers share samples with the cursor.
    ///
    /// Uses a rich culture with a fine step, so alert times land slightly
    /// off the rounded time axis.
    ///
    /// **Assertion**: every marker resolves to the same ceiling sample the
    /// projector picks for the event time, and only the first is critical.
    async fn run_toxicity_alignment(&self) -> (PlaybackWorld, Observations) {
        info!("DST-008: ToxicityAlignment - alerts against the time axis");
        let mut config = self.config.clone();
        config.culture = CultureParams {
            initial_glucose: 400.0,
            time_step: 0.1,
            ..config.culture.clone()
        };
        let mut world = PlaybackWorld::new(config, Vec::new());
        let mut obs = Observations::default();

        if let Err(err) = world.simulate().await {
            obs.fail(format!("simulation failed: {}", err));
            return (world, obs);
        }
        let Some(result) = world.timeline().result().cloned() else {
            obs.fail("no result loaded");
            return (world, obs);
        };

        let markers = world.session().alerts().markers().to_vec();
        obs.expect(!markers.is_empty(), "rich culture produced no toxicity alerts");

        for (rank, marker) in markers.iter().enumerate() {
            let projected = project(&result, marker.event.time).map(|s| s.index);
            obs.expect(
                marker.sample_index == projected,
                format!(
                    "alert at t={} on sample {:?}, cursor projects to {:?}",
                    marker.event.time, marker.sample_index, projected
                ),
            );

            if let Some(i) = marker.sample_index {
                obs.expect(
                    marker.biomass == Some(result.biomass()[i]),
                    format!("alert at t={} annotated with the wrong biomass", marker.event.time),
                );
                obs.expect(
                    result.time()[i] >= marker.event.time || i + 1 == result.len(),
                    format!("alert at t={} placed before its sample", marker.event.time),
                );
            }

            let expected = if rank == 0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Passive
            };
            obs.expect(
                marker.severity == expected,
                format!("marker {} is {:?}", rank, marker.severity),
            );
        }
        obs.expect(
            markers.windows(2).all(|w| w[0].event.time <= w[1].event.time),
            "markers are not chronological",
        );

        let toxicity = topics(&mut world)
            .into_iter()
            .filter(|t| *t == NotificationTopic::Toxicity)
            .count();
        obs.expect(toxicity == 1, format!("{} toxicity notifications raised", toxicity));

        if let Some(first) = markers.first() {
            world.timeline_mut().seek(first.event.time);
            obs.expect(
                world.session().snapshot().map(|s| s.index) == first.sample_index,
                "cursor on the first alert shows a different sample",
            );
            obs.expect(
                world
                    .session()
                    .alerts_near_cursor(0.0)
                    .iter()
                    .any(|m| m.severity == AlertSeverity::Critical),
                "first alert not found at the cursor",
            );
        }

        let off_axis = markers
            .iter()
            .filter(|m| !result.time().contains(&m.event.time))
            .count();
        debug!("  {} of {} alerts fall between samples", off_axis, markers.len());

        (world, obs)
    }

    /// DST-009: LateResultSwap - a new result arrives mid-playback.
    ///
    /// **Assertion**: the cursor resets, the old timer is gone and a tick
    /// carrying its id changes nothing; a model change stops everything.
    async fn run_late_result_swap(&self) -> (PlaybackWorld, Observations) {
        info!("DST-009: LateResultSwap - replace a playing result");
        let mut world = self.world(Vec::new());
        let mut obs = Observations::default();

        if let Err(err) = world.simulate().await {
            obs.fail(format!("simulation failed: {}", err));
            return (world, obs);
        }

        let interval = self.config.tick_interval;
        world.advance(interval * 2 + interval / 2);
        let stale = world.timeline().active_timer();
        obs.expect(
            world.timeline().state().current_time > 0.0,
            "cursor did not move before the swap",
        );

        let replacement = BatchCulture::new(CultureParams {
            initial_glucose: 40.0,
            ..self.config.culture.clone()
        })
        .simulate();
        let result = match DynamicSimulationResult::from_response(replacement) {
            Ok(result) => result,
            Err(err) => {
                obs.fail(format!("replacement fixture rejected: {}", err));
                return (world, obs);
            }
        };
        let total = world.timeline().total_time();
        world.session_mut().accept(
            FetchedResult {
                result: Arc::new(result),
                fidelity: Fidelity::Full,
            },
            total,
        );

        obs.expect(world.timeline().state().current_time == 0.0, "cursor not reset by the new result");
        obs.expect(world.timeline().phase() == PlaybackPhase::Playing, "new result is not playing");
        obs.expect(world.timeline().active_timer() != stale, "old timer survived the swap");
        obs.expect(world.timer().live() == 1, format!("{} live timers after swap", world.timer().live()));

        if let Some(stale) = stale {
            let applied = world.timeline_mut().on_tick(stale);
            obs.expect(!applied, "tick from the previous result was applied");
            obs.expect(
                world.timeline().state().current_time == 0.0,
                "stale tick moved the cursor",
            );
        }

        world.advance(interval);
        obs.expect(
            (world.timeline().state().current_time - self.config.base_step).abs() < 1e-9,
            "playback of the new result did not advance",
        );

        world.session_mut().reset_for_model_change();
        obs.expect(world.timeline().phase() == PlaybackPhase::Stopped, "model change did not stop playback");
        obs.expect(world.timer().live() == 0, "timer alive after model change");
        obs.expect(!world.tick(), "tick fired after model change");
        obs.expect(world.session().snapshot().is_none(), "snapshot available after model change");
        obs.expect(world.timer().max_live() <= 1, "more than one tick timer was alive");

        (world, obs)
    }

    /// DST-010: SlowPrimary - the primary answers inside its budget.
    ///
    /// **Assertion**: no retry, no notification, full fidelity.
    async fn run_slow_primary(&self) -> (PlaybackWorld, Observations) {
        info!("DST-010: SlowPrimary - answer one second before the deadline");
        let latency = self.config.request_timeout.saturating_sub(Duration::from_secs(1));
        let mut world = self.world(vec![FaultPlan::Latency(latency)]);
        let mut obs = Observations::default();

        match world.simulate().await {
            Ok(fidelity) => obs.expect(
                fidelity == Fidelity::Full,
                format!("expected a full result, got {:?}", fidelity),
            ),
            Err(err) => obs.fail(format!("simulation failed: {}", err)),
        }

        let requests = world.transport.request_count();
        obs.expect(requests == 1, format!("expected 1 request, saw {}", requests));
        obs.expect(world.context.now() == latency, "clock does not reflect the service latency");
        obs.expect(world.notifications().is_empty(), "slow success raised a notification");

        (world, obs)
    }

    /// DST-011: ServiceDown - health probes against a dead service.
    ///
    /// **Assertion**: a failed probe raises exactly one notification; a
    /// recovered service raises none.
    async fn run_service_down(&self) -> (PlaybackWorld, Observations) {
        info!("DST-011: ServiceDown - health probe");
        let mut world = self.world(Vec::new());
        let mut obs = Observations::default();

        world.transport.set_healthy(false);
        let down = world.session().orchestrator().check_health().await;
        obs.expect(down.is_err(), "probe against a dead service succeeded");

        world.transport.set_healthy(true);
        let up = world.session().orchestrator().check_health().await;
        obs.expect(up.is_ok(), "probe against a live service failed");

        let seen = topics(&mut world);
        obs.expect(
            seen == [NotificationTopic::ServiceUnreachable],
            format!("unexpected notifications {:?}", seen),
        );
        obs.expect(world.transport.request_count() == 0, "health probe issued a simulation request");

        (world, obs)
    }
}

fn storm_violation(world: &PlaybackWorld, total: f64, samples: usize) -> Option<String> {
    let timeline = world.timeline();
    let state = timeline.state();
    let phase = timeline.phase();
    let live = world.timer().live();

    if live > 1 {
        return Some(format!("{} live tick timers", live));
    }
    if !(0.0..=total).contains(&state.current_time) {
        return Some(format!("cursor {} outside [0, {}]", state.current_time, total));
    }
    if (phase == PlaybackPhase::Playing) != state.is_playing {
        return Some(format!("phase {:?} with is_playing={}", phase, state.is_playing));
    }
    if (phase == PlaybackPhase::Playing) != (live == 1) {
        return Some(format!("phase {:?} with {} live timers", phase, live));
    }
    if phase == PlaybackPhase::Ended && state.current_time != total {
        return Some(format!("ended with cursor at {}", state.current_time));
    }
    match timeline.snapshot() {
        Some(snapshot) if snapshot.index >= samples => {
            Some(format!("snapshot index {} beyond {} samples", snapshot.index, samples))
        }
        None if samples > 0 => Some("no snapshot for a loaded result".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_timeout_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::PrimaryTimeout);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.requests, 2);
        assert!(result.final_time_secs >= 60.0);
    }

    #[test]
    fn test_total_outage_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::TotalOutage);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.requests, 2);
        assert_eq!(result.ticks, 0);
    }

    #[test]
    fn test_happy_path_scenario() {
        let (result, export) = ScenarioRunner::new(42).run_exported(ScenarioId::HappyPath);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.ticks, 48);
        assert_eq!(result.metrics.max_live_timers, 1);
        assert_eq!(export.frames.len(), 48);
        assert_eq!(export.duration_ms(), 24_000);
        assert_eq!(export.fidelity, Some(Fidelity::Full));
        assert!(export.passed);
    }

    #[test]
    fn test_every_scenario_passes() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_scrub_storm_across_seeds() {
        for seed in 0..8 {
            let result = ScenarioRunner::new(seed).run(ScenarioId::ScrubStorm);
            assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
            assert_eq!(result.metrics.operations, 400);
            assert!(result.metrics.max_live_timers <= 1);
        }
    }

    #[test]
    fn test_scrub_storm_deterministic() {
        let first = ScenarioRunner::new(7).run(ScenarioId::ScrubStorm);
        let second = ScenarioRunner::new(7).run(ScenarioId::ScrubStorm);

        assert_eq!(first.ticks, second.ticks);
        assert_eq!(first.metrics.timers_armed, second.metrics.timers_armed);
        assert_eq!(first.final_time_secs, second.final_time_secs);
    }

    #[test]
    fn test_toxicity_alignment_has_alerts() {
        let result = ScenarioRunner::new(42).run(ScenarioId::ToxicityAlignment);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.alerts > 0);
    }

    #[test]
    fn test_short_timeout_config() {
        let config = SimConfig {
            request_timeout: Duration::from_secs(5),
            ..SimConfig::default()
        };
        let runner = ScenarioRunner::new(42).with_config(config);

        let result = runner.run(ScenarioId::PrimaryTimeout);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.final_time_secs >= 5.0 && result.final_time_secs < 60.0);
    }
}
