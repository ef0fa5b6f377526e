//! The timeline controller - a virtual clock over a simulation result.
//!
//! Owns the playback cursor, the play/pause state and the speed multiplier,
//! and is the only writer of [`PlaybackState`]. Ticks are delivered from
//! outside through [`TimelineController::on_tick`]; the controller arms and
//! cancels them through a [`TickTimer`].
//!
//! # State machine
//!
//! ```text
//!            load()                 pause()
//! Stopped ──────────► Playing ◄──────────────► Paused
//!    ▲                  │  ▲       play()        ▲
//!    │ clear()     tick │  │ play() (rewind)     │ seek(< total)
//!    │       ≥ total    ▼  │                     │
//!    └──────────────── Ended ────────────────────┘
//! ```
//!
//! At most one timer is armed at any moment: every transition that arms a
//! timer cancels the previous one first, and ticks carrying a stale
//! [`TimerId`] are ignored.

use crate::projector::{self, Snapshot};
use crate::result::DynamicSimulationResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    #[default]
    X1,
    X2,
    X5,
    X10,
}

impl PlaybackSpeed {
    /// All speeds in cycling order.
    pub const ALL: [PlaybackSpeed; 4] = [Self::X1, Self::X2, Self::X5, Self::X10];

    /// Returns the multiplier applied to the base step.
    pub fn multiplier(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X5 => 5,
            Self::X10 => 10,
        }
    }

    /// Returns the next speed, wrapping from 10x back to 1x.
    pub fn next(self) -> Self {
        match self {
            Self::X1 => Self::X2,
            Self::X2 => Self::X5,
            Self::X5 => Self::X10,
            Self::X10 => Self::X1,
        }
    }

    /// Parses a multiplier (1, 2, 5 or 10).
    pub fn from_multiplier(multiplier: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.multiplier() == multiplier)
    }
}

impl std::fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

/// Session-scoped playback state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PlaybackState {
    /// Cursor in simulated hours, within `[0, total_time]`
    pub current_time: f64,
    pub is_playing: bool,
    pub speed: PlaybackSpeed,
}

/// Coarse playback phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No result loaded
    Stopped,
    Playing,
    Paused,
    /// Cursor reached the end of the horizon
    Ended,
}

/// Handle identifying one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Source of periodic ticks.
///
/// `cancel` is called with ids that may already be cancelled and must
/// tolerate that.
pub trait TickTimer {
    /// Arms a periodic timer and returns its id.
    fn arm(&mut self, interval: Duration) -> TimerId;

    /// Cancels the timer with the given id.
    fn cancel(&mut self, id: TimerId);
}

/// Tick loop parameters.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Wall-clock interval between ticks (default: 500ms)
    pub tick_interval: Duration,

    /// Simulated hours advanced per tick at 1x (default: 0.5)
    pub base_step: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            base_step: 0.5,
        }
    }
}

/// Playback controller over one [`DynamicSimulationResult`].
pub struct TimelineController<T: TickTimer> {
    config: TimelineConfig,
    timer: T,
    active_timer: Option<TimerId>,
    result: Option<Arc<DynamicSimulationResult>>,
    total_time: f64,
    state: PlaybackState,
    phase: PlaybackPhase,
}

fn sanitize_horizon(total_time: f64) -> f64 {
    if total_time.is_finite() && total_time > 0.0 {
        total_time
    } else {
        0.0
    }
}

impl<T: TickTimer> TimelineController<T> {
    /// Creates a stopped controller.
    pub fn new(config: TimelineConfig, timer: T) -> Self {
        Self {
            config,
            timer,
            active_timer: None,
            result: None,
            total_time: 0.0,
            state: PlaybackState::default(),
            phase: PlaybackPhase::Stopped,
        }
    }

    /// Accepts a new result and starts playing it from the beginning.
    ///
    /// Any timer tied to the previous result is cancelled. The speed is kept.
    pub fn load(&mut self, result: Arc<DynamicSimulationResult>, total_time: f64) {
        self.cancel_loop();

        info!(
            samples = result.len(),
            total_time,
            history = result.has_flux_history(),
            "timeline loaded new result"
        );

        self.result = Some(result);
        self.total_time = sanitize_horizon(total_time);
        self.state.current_time = 0.0;
        self.state.is_playing = true;
        self.phase = PlaybackPhase::Playing;
        self.start_loop();
    }

    /// Resumes playback. Returns false when not applicable.
    ///
    /// From `Ended` (or paused at the very end) the cursor rewinds to 0.
    pub fn play(&mut self) -> bool {
        match self.phase {
            PlaybackPhase::Paused | PlaybackPhase::Ended => {}
            PlaybackPhase::Stopped | PlaybackPhase::Playing => return false,
        }

        if self.phase == PlaybackPhase::Ended || self.state.current_time >= self.total_time {
            self.state.current_time = 0.0;
        }

        self.state.is_playing = true;
        self.phase = PlaybackPhase::Playing;
        self.start_loop();
        true
    }

    /// Pauses playback. Returns false unless currently playing.
    pub fn pause(&mut self) -> bool {
        if self.phase != PlaybackPhase::Playing {
            return false;
        }
        self.cancel_loop();
        self.state.is_playing = false;
        self.phase = PlaybackPhase::Paused;
        true
    }

    /// Pauses when playing, plays otherwise.
    pub fn toggle(&mut self) -> bool {
        if self.phase == PlaybackPhase::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Moves the cursor, clamped to `[0, total_time]`.
    ///
    /// Does not change `is_playing`. Reaching the end while playing ends
    /// playback; moving back from `Ended` leaves the timeline paused.
    pub fn seek(&mut self, t: f64) {
        let target = if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, self.total_time)
        };
        self.state.current_time = target;

        match self.phase {
            PlaybackPhase::Playing if target >= self.total_time => self.end(),
            PlaybackPhase::Ended if target < self.total_time => {
                self.phase = PlaybackPhase::Paused;
            }
            _ => {}
        }
        debug!(target, phase = ?self.phase, "seek");
    }

    /// Advances to the next speed; applies from the next tick on.
    pub fn cycle_speed(&mut self) -> PlaybackSpeed {
        self.state.speed = self.state.speed.next();
        debug!(speed = %self.state.speed, "speed changed");
        self.state.speed
    }

    /// Replaces the horizon and re-clamps the cursor.
    pub fn set_total_time(&mut self, total_time: f64) {
        self.total_time = sanitize_horizon(total_time);
        if self.state.current_time > self.total_time {
            self.state.current_time = self.total_time;
        }

        match self.phase {
            PlaybackPhase::Playing if self.state.current_time >= self.total_time => self.end(),
            PlaybackPhase::Playing => self.start_loop(),
            PlaybackPhase::Ended if self.state.current_time < self.total_time => {
                self.phase = PlaybackPhase::Paused;
            }
            _ => {}
        }
    }

    /// Drops the result (model or mode change) and stops.
    pub fn clear(&mut self) {
        self.cancel_loop();
        self.result = None;
        self.total_time = 0.0;
        self.state.current_time = 0.0;
        self.state.is_playing = false;
        self.phase = PlaybackPhase::Stopped;
    }

    /// Applies one tick from timer `id`. Returns true if the cursor moved.
    pub fn on_tick(&mut self, id: TimerId) -> bool {
        if self.active_timer != Some(id) || self.phase != PlaybackPhase::Playing {
            debug!(timer = id.0, "ignoring stale tick");
            return false;
        }

        let next = self.state.current_time
            + self.config.base_step * self.state.speed.multiplier() as f64;

        if next >= self.total_time {
            self.end();
        } else {
            self.state.current_time = next;
        }
        true
    }

    fn end(&mut self) {
        self.cancel_loop();
        self.state.current_time = self.total_time;
        self.state.is_playing = false;
        self.phase = PlaybackPhase::Ended;
        debug!(total_time = self.total_time, "playback ended");
    }

    fn start_loop(&mut self) {
        self.cancel_loop();
        let id = self.timer.arm(self.config.tick_interval);
        debug!(timer = id.0, "tick timer armed");
        self.active_timer = Some(id);
    }

    fn cancel_loop(&mut self) {
        if let Some(id) = self.active_timer.take() {
            self.timer.cancel(id);
            debug!(timer = id.0, "tick timer cancelled");
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn result(&self) -> Option<&Arc<DynamicSimulationResult>> {
        self.result.as_ref()
    }

    /// Id of the armed timer, if the tick loop is running.
    pub fn active_timer(&self) -> Option<TimerId> {
        self.active_timer
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Cursor position as a fraction of the horizon, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_time <= 0.0 {
            return 0.0;
        }
        (self.state.current_time / self.total_time).clamp(0.0, 1.0)
    }

    /// Projects the current cursor onto the loaded result.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.result
            .as_deref()
            .and_then(|result| projector::project(result, self.state.current_time))
    }
}
