//! Playback driver - runs a timeline on a real clock.
//!
//! The driver is an actor: one spawned task owns the [`TimelineController`]
//! outright, so playback state never needs a lock. Callers talk to it through
//! a [`PlaybackHandle`]; every change is published as a [`PlaybackView`] on a
//! watch channel.
//!
//! ```text
//!  PlaybackHandle ──commands(mpsc)──► driver task ──view(watch)──► subscribers
//!                                         │
//!                                   DeadlineTimer
//!                                 (ctx.now / ctx.sleep)
//! ```
//!
//! The tick deadline advances by exactly one interval per fire, so commands
//! arriving between ticks (a speed change, say) never shift the phase.

use crate::projector::Snapshot;
use crate::result::DynamicSimulationResult;
use crate::timeline::{
    PlaybackPhase, PlaybackState, TickTimer, TimelineConfig, TimelineController, TimerId,
};
use metaflux_env::PlaybackContext;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Single-slot timer keeping an absolute deadline on the context clock.
pub struct DeadlineTimer<Ctx: PlaybackContext> {
    context: Arc<Ctx>,
    next_id: u64,
    armed: Option<ArmedTimer>,
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    id: TimerId,
    interval: Duration,
    deadline: Duration,
}

impl<Ctx: PlaybackContext> DeadlineTimer<Ctx> {
    pub fn new(context: Arc<Ctx>) -> Self {
        Self {
            context,
            next_id: 0,
            armed: None,
        }
    }

    /// Deadline of the armed timer on the context clock.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.armed.map(|armed| armed.deadline)
    }

    /// Consumes the current deadline and schedules the next one.
    ///
    /// Returns the id the tick belongs to.
    pub fn fire(&mut self) -> Option<TimerId> {
        let armed = self.armed.as_mut()?;
        armed.deadline += armed.interval;
        Some(armed.id)
    }
}

impl<Ctx: PlaybackContext> TickTimer for DeadlineTimer<Ctx> {
    fn arm(&mut self, interval: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.armed = Some(ArmedTimer {
            id,
            interval,
            deadline: self.context.now() + interval,
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if self.armed.map(|armed| armed.id) == Some(id) {
            self.armed = None;
        }
    }
}

/// Requests accepted by the driver task.
#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    Load {
        result: Arc<DynamicSimulationResult>,
        total_time: f64,
    },
    Play,
    Pause,
    Toggle,
    Seek(f64),
    CycleSpeed,
    SetTotalTime(f64),
    Clear,
    Shutdown,
}

/// What the view layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackView {
    pub state: PlaybackState,
    pub phase: PlaybackPhase,
    pub total_time: f64,
    pub progress: f64,
    pub snapshot: Option<Snapshot>,
}

impl<T: TickTimer> From<&TimelineController<T>> for PlaybackView {
    fn from(timeline: &TimelineController<T>) -> Self {
        Self {
            state: timeline.state(),
            phase: timeline.phase(),
            total_time: timeline.total_time(),
            progress: timeline.progress(),
            snapshot: timeline.snapshot(),
        }
    }
}

/// The driver task has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("playback driver has shut down")]
pub struct DriverClosed;

/// Cloneable handle to a running driver.
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<PlaybackCommand>,
    view: watch::Receiver<PlaybackView>,
}

impl PlaybackHandle {
    pub fn send(&self, command: PlaybackCommand) -> Result<(), DriverClosed> {
        self.commands.send(command).map_err(|_| DriverClosed)
    }

    pub fn load(&self, result: Arc<DynamicSimulationResult>, total_time: f64) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Load { result, total_time })
    }

    pub fn play(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Play)
    }

    pub fn pause(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Pause)
    }

    pub fn toggle(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Toggle)
    }

    pub fn seek(&self, t: f64) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Seek(t))
    }

    pub fn cycle_speed(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::CycleSpeed)
    }

    pub fn set_total_time(&self, total_time: f64) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::SetTotalTime(total_time))
    }

    pub fn clear(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Clear)
    }

    pub fn shutdown(&self) -> Result<(), DriverClosed> {
        self.send(PlaybackCommand::Shutdown)
    }

    /// Latest published view.
    pub fn view(&self) -> PlaybackView {
        self.view.borrow().clone()
    }

    /// A fresh receiver for change notifications.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackView> {
        self.view.clone()
    }
}

/// Spawns playback drivers.
pub struct PlaybackDriver;

impl PlaybackDriver {
    /// Starts a driver task on `context` and returns its handle.
    pub fn spawn<Ctx: PlaybackContext>(context: Arc<Ctx>, config: TimelineConfig) -> PlaybackHandle {
        let timeline = TimelineController::new(config, DeadlineTimer::new(context.clone()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(PlaybackView::from(&timeline));

        context.spawn(
            "playback-driver",
            run(context.clone(), timeline, command_rx, view_tx),
        );

        PlaybackHandle {
            commands: command_tx,
            view: view_rx,
        }
    }
}

fn apply<T: TickTimer>(timeline: &mut TimelineController<T>, command: PlaybackCommand) {
    match command {
        PlaybackCommand::Load { result, total_time } => timeline.load(result, total_time),
        PlaybackCommand::Play => {
            timeline.play();
        }
        PlaybackCommand::Pause => {
            timeline.pause();
        }
        PlaybackCommand::Toggle => {
            timeline.toggle();
        }
        PlaybackCommand::Seek(t) => timeline.seek(t),
        PlaybackCommand::CycleSpeed => {
            timeline.cycle_speed();
        }
        PlaybackCommand::SetTotalTime(t) => timeline.set_total_time(t),
        PlaybackCommand::Clear => timeline.clear(),
        // handled by the loop
        PlaybackCommand::Shutdown => {}
    }
}

async fn sleep_until<Ctx: PlaybackContext>(context: &Ctx, deadline: Option<Duration>) {
    match deadline {
        Some(deadline) => context.sleep(deadline.saturating_sub(context.now())).await,
        None => std::future::pending().await,
    }
}

async fn run<Ctx: PlaybackContext>(
    context: Arc<Ctx>,
    mut timeline: TimelineController<DeadlineTimer<Ctx>>,
    mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    view: watch::Sender<PlaybackView>,
) {
    loop {
        let deadline = timeline.timer().next_deadline();

        // A due tick goes before any queued command, so a command backlog
        // delays a tick by at most one command.
        if deadline.is_some_and(|deadline| deadline <= context.now()) {
            if let Some(id) = timeline.timer_mut().fire() {
                timeline.on_tick(id);
            }
            view.send_replace(PlaybackView::from(&timeline));
            continue;
        }

        tokio::select! {
            biased;
            command = commands.recv() => match command {
                None | Some(PlaybackCommand::Shutdown) => break,
                Some(command) => apply(&mut timeline, command),
            },
            _ = sleep_until(&*context, deadline) => {
                if let Some(id) = timeline.timer_mut().fire() {
                    timeline.on_tick(id);
                }
            }
        }

        view.send_replace(PlaybackView::from(&timeline));
    }

    timeline.clear();
    view.send_replace(PlaybackView::from(&timeline));
    debug!("playback driver stopped");
}
