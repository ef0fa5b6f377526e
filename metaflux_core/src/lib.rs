//! MetaFlux Core - Dynamic-Simulation Playback Engine
//!
//! Turns the time series returned by a long-running metabolic simulation into
//! a deterministic, scrubbable, speed-controlled virtual clock:
//! 1. **Fetching**: one full-fidelity attempt, one reduced-fidelity retry, then a terminal error
//! 2. **Timeline**: an explicit play/pause/seek/speed state machine with a single tick timer
//! 3. **Projection**: ceiling-sample snapshots of the trajectory at the cursor
//! 4. **Alerts**: toxicity events pinned to the same samples as the growth curve

pub mod alerts;
pub mod driver;
pub mod notify;
pub mod orchestrator;
pub mod projector;
pub mod result;
pub mod session;
pub mod timeline;

// Re-export key types for convenience
pub use alerts::{AlertAggregator, AlertMarker, AlertSeverity};
pub use driver::{DeadlineTimer, DriverClosed, PlaybackCommand, PlaybackDriver, PlaybackHandle, PlaybackView};
pub use notify::{Notification, NotificationLevel, NotificationTopic, Notifier};
pub use orchestrator::{
    DynamicParams, FetchedResult, Fidelity, OrchestratorConfig, RequestOrchestrator, SimulationError,
};
pub use projector::{ceiling_index, project, Snapshot};
pub use result::{DynamicSimulationResult, FluxMap, ResultError, ToxicityEvent};
pub use session::PlaybackSession;
pub use timeline::{
    PlaybackPhase, PlaybackSpeed, PlaybackState, TickTimer, TimelineConfig, TimelineController, TimerId,
};
