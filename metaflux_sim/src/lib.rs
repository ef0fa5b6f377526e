//! MetaFlux Deterministic Simulation Testing (DST) Harness
//!
//! Runs the playback engine against a scripted simulation service on a
//! virtual clock, so fetch failures and timeline races replay exactly from a
//! single seed.
//!
//! # Core Principle: Nothing Real
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when a tick fires or a collaborator sleeps
//! - **Service**: Per-attempt fault plans (hang, refuse, server detail, malformed body)
//! - **Randomness**: User input storms and jitter derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      PlaybackWorld                       │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ SimContext (Virtual Clock + Seeded RNG)            │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │        │                               │                 │
//! │  ┌─────▼──────────────┐      ┌─────────▼──────────────┐  │
//! │  │  PlaybackSession   │◄────►│  ScriptedTransport     │  │
//! │  │  (orchestrator +   │      │  (FaultPlan script)    │  │
//! │  │   timeline +       │      └─────────▲──────────────┘  │
//! │  │   alerts)          │                │                 │
//! │  └─────▲──────────────┘      ┌─────────┴──────────────┐  │
//! │        │ LedgerTimer         │  BatchCulture fixture  │  │
//! │        │ (DeadlineTimer)     │  (synthetic dFBA)      │  │
//! │        └──────               └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use metaflux_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::PrimaryTimeout);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod fixtures;
mod runner;
mod timer;
mod transport;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{PlaybackFrame, SimExport};
pub use fixtures::{BatchCulture, CultureParams, ALERT_FRACTION, MAX_TOXICITY_ALERTS, TOXICITY_THRESHOLDS};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use timer::LedgerTimer;
pub use transport::{FaultPlan, ScriptedTransport};
pub use world::{PlaybackWorld, SimConfig, SimSession, SimTimer};
