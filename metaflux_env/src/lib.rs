//! MetaFlux Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the playback engine run
//! both against the real simulation service (tokio + HTTP) and inside the
//! deterministic harness.
//!
//! # Core Concept
//!
//! Everything that would make a run non-reproducible is intercepted:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - The simulation service (`simulate_dynamic()`, `health()`)
//!
//! # Example
//!
//! ```ignore
//! use metaflux_env::{PlaybackContext, SimulationTransport};
//!
//! async fn fetch<Ctx: PlaybackContext, T: SimulationTransport>(ctx: &Ctx, transport: &T) {
//!     tokio::select! {
//!         response = transport.simulate_dynamic(request) => handle(response),
//!         _ = ctx.sleep(Duration::from_secs(60)) => timed_out(),
//!     }
//! }
//! ```

mod context;
mod error;
mod http;
mod tokio_impl;
mod transport;
mod types;

pub use context::PlaybackContext;
pub use error::{EnvError, FailureKind};
pub use http::HttpTransport;
pub use tokio_impl::TokioContext;
pub use transport::SimulationTransport;
pub use types::{DynamicSimulationRequest, DynamicSimulationResponse, HealthStatus, ToxicityAlert};
