//! MetaFlux Player - live dynamic-simulation playback
//!
//! Fetches a dynamic simulation from a running service and plays it back on
//! the wall clock:
//! - One full-fidelity attempt, one reduced-fidelity retry
//! - Ceiling-sample snapshots logged on every tick
//! - Toxicity alerts annotated at the cursor

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use metaflux_core::{
    AlertAggregator, DynamicParams, NotificationLevel, Notifier, OrchestratorConfig,
    PlaybackDriver, PlaybackPhase, PlaybackSpeed, RequestOrchestrator, TimelineConfig,
};
use metaflux_env::{HttpTransport, TokioContext};

/// Live playback of a dynamic metabolic simulation
#[derive(Parser, Debug)]
#[command(name = "metaflux-player")]
#[command(about = "Fetch a dynamic simulation and play it back", long_about = None)]
struct Args {
    /// Simulation service URL (defaults to METAFLUX_SERVICE_URL or http://localhost:8000)
    #[arg(long)]
    url: Option<String>,

    /// Model identifier loaded by the service
    #[arg(short, long, default_value = "e_coli_core")]
    model: String,

    /// Initial glucose, mmol/L
    #[arg(long, default_value = "20.0")]
    glucose: f64,

    /// Initial biomass, gDW/L
    #[arg(long, default_value = "0.01")]
    biomass: f64,

    /// Simulated horizon in hours
    #[arg(long, default_value = "24.0")]
    hours: f64,

    /// Gene or reaction knockouts (repeatable)
    #[arg(short, long = "knockout")]
    knockouts: Vec<String>,

    /// Skip the flux history on the primary attempt
    #[arg(long)]
    no_flux_history: bool,

    /// Playback speed multiplier (1, 2, 5 or 10)
    #[arg(long, default_value = "1")]
    speed: u32,

    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value = "500")]
    tick_ms: u64,

    /// Seconds allowed per fetch attempt
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    /// Print each playback view as a JSON line instead of a log line
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Routes notifications to the log, standing in for the toast layer.
fn log_notifier() -> Notifier {
    Notifier::new().with_subscriber(|n| match n.level {
        NotificationLevel::Error => error!(topic = ?n.topic, "{}", n.message),
        NotificationLevel::Warning => warn!(topic = ?n.topic, "{}", n.message),
        NotificationLevel::Info | NotificationLevel::Success => {
            info!(topic = ?n.topic, "{}", n.message)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let target_speed = PlaybackSpeed::from_multiplier(args.speed)
        .with_context(|| format!("unsupported speed {}x (use 1, 2, 5 or 10)", args.speed))?;

    let transport = match &args.url {
        Some(url) => HttpTransport::new(url.clone()),
        None => HttpTransport::from_env(),
    };
    let context = TokioContext::shared();
    let orchestrator = RequestOrchestrator::new(context.clone(), Arc::new(transport), log_notifier())
        .with_config(OrchestratorConfig {
            request_timeout: Duration::from_secs(args.timeout_secs),
        });

    info!("MetaFlux Player v{}", env!("CARGO_PKG_VERSION"));
    orchestrator
        .check_health()
        .await
        .context("simulation service health check failed")?;

    let params = DynamicParams {
        model_id: args.model.clone(),
        initial_glucose: args.glucose,
        initial_biomass: args.biomass,
        total_time: args.hours,
        knockouts: args.knockouts.clone(),
        include_flux_history: !args.no_flux_history,
        ..DynamicParams::default()
    };

    let fetched = orchestrator
        .run_dynamic_simulation(&params)
        .await
        .with_context(|| format!("dynamic simulation of {} failed", params.model_id))?;
    info!(
        samples = fetched.result.len(),
        fidelity = ?fetched.fidelity,
        "result accepted"
    );

    let alerts = AlertAggregator::new(&fetched.result, params.total_time);
    if let Some(notification) = alerts.primary_notification() {
        orchestrator.notifier().notify(notification);
    }

    let config = TimelineConfig {
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        ..TimelineConfig::default()
    };
    let handle = PlaybackDriver::spawn(context, config);
    let mut views = handle.subscribe();

    handle.load(fetched.result.clone(), params.total_time)?;
    let mut speed = PlaybackSpeed::default();
    while speed != target_speed {
        handle.cycle_speed()?;
        speed = speed.next();
    }

    let mut last_time = f64::NEG_INFINITY;
    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();
        if view.phase == PlaybackPhase::Stopped {
            continue;
        }

        if view.state.current_time != last_time {
            if args.json {
                println!("{}", serde_json::to_string(&view)?);
            } else if let Some(snapshot) = &view.snapshot {
                info!(
                    "t={:>6.2}h  sample={:<4} mu={:.4}  {}",
                    view.state.current_time,
                    snapshot.index,
                    snapshot.growth_rate,
                    snapshot
                        .byproducts
                        .iter()
                        .map(|(name, value)| format!("{}={:.3}", name, value))
                        .collect::<Vec<_>>()
                        .join(" ")
                );
            }

            for marker in alerts.markers_between(last_time.max(0.0), view.state.current_time) {
                if marker.event.time > last_time {
                    warn!(
                        "toxicity: {} at {:.3} mmol/L (t={:.2}h, biomass {:.4})",
                        marker.event.byproduct,
                        marker.event.concentration,
                        marker.event.time,
                        marker.biomass.unwrap_or_default()
                    );
                }
            }
            last_time = view.state.current_time;
        }

        if view.phase == PlaybackPhase::Ended {
            info!("playback finished at {:.2}h", view.state.current_time);
            break;
        }
    }

    handle.shutdown()?;
    Ok(())
}
