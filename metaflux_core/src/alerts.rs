//! Toxicity alert aggregation.
//!
//! Places each toxicity event on the result's time axis with the same
//! ceiling rule the projector uses, so an alert marker and the growth-curve
//! marker always refer to the same sample.

use crate::notify::{Notification, NotificationLevel, NotificationTopic};
use crate::projector::ceiling_index;
use crate::result::{DynamicSimulationResult, ToxicityEvent};
use serde::Serialize;

/// How an alert is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSeverity {
    /// The first chronological event, surfaced as a notification
    Critical,
    /// Every later event, shown as a timeline marker only
    Passive,
}

/// A toxicity event resolved against the time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMarker {
    pub event: ToxicityEvent,

    /// Ceiling sample of the event time; `None` for an empty result
    pub sample_index: Option<usize>,

    /// Biomass at that sample
    pub biomass: Option<f64>,

    /// Placement along the timeline bar, in `[0, 1]`
    pub position: f64,

    pub severity: AlertSeverity,
}

/// Chronologically ordered alert markers for one result.
#[derive(Debug, Clone, Default)]
pub struct AlertAggregator {
    markers: Vec<AlertMarker>,
}

impl AlertAggregator {
    /// Resolves every toxicity event of `result`.
    ///
    /// Events are ordered by time; events sharing a time keep payload order.
    pub fn new(result: &DynamicSimulationResult, total_time: f64) -> Self {
        let mut events: Vec<&ToxicityEvent> = result.toxicity_events().iter().collect();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        let markers = events
            .into_iter()
            .enumerate()
            .map(|(rank, event)| {
                let sample_index = ceiling_index(result.time(), event.time);
                let position = if total_time > 0.0 {
                    (event.time / total_time).clamp(0.0, 1.0)
                } else {
                    0.0
                };

                AlertMarker {
                    event: event.clone(),
                    sample_index,
                    biomass: sample_index.map(|i| result.biomass()[i]),
                    position,
                    severity: if rank == 0 {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Passive
                    },
                }
            })
            .collect();

        Self { markers }
    }

    /// All markers, earliest first.
    pub fn markers(&self) -> &[AlertMarker] {
        &self.markers
    }

    /// The distinguished first event.
    pub fn primary(&self) -> Option<&AlertMarker> {
        self.markers.first()
    }

    /// Markers rendered without a notification.
    pub fn passive(&self) -> impl Iterator<Item = &AlertMarker> {
        self.markers.iter().skip(1)
    }

    /// Markers whose event time lies in `[from, to]`.
    pub fn markers_between(&self, from: f64, to: f64) -> impl Iterator<Item = &AlertMarker> {
        self.markers
            .iter()
            .filter(move |m| m.event.time >= from && m.event.time <= to)
    }

    /// Notification for the first event, if there is one.
    pub fn primary_notification(&self) -> Option<Notification> {
        self.primary().map(|marker| {
            Notification::new(
                NotificationLevel::Error,
                NotificationTopic::Toxicity,
                format!(
                    "[Warning] {} concentration reached its toxicity threshold; growth is being inhibited",
                    marker.event.byproduct
                ),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}
