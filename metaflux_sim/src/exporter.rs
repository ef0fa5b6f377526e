//! JSON exporter for offline inspection of playback runs.

use metaflux_core::{
    Fidelity, Notification, PlaybackPhase, PlaybackSpeed, TickTimer, TimelineController,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::time::Duration;

/// Timeline state after one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackFrame {
    /// Virtual wall clock in milliseconds
    pub wall_ms: u64,

    /// Cursor in simulated hours
    pub current_time: f64,

    pub phase: PlaybackPhase,
    pub speed: PlaybackSpeed,

    /// Sample chosen by projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub byproducts: BTreeMap<String, f64>,
}

impl PlaybackFrame {
    /// Captures the controller as seen at `wall`.
    pub fn capture<T: TickTimer>(wall: Duration, timeline: &TimelineController<T>) -> Self {
        let state = timeline.state();
        let snapshot = timeline.snapshot();

        Self {
            wall_ms: wall.as_millis() as u64,
            current_time: state.current_time,
            phase: timeline.phase(),
            speed: state.speed,
            sample_index: snapshot.as_ref().map(|s| s.index),
            growth_rate: snapshot.as_ref().map(|s| s.growth_rate),
            byproducts: snapshot.map(|s| s.byproducts).unwrap_or_default(),
        }
    }
}

/// Complete scenario export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Fidelity of the loaded result, if one was loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity: Option<Fidelity>,

    /// All frames
    pub frames: Vec<PlaybackFrame>,

    /// Every notification raised during the run
    pub notifications: Vec<Notification>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            fidelity: None,
            frames: Vec::new(),
            notifications: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: PlaybackFrame) {
        self.frames.push(frame);
    }

    /// Duration of the run on the virtual clock.
    pub fn duration_ms(&self) -> u64 {
        self.frames.last().map_or(0, |frame| frame.wall_ms)
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_serializes_frames() {
        let mut export = SimExport::new("happy_path", 42);
        export.add_frame(PlaybackFrame {
            wall_ms: 500,
            current_time: 0.5,
            phase: PlaybackPhase::Playing,
            speed: PlaybackSpeed::X1,
            sample_index: Some(1),
            growth_rate: Some(0.42),
            byproducts: BTreeMap::new(),
        });
        export.finalize(true, None);

        let value = serde_json::to_value(&export).unwrap();
        assert_eq!(value["scenario"], "happy_path");
        assert_eq!(value["frames"][0]["phase"], "Playing");
        assert_eq!(value["frames"][0]["sample_index"], 1);
        assert!(value["frames"][0].get("byproducts").is_none());
        assert!(value.get("failure_reason").is_none());
        assert_eq!(export.duration_ms(), 500);
    }
}
