//! JSON exporter for offline inspection of simulation runs.

use occucast_core::{HotCell, SnapshotStats};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    /// Observed human position [x, y]
    pub human: [f64; 2],

    /// Store generation visualized in this frame (0 = none yet)
    pub generation: u64,

    /// Statistics of the visualized snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SnapshotStats>,

    /// Above-threshold cells of the visualized snapshot
    pub cells: Vec<CellProbability>,

    /// Events (out-of-range, failures, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

/// One visualized cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellProbability {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub p: f64,
}

impl From<&HotCell> for CellProbability {
    fn from(hot: &HotCell) -> Self {
        Self {
            index: hot.index.get(),
            x: hot.position.x,
            y: hot.position.y,
            p: hot.probability,
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

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
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
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
    fn test_export_tracks_duration_and_skips_empty_fields() {
        let mut export = SimExport::new("walk", 42);
        export.add_frame(SimFrame {
            time_sec: 1.5,
            human: [0.0, 0.0],
            generation: 0,
            stats: None,
            cells: vec![],
            events: vec![],
        });
        export.finalize(true, None);

        assert_eq!(export.duration_sec, 1.5);
        let json = serde_json::to_string(&export).unwrap();
        assert!(!json.contains("failure_reason"));
        assert!(!json.contains("events"));
        assert!(!json.contains("stats"));
    }
}
