//! Prediction node configuration, loaded once at startup.

use crate::occucast_space::{GridCell, GridGeometry, SpaceError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Everything the prediction node needs to know about its workspace,
/// the forecaster and the visualization path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Rows of the simulation grid (cells along y)
    pub grid_height: usize,

    /// Columns of the simulation grid (cells along x)
    pub grid_width: usize,

    /// Real units per cell
    pub resolution: f64,

    /// Lower corner of the monitored area [x, y]
    pub lower: [f64; 2],

    /// Upper corner of the monitored area [x, y]
    pub upper: [f64; 2],

    /// Start reference cell
    pub start: GridCell,

    /// Candidate goals. Only the first one is used.
    pub goals: Vec<GridCell>,

    /// Forward steps per forecast
    pub horizon: usize,

    /// Real seconds per forecast step
    pub step_duration: f64,

    /// Rationality coefficient passed to the forecaster
    pub rationality: f64,

    /// Cells strictly above this probability are visualized
    pub prob_threshold: f64,

    /// Height of occupancy markers (real units)
    pub human_height: f64,

    /// Forecast step (possibly fractional) rendered as markers
    pub visualization_time: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            grid_height: 10,
            grid_width: 10,
            resolution: 1.0,
            lower: [-5.0, -5.0],
            upper: [5.0, 5.0],
            start: GridCell::new(0, 0),
            goals: vec![GridCell::new(9, 9)],
            horizon: 10,
            step_duration: 0.5,
            rationality: 1.0,
            prob_threshold: 0.05,
            human_height: 1.8,
            visualization_time: 1.5,
        }
    }
}

impl PredictionConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Builds the immutable grid geometry.
    pub fn geometry(&self) -> Result<GridGeometry, ConfigError> {
        Ok(GridGeometry::new(
            self.grid_height,
            self.grid_width,
            self.resolution,
            self.lower,
            self.upper,
        )?)
    }

    /// The goal every forecast is conditioned on.
    pub fn goal(&self) -> Result<GridCell, ConfigError> {
        self.goals
            .first()
            .copied()
            .ok_or_else(|| ConfigError::Invalid("at least one goal is required".into()))
    }

    /// Checks the configuration for defects that would break the
    /// position ↔ cell ↔ index mapping or the forecast timeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let geometry = self.geometry()?;

        // to_grid and to_real shift by half the extent, which only lands on
        // the configured bounds when the area is centred on the origin.
        for (lo, hi, axis) in [
            (self.lower[0], self.upper[0], "x"),
            (self.lower[1], self.upper[1], "y"),
        ] {
            if (lo + hi).abs() > 1e-9 * (hi - lo).max(1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} bounds [{}, {}] are not centred on the origin",
                    axis, lo, hi
                )));
            }
        }

        // The cell count has to tile the real extent, otherwise to_grid and
        // to_real stop being inverses.
        for (cells, extent, axis) in [
            (self.grid_width, geometry.real_width(), "x"),
            (self.grid_height, geometry.real_height(), "y"),
        ] {
            let tiled = cells as f64 * self.resolution;
            if (tiled - extent).abs() > 1e-9 * extent.max(1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} cells of {} do not cover the {} extent {}",
                    cells, self.resolution, axis, extent
                )));
            }
        }

        let goal = self.goal()?;
        for (name, cell) in [("start", self.start), ("goal", goal)] {
            if !geometry.contains(cell) {
                return Err(ConfigError::Invalid(format!(
                    "{} cell {} is outside the {}x{} grid",
                    name, cell, self.grid_height, self.grid_width
                )));
            }
        }

        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be at least 1".into()));
        }
        if !(self.step_duration.is_finite() && self.step_duration > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "step_duration must be positive, got {}",
                self.step_duration
            )));
        }
        if !(self.rationality.is_finite() && self.rationality > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "rationality must be positive, got {}",
                self.rationality
            )));
        }
        if !(0.0..=1.0).contains(&self.prob_threshold) {
            return Err(ConfigError::Invalid(format!(
                "prob_threshold must be in [0, 1], got {}",
                self.prob_threshold
            )));
        }
        if !(0.0..=self.horizon as f64).contains(&self.visualization_time) {
            return Err(ConfigError::Invalid(format!(
                "visualization_time {} is outside the horizon {}",
                self.visualization_time, self.horizon
            )));
        }
        if !(self.human_height.is_finite() && self.human_height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "human_height must be positive, got {}",
                self.human_height
            )));
        }

        Ok(())
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid geometry: {0}")]
    Geometry(#[from] SpaceError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}
