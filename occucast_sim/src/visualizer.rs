//! Rerun visualization for simulation runs.
//!
//! Visualization is optional and only available with the `visualization` feature.
//!
//! # What Gets Logged
//!
//! - The observed human position as a blue point
//! - Start/goal reference spheres and occupancy cubes, from the node's markers
//! - Snapshot entropy as a scalar timeline

use occucast_core::Position;
use occucast_env::Marker;
#[cfg(feature = "visualization")]
use occucast_env::MarkerShape;
#[cfg(feature = "visualization")]
use rerun::{Boxes3D, Color, Points3D, Position3D, Radius, RecordingStream};

/// Rerun logger for simulation visualization.
pub struct RerunLogger {
    #[cfg(feature = "visualization")]
    rec: Option<RecordingStream>,

    /// Whether visualization is enabled
    enabled: bool,
}

impl RerunLogger {
    /// Creates a new logger with visualization disabled.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "visualization")]
            rec: None,
            enabled: false,
        }
    }

    /// Creates a new logger with visualization enabled.
    #[cfg(feature = "visualization")]
    pub fn new(name: &str) -> Self {
        match rerun::RecordingStreamBuilder::new(name).spawn() {
            Ok(rec) => {
                tracing::info!("Rerun visualization enabled - open Rerun Viewer to follow the forecast");
                Self {
                    rec: Some(rec),
                    enabled: true,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Rerun: {:?}", e);
                Self {
                    rec: None,
                    enabled: false,
                }
            }
        }
    }

    /// Creates a logger - returns disabled if visualization feature not enabled.
    #[cfg(not(feature = "visualization"))]
    pub fn new(_name: &str) -> Self {
        tracing::info!("Rerun visualization not available (compile with --features visualization)");
        Self::disabled()
    }

    /// Returns whether visualization is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the simulation time for subsequent logs.
    #[cfg(feature = "visualization")]
    pub fn set_time(&self, seconds: f64) {
        if let Some(ref rec) = self.rec {
            rec.set_time_seconds("sim_time", seconds);
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn set_time(&self, _seconds: f64) {}

    /// Logs the observed human position.
    #[cfg(feature = "visualization")]
    pub fn log_human(&self, pos: Position) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(
                "world/human",
                &Points3D::new([Position3D::new(pos.x as f32, pos.y as f32, 0.0)])
                    .with_colors([Color::from_rgb(80, 80, 255)])
                    .with_radii([Radius::new_scene_units(0.2)]),
            );
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_human(&self, _pos: Position) {}

    /// Logs markers under `world/<path>`, spheres as points and cubes as boxes.
    #[cfg(feature = "visualization")]
    pub fn log_markers(&self, path: &str, markers: &[Marker]) {
        let Some(ref rec) = self.rec else {
            return;
        };
        let color = |m: &Marker| {
            Color::from_unmultiplied_rgba(
                (m.color.r * 255.0) as u8,
                (m.color.g * 255.0) as u8,
                (m.color.b * 255.0) as u8,
                (m.color.a * 255.0) as u8,
            )
        };
        let (spheres, cubes): (Vec<&Marker>, Vec<&Marker>) =
            markers.iter().partition(|m| m.shape == MarkerShape::Sphere);

        let _ = rec.log(
            format!("world/{}/spheres", path),
            &Points3D::new(spheres.iter().map(|m| {
                Position3D::new(m.position[0] as f32, m.position[1] as f32, m.position[2] as f32)
            }))
            .with_colors(spheres.iter().map(|m| color(m)))
            .with_radii(spheres.iter().map(|m| Radius::new_scene_units(m.scale[0] as f32 / 2.0))),
        );
        let _ = rec.log(
            format!("world/{}/cubes", path),
            &Boxes3D::from_centers_and_sizes(
                cubes
                    .iter()
                    .map(|m| (m.position[0] as f32, m.position[1] as f32, m.position[2] as f32)),
                cubes
                    .iter()
                    .map(|m| (m.scale[0] as f32, m.scale[1] as f32, m.scale[2] as f32)),
            )
            .with_colors(cubes.iter().map(|m| color(m))),
        );
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_markers(&self, _path: &str, _markers: &[Marker]) {}

    /// Logs a text annotation (e.g., planner failure).
    #[cfg(feature = "visualization")]
    pub fn log_event(&self, path: &str, message: &str) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(path, &rerun::TextLog::new(message));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_event(&self, _path: &str, _message: &str) {}

    /// Logs snapshot entropy as a scalar metric.
    #[cfg(feature = "visualization")]
    pub fn log_entropy(&self, entropy_bits: f64) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log("metrics/entropy_bits", &rerun::Scalar::new(entropy_bits));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_entropy(&self, _entropy_bits: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use occucast_env::{MarkerShape, Rgba};

    #[test]
    fn test_disabled_logger() {
        let logger = RerunLogger::disabled();
        assert!(!logger.is_enabled());

        // These should be no-ops
        logger.set_time(1.0);
        logger.log_human(Position::new(0.0, 0.0));
        logger.log_markers(
            "grid_vis",
            &[Marker {
                id: 1,
                shape: MarkerShape::Cube,
                position: [0.0, 0.0, 0.9],
                scale: [1.0, 1.0, 1.8],
                color: Rgba::RED,
            }],
        );
        logger.log_entropy(1.0);
    }
}
