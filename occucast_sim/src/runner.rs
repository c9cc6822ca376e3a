//! Scenario runner - drives a prediction node with a simulated human.

use crate::context::SimContext;
use crate::exporter::{CellProbability, SimEvent, SimExport, SimFrame};
use crate::human::LinearHuman;
use crate::planner::{BoltzmannPlanner, FlakyForecaster};
use crate::scenarios::ScenarioId;
use crate::visualizer::RerunLogger;

use occucast_core::{
    snapshot_stats, GridCell, GridGeometry, InterpolationError, OccupancyForecaster, Position,
    PredictionConfig, PredictionNode,
};
use occucast_env::OccucastContext;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Planner calls between injected failures in the flaky scenario
const FLAKY_FAIL_EVERY: u64 = 3;

/// Human position noise, as a fraction of the cell size
const NOISE_FRACTION: f64 = 0.05;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total pose updates fed to the node
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub updates: u64,
    pub forecasts: u64,
    pub out_of_range: u64,
    pub forecast_failures: u64,
    pub markers: u64,

    /// Forecasts published after the last rejected update
    pub forecasts_after_last_failure: u64,

    /// Path length of the observed trajectory (real units)
    pub distance_walked: f64,

    /// Mean distance between the observation and its start cell centre
    pub mean_tracking_error: f64,

    /// Highest entropy seen in a visualized snapshot (bits)
    pub peak_entropy_bits: f64,

    /// Broken guarantees (lost forecast, malformed message, ...)
    pub invariant_violations: u64,
}

/// Runs prediction scenarios.
pub struct ScenarioRunner {
    /// Master seed
    seed: u64,

    config: PredictionConfig,

    /// Pose updates per second
    rate_hz: u32,

    /// Simulated duration (one full walk of the route)
    max_duration_secs: f64,

    /// Ticks between exported frames
    export_interval: u64,

    logger: RerunLogger,
}

impl ScenarioRunner {
    /// Creates a new scenario runner with the default workspace.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: PredictionConfig::default(),
            rate_hz: 10,
            max_duration_secs: 60.0,
            export_interval: 5,
            logger: RerunLogger::disabled(),
        }
    }

    /// Sets the prediction configuration.
    pub fn with_config(mut self, config: PredictionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the pose update rate.
    pub fn with_rate(mut self, hz: u32) -> Self {
        self.rate_hz = hz.max(1);
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Attaches a Rerun logger.
    pub fn with_logger(mut self, logger: RerunLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None)
    }

    /// Runs a scenario and writes its frames to `path` as JSON.
    pub fn run_with_export(&self, scenario: ScenarioId, path: &str) -> ScenarioResult {
        let mut export = SimExport::new(scenario.name(), self.seed);
        let result = self.execute(scenario, Some(&mut export));
        export.finalize(result.passed, result.failure_reason.clone());

        if let Err(e) = export.write_to_file(path) {
            error!("Failed to write export: {:?}", e);
        } else {
            info!("Exported {} frames to {}", export.frames.len(), path);
        }
        result
    }

    fn execute(&self, scenario: ScenarioId, export: Option<&mut SimExport>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        if scenario.injects_faults() {
            warn!("{}", scenario.description());
        }

        let planner = BoltzmannPlanner::new(self.config.grid_height, self.config.grid_width);
        match scenario {
            ScenarioId::FlakyPlanner => {
                self.drive(scenario, FlakyForecaster::new(planner, FLAKY_FAIL_EVERY), export)
            }
            _ => self.drive(scenario, planner, export),
        }
    }

    /// Waypoints of the human's route for `scenario`, as real positions.
    fn route(&self, scenario: ScenarioId, geometry: &GridGeometry, goal: GridCell) -> Vec<Position> {
        let far_corner = GridCell::new(0, geometry.width() as i64 - 1);
        match scenario {
            ScenarioId::Walk | ScenarioId::FlakyPlanner => vec![cell_centre(geometry, goal)],
            ScenarioId::RoundTrip => {
                let mut goals: Vec<Position> =
                    self.config.goals.iter().map(|g| cell_centre(geometry, *g)).collect();
                if !self.config.goals.contains(&far_corner) {
                    goals.push(cell_centre(geometry, far_corner));
                }
                goals
            }
            ScenarioId::Excursion => vec![Position::new(
                geometry.real_width() / 2.0 + 2.0 * geometry.resolution(),
                0.0,
            )],
        }
    }

    fn drive<F: OccupancyForecaster>(
        &self,
        scenario: ScenarioId,
        forecaster: F,
        mut export: Option<&mut SimExport>,
    ) -> ScenarioResult {
        let context = SimContext::shared(self.seed);
        let mut metrics = ScenarioMetrics::default();

        let mut node = match PredictionNode::new(context.clone(), self.config.clone(), forecaster) {
            Ok(node) => node,
            Err(e) => return self.failed(scenario, 0, 0.0, metrics, format!("Invalid config: {}", e)),
        };
        let geometry = match self.config.geometry() {
            Ok(geometry) => geometry,
            Err(e) => return self.failed(scenario, 0, 0.0, metrics, format!("Invalid config: {}", e)),
        };

        let start = cell_centre(&geometry, self.config.start);
        let goals = self.route(scenario, &geometry, node.goal());
        let mut human = LinearHuman::with_period(start, &goals, self.max_duration_secs)
            .with_noise(NOISE_FRACTION * geometry.resolution(), context.rng_stream(1));

        let reference = node.reference_markers().map(|(_, marker)| marker);
        self.logger.log_markers("reference", &reference);
        metrics.markers += reference.len() as u64;

        let store = node.store();
        let dt = 1.0 / self.rate_hz as f64;
        let target_ticks = (self.max_duration_secs * self.rate_hz as f64) as u64;
        let vis_time = self.config.visualization_time;
        let mut tracking_error_sum = 0.0;

        for tick in 0..target_ticks {
            context.advance_time(Duration::from_secs_f64(dt));
            let t = context.now().as_secs_f64();
            let pos = human.observe(t);
            let was_ready = store.is_ready();
            let generation_before = store.generation();
            let mut events = Vec::new();

            self.logger.set_time(t);
            self.logger.log_human(pos);

            match node.on_position_update(pos) {
                Ok(report) => {
                    metrics.forecasts_after_last_failure += 1;

                    let centre = cell_centre(&geometry, report.start_cell);
                    tracking_error_sum += ((centre.x - pos.x).powi(2) + (centre.y - pos.y).powi(2)).sqrt();

                    let malformed = report.grids.len() != self.config.horizon
                        || report.grids.grids.iter().any(|g| {
                            g.data.len() != geometry.num_cells()
                                || (g.data.iter().sum::<f64>() - 1.0).abs() > 1e-6
                        });
                    if malformed {
                        metrics.invariant_violations += 1;
                    }
                }
                Err(e) => {
                    metrics.forecasts_after_last_failure = 0;
                    self.logger.log_event("events", &e.to_string());
                    events.push(SimEvent::warn(e.to_string()));

                    if store.generation() != generation_before {
                        metrics.invariant_violations += 1;
                    }
                }
            }
            if was_ready && !store.is_ready() {
                metrics.invariant_violations += 1;
            }

            let mut frame_stats = None;
            let mut frame_cells = Vec::new();
            match node.snapshot_at(vis_time) {
                Ok(snapshot) => {
                    let markers = node.snapshot_markers(&snapshot);
                    self.logger.log_markers("grid_vis", &markers);
                    metrics.markers += markers.len() as u64;

                    let probabilities = snapshot.probabilities.as_slice();
                    let stats = snapshot_stats(probabilities, &geometry, self.config.prob_threshold);
                    metrics.peak_entropy_bits = metrics.peak_entropy_bits.max(stats.entropy_bits);
                    self.logger.log_entropy(stats.entropy_bits);

                    if export.is_some() && tick % self.export_interval == 0 {
                        frame_cells = node
                            .emitter()
                            .hot_cells(probabilities, self.config.prob_threshold)
                            .map(|hot| CellProbability::from(&hot))
                            .collect();
                        frame_stats = Some(stats);
                    }
                }
                Err(InterpolationError::NotReady) => {}
                Err(e) => {
                    warn!("Visualization failed: {}", e);
                    metrics.invariant_violations += 1;
                }
            }

            if let Some(export) = export.as_deref_mut() {
                if tick % self.export_interval == 0 || !events.is_empty() {
                    export.add_frame(SimFrame {
                        time_sec: t,
                        human: [pos.x, pos.y],
                        generation: store.generation(),
                        stats: frame_stats,
                        cells: frame_cells,
                        events,
                    });
                }
            }

            if tick % self.rate_hz as u64 == 0 {
                debug!(
                    "  t={:.1}s | pos=({:.2}, {:.2}) | generation={}",
                    t,
                    pos.x,
                    pos.y,
                    store.generation()
                );
            }
        }

        let stats = node.stats();
        metrics.updates = stats.updates_received;
        metrics.forecasts = stats.forecasts_published;
        metrics.out_of_range = stats.out_of_range;
        metrics.forecast_failures = stats.forecast_failures;
        metrics.distance_walked = node.trajectory().distance_travelled();
        if metrics.forecasts > 0 {
            metrics.mean_tracking_error = tracking_error_sum / metrics.forecasts as f64;
        }
        if store.generation() != metrics.forecasts {
            metrics.invariant_violations += 1;
        }

        let failure_reason = self.check(scenario, &metrics, geometry.resolution());
        let final_time_secs = context.now().as_secs_f64();

        match &failure_reason {
            None => info!(
                "✓ {} complete: {} updates, {} forecasts, tracking error {:.2}",
                scenario.name(),
                metrics.updates,
                metrics.forecasts,
                metrics.mean_tracking_error
            ),
            Some(reason) => warn!("✗ {} failed: {}", scenario.name(), reason),
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: target_ticks,
            final_time_secs,
            failure_reason,
            metrics,
        }
    }

    /// Scenario assertions. Returns the first broken one.
    fn check(&self, scenario: ScenarioId, m: &ScenarioMetrics, resolution: f64) -> Option<String> {
        if m.invariant_violations > 0 {
            return Some(format!("{} invariant violations", m.invariant_violations));
        }
        if m.forecasts == 0 {
            return Some("no forecast was ever published".to_string());
        }

        match scenario {
            ScenarioId::Walk | ScenarioId::RoundTrip => {
                if m.out_of_range + m.forecast_failures > 0 {
                    return Some(format!(
                        "{} updates rejected on an in-grid route",
                        m.out_of_range + m.forecast_failures
                    ));
                }
                if m.mean_tracking_error > resolution {
                    return Some(format!(
                        "tracking error {:.2} exceeds one cell ({:.2})",
                        m.mean_tracking_error, resolution
                    ));
                }
            }
            ScenarioId::Excursion => {
                if m.out_of_range == 0 {
                    return Some("human never left the grid".to_string());
                }
                if m.forecasts_after_last_failure == 0 {
                    return Some("forecasting did not resume after re-entry".to_string());
                }
            }
            ScenarioId::FlakyPlanner => {
                if m.forecast_failures == 0 {
                    return Some("no planner failure was injected".to_string());
                }
                if m.forecasts + m.forecast_failures != m.updates {
                    return Some("updates unaccounted for".to_string());
                }
            }
        }
        None
    }

    fn failed(
        &self,
        scenario: ScenarioId,
        total_ticks: u64,
        final_time_secs: f64,
        metrics: ScenarioMetrics,
        reason: String,
    ) -> ScenarioResult {
        error!("✗ {}: {}", scenario.name(), reason);
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: false,
            total_ticks,
            final_time_secs,
            failure_reason: Some(reason),
            metrics,
        }
    }
}

/// Real-world centre of a cell.
fn cell_centre(geometry: &GridGeometry, cell: GridCell) -> Position {
    let corner = geometry.to_real(cell);
    let half = geometry.resolution() / 2.0;
    Position::new(corner.x + half, corner.y + half)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(42).with_duration(10.0)
    }

    #[test]
    fn test_walk_scenario() {
        let result = runner().run(ScenarioId::Walk);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.total_ticks, 100);
        assert_eq!(result.metrics.forecasts, 100);
        // Two reference spheres, then at least the workspace box per tick
        assert!(result.metrics.markers >= 2 + 100);
    }

    #[test]
    fn test_walk_reports_distance_walked() {
        // Out to the goal cell centre and back, plus a little noise
        let result = runner().run(ScenarioId::Walk);
        let round_trip = 2.0 * 9.0 * 2.0_f64.sqrt();

        assert!(result.metrics.distance_walked > 0.95 * round_trip);
        assert!(result.metrics.distance_walked < 1.25 * round_trip);
    }

    #[test]
    fn test_round_trip_scenario() {
        let result = runner().run(ScenarioId::RoundTrip);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.peak_entropy_bits > 0.0);
    }

    #[test]
    fn test_excursion_keeps_stale_forecast() {
        let result = runner().run(ScenarioId::Excursion);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.out_of_range > 0);
        assert_eq!(result.metrics.forecast_failures, 0);
        assert_eq!(
            result.metrics.forecasts + result.metrics.out_of_range,
            result.metrics.updates
        );
    }

    #[test]
    fn test_flaky_planner_scenario() {
        let result = runner().run(ScenarioId::FlakyPlanner);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.forecast_failures, 100 / FLAKY_FAIL_EVERY);
    }

    #[test]
    fn test_same_seed_same_metrics() {
        let a = runner().run(ScenarioId::RoundTrip);
        let b = runner().run(ScenarioId::RoundTrip);
        assert_eq!(a.metrics, b.metrics);
    }

    #[test]
    fn test_invalid_config_fails_cleanly() {
        let config = PredictionConfig {
            goals: vec![],
            ..PredictionConfig::default()
        };
        let result = runner().with_config(config).run(ScenarioId::Walk);

        assert!(!result.passed);
        assert_eq!(result.total_ticks, 0);
    }

    #[test]
    fn test_export_writes_frames() {
        let path = std::env::temp_dir().join(format!("occucast_export_{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let result = runner().with_duration(2.0).run_with_export(ScenarioId::Walk, &path);
        assert!(result.passed);

        let json = std::fs::read_to_string(&path).unwrap();
        let export: SimExport = serde_json::from_str(&json).unwrap();
        assert_eq!(export.scenario, "walk");
        assert_eq!(export.frames.len(), 4);
        assert!(export.frames.iter().all(|f| f.stats.is_some()));
        let _ = std::fs::remove_file(&path);
    }
}
