//! Predictor Runtime - Orchestrates the Occucast engines with environment context.
//!
//! This module provides the integration layer between the pure engines
//! (space, trajectory, forecast, time, emission) and the environment
//! abstraction (OccucastContext, PoseFeed, ForecastSink).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PredictionNode                          │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │              Context: OccucastContext                 │   │
//! │  │  • now() → session-relative stamps                   │   │
//! │  │  • seed() → deterministic node id                    │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                              │                               │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────┐   │
//! │  │TRAJECTORY│→│ FORECAST │→│   TIME   │→│   EMITTER    │   │
//! │  │  (log)   │ │ Invoker  │ │  Store   │ │ grids/markers│   │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use occucast_core::predictor_runtime::PredictionNode;
//! use occucast_env::{ChannelForecastSink, ChannelPoseFeed, TokioContext};
//!
//! let mut node = PredictionNode::new(TokioContext::shared(), config, planner)?;
//! let (pose_tx, feed) = ChannelPoseFeed::channel(16);
//! let (sink, outbox) = ChannelForecastSink::channel(64);
//!
//! let stats = node.run(&feed, &sink).await?;
//! ```

use crate::config::{ConfigError, PredictionConfig};
use crate::emitter::SnapshotEmitter;
use crate::metrics::snapshot_stats;
use crate::occucast_forecast::{ForecastError, ForecastInvoker, OccupancyForecaster};
use crate::occucast_space::{GridCell, Position};
use crate::occucast_time::{ForecastStore, InterpolationError, OccupancySnapshot};
use crate::occucast_trajectory::Trajectory;
use occucast_env::{
    EnvError, ForecastSink, Marker, MarkerTopic, NodeId, OccucastContext, OccupancyGridTime,
    PoseFeed, Rgba,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Outcome of one successful position update.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    /// Cell the forecast was started from
    pub start_cell: GridCell,

    /// Store generation after the swap
    pub generation: u64,

    /// Outbound message for this forecast
    pub grids: OccupancyGridTime,
}

/// Counters kept over the lifetime of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    pub updates_received: u64,
    pub forecasts_published: u64,
    /// Updates whose position did not map onto the grid
    pub out_of_range: u64,
    /// Updates where the forecaster failed
    pub forecast_failures: u64,
    pub markers_published: u64,
}

/// The occupancy prediction node.
///
/// Generic over the context and the forecaster, so the same node runs
/// against tokio in production or the virtual clock in simulation.
/// All mutation goes through `&mut self`, which gives the single-writer
/// discipline for the trajectory and the store.
pub struct PredictionNode<Ctx, F>
where
    Ctx: OccucastContext,
    F: OccupancyForecaster,
{
    /// Node identifier
    pub node_id: NodeId,

    /// Environment context
    context: Arc<Ctx>,

    config: PredictionConfig,

    /// First configured goal
    goal: GridCell,

    trajectory: Trajectory,
    invoker: ForecastInvoker<F>,

    /// Shared with readers; written only here
    store: Arc<ForecastStore>,

    emitter: SnapshotEmitter,
    stats: NodeStats,
}

impl<Ctx, F> PredictionNode<Ctx, F>
where
    Ctx: OccucastContext,
    F: OccupancyForecaster,
{
    /// Creates a node from a validated configuration.
    pub fn new(context: Arc<Ctx>, config: PredictionConfig, forecaster: F) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = config.geometry()?;
        let goal = config.goal()?;
        let node_id = NodeId::from_seed(context.seed());

        info!(
            "Prediction node {} on {}x{} grid (res {}), goal {}, horizon {} x {}s",
            node_id,
            config.grid_height,
            config.grid_width,
            config.resolution,
            goal,
            config.horizon,
            config.step_duration
        );

        Ok(Self {
            node_id,
            context,
            goal,
            trajectory: Trajectory::new(),
            invoker: ForecastInvoker::new(geometry.clone(), forecaster, config.step_duration),
            store: ForecastStore::shared(),
            emitter: SnapshotEmitter::new(geometry, node_id, config.human_height),
            stats: NodeStats::default(),
            config,
        })
    }

    /// Returns the current time from the context.
    pub fn now_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    pub fn goal(&self) -> GridCell {
        self.goal
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Read handle on the forecast store.
    pub fn store(&self) -> Arc<ForecastStore> {
        Arc::clone(&self.store)
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn emitter(&self) -> &SnapshotEmitter {
        &self.emitter
    }

    /// Handles one observed position: record, recompute, swap, emit.
    ///
    /// The position is always kept in the trajectory. On failure the
    /// previously stored forecast stays in place and the error is returned
    /// after being logged; callers are free to ignore it.
    pub fn on_position_update(&mut self, pos: Position) -> Result<UpdateReport, ForecastError> {
        self.trajectory.record_observation(pos);
        self.stats.updates_received += 1;

        let forecast = match self.invoker.recompute(
            pos,
            self.goal,
            self.config.horizon,
            self.config.rationality,
        ) {
            Ok(forecast) => forecast,
            Err(e) => {
                match &e {
                    ForecastError::CoordinateOutOfRange(_) => {
                        self.stats.out_of_range += 1;
                        warn!("Position ({:.2}, {:.2}) skipped: {}", pos.x, pos.y, e);
                    }
                    ForecastError::ForecastUnavailable(_) => {
                        self.stats.forecast_failures += 1;
                        warn!("{}; keeping generation {}", e, self.store.generation());
                    }
                }
                return Err(e);
            }
        };

        let start_cell = forecast.start();
        let grids = self.emitter.to_external_grid(&forecast, self.now_secs());
        self.store.replace(forecast);
        self.stats.forecasts_published += 1;

        debug!(
            "Forecast #{} from {} ({} steps)",
            self.store.generation(),
            start_cell,
            grids.len()
        );

        Ok(UpdateReport {
            start_cell,
            generation: self.store.generation(),
            grids,
        })
    }

    /// Interpolated occupancy `future_time` steps ahead of the latest forecast.
    pub fn snapshot_at(&self, future_time: f64) -> Result<OccupancySnapshot, InterpolationError> {
        self.store.interpolate(future_time)
    }

    /// Workspace volume plus one cube per above-threshold cell at `future_time`.
    pub fn visualization_markers(&self, future_time: f64) -> Result<Vec<Marker>, InterpolationError> {
        let snapshot = self.snapshot_at(future_time)?;
        Ok(self.snapshot_markers(&snapshot))
    }

    /// Markers for an already interpolated snapshot.
    pub fn snapshot_markers(&self, snapshot: &OccupancySnapshot) -> Vec<Marker> {
        let probabilities = snapshot.probabilities.as_slice();

        let stats = snapshot_stats(probabilities, self.invoker.geometry(), self.config.prob_threshold);
        debug!(
            "Snapshot t={:.2}: mass {:.3}, entropy {:.2} bits, {} cells above {}",
            snapshot.future_time,
            stats.total_mass,
            stats.entropy_bits,
            stats.cells_above_threshold,
            self.config.prob_threshold
        );

        let mut markers = vec![self.emitter.workspace_marker()];
        markers.extend(
            self.emitter
                .hot_cells(probabilities, self.config.prob_threshold)
                .map(|hot| self.emitter.occupancy_marker(&hot)),
        );
        markers
    }

    /// Start (green) and goal (red) reference spheres.
    pub fn reference_markers(&self) -> [(MarkerTopic, Marker); 2] {
        let geometry = self.invoker.geometry();
        [
            (
                MarkerTopic::Start,
                self.emitter
                    .reference_marker(geometry.to_real(self.config.start), Rgba::GREEN),
            ),
            (
                MarkerTopic::Goal,
                self.emitter
                    .reference_marker(geometry.to_real(self.goal), Rgba::RED),
            ),
        ]
    }

    /// Processes the feed in arrival order until it closes.
    ///
    /// Forecast failures are absorbed (the stale forecast keeps being
    /// visualized); only a dead sink ends the loop early.
    pub async fn run<P, S>(&mut self, feed: &P, sink: &S) -> Result<NodeStats, EnvError>
    where
        P: PoseFeed,
        S: ForecastSink,
    {
        let since_epoch = self
            .context
            .system_time()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        info!(
            "Prediction node {} serving (wall clock {}s)",
            self.node_id,
            since_epoch.as_secs()
        );

        for (topic, marker) in self.reference_markers() {
            sink.publish_marker(topic, marker).await?;
            self.stats.markers_published += 1;
        }

        while let Some(pose) = feed.recv().await {
            if let Ok(report) = self.on_position_update(Position::new(pose.x, pose.y)) {
                sink.publish_grids(report.grids).await?;
            }

            match self.visualization_markers(self.config.visualization_time) {
                Ok(markers) => {
                    for marker in markers {
                        sink.publish_marker(MarkerTopic::GridVis, marker).await?;
                        self.stats.markers_published += 1;
                    }
                }
                Err(InterpolationError::NotReady) => {
                    debug!("No forecast yet, skipping visualization");
                }
                Err(e) => warn!("Visualization skipped: {}", e),
            }
        }

        info!(
            "Pose feed closed after {} updates ({} forecasts, {} out of range, {} failures)",
            self.stats.updates_received,
            self.stats.forecasts_published,
            self.stats.out_of_range,
            self.stats.forecast_failures
        );
        Ok(self.stats.clone())
    }
}
