//! Occucast Core - Temporal Occupancy-Grid Prediction
//!
//! Forecasts where a tracked human is likely to be over the next few
//! seconds, as a time series of probability grids:
//! 1. **Space**: real-world frame ↔ grid cell ↔ state index
//! 2. **Forecast**: calls the external inference function from the latest
//!    observed position
//! 3. **Time**: stores the latest forecast and interpolates it at any
//!    fractional step inside the horizon
//! 4. **Emission**: outbound grid messages and visualization markers

pub mod occucast_space;
pub mod occucast_trajectory;
pub mod occucast_forecast;
pub mod occucast_time;
pub mod emitter;
pub mod metrics;
pub mod config;
pub mod predictor_runtime;

// Re-export key types for convenience
pub use occucast_space::{GridCell, GridGeometry, Position, SpaceError, StateIndex};
pub use occucast_trajectory::Trajectory;
pub use occucast_forecast::{
    Forecast, ForecastError, ForecastInvoker, ForecastMatrix, OccupancyForecaster, TimeHorizonMeta,
};
pub use occucast_time::{interpolate, ForecastStore, InterpolationError, OccupancySnapshot};
pub use emitter::{HotCell, SnapshotEmitter};
pub use metrics::{snapshot_stats, SnapshotStats};
pub use config::{ConfigError, PredictionConfig};
pub use predictor_runtime::{NodeStats, PredictionNode, UpdateReport};
