//! Transport abstraction between the prediction node and the outside world.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{Marker, MarkerTopic, OccupancyGridTime, PoseUpdate};

/// Inbound stream of tracked positions.
///
/// # Implementations
///
/// - **Production**: a mocap bridge, or `ChannelPoseFeed` fed by one
/// - **Simulation**: `ChannelPoseFeed` fed by the simulated human
///
/// # Ordering
///
/// Updates must be yielded in arrival order. The node processes one update
/// to completion before pulling the next, so at most one is in flight.
#[async_trait]
pub trait PoseFeed: Send + Sync + 'static {
    /// Receives the next pose update.
    ///
    /// # Returns
    /// * `Some(pose)` - A pose was received
    /// * `None` - The feed was closed (shutdown)
    async fn recv(&self) -> Option<PoseUpdate>;
}

/// Outbound publisher for forecasts and visualization markers.
///
/// ```text
/// PredictionNode                 Sink                      Consumers
///   |                             |                           |
///   |-- publish_grids(series) --->|-- /occupancy_grid_time -->|
///   |-- publish_marker(topic) --->|-- /start | /goal | vis -->|
/// ```
#[async_trait]
pub trait ForecastSink: Send + Sync + 'static {
    /// Publishes the full forecast time series.
    ///
    /// # Returns
    /// * `Ok(())` - Message queued for delivery
    /// * `Err(EnvError::ChannelClosed)` - Nobody is listening anymore
    async fn publish_grids(&self, grids: OccupancyGridTime) -> Result<(), EnvError>;

    /// Publishes one visualization marker on the given topic.
    async fn publish_marker(&self, topic: MarkerTopic, marker: Marker) -> Result<(), EnvError>;
}
