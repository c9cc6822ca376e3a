//! Production implementations backed by Tokio.

use crate::error::EnvError;
use crate::network::{ForecastSink, PoseFeed};
use crate::types::{Marker, MarkerTopic, OccupancyGridTime, PoseUpdate};
use crate::OccucastContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;

/// Production context backed by Tokio and the system clock.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OccucastContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

/// Pose feed reading from a Tokio channel.
pub struct ChannelPoseFeed {
    /// Receiver behind a tokio mutex so `recv` can take `&self`
    rx: tokio::sync::Mutex<mpsc::Receiver<PoseUpdate>>,
}

impl ChannelPoseFeed {
    /// Creates a feed and the sender that drives it.
    ///
    /// Dropping every sender closes the feed.
    pub fn channel(capacity: usize) -> (mpsc::Sender<PoseUpdate>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                rx: tokio::sync::Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl PoseFeed for ChannelPoseFeed {
    async fn recv(&self) -> Option<PoseUpdate> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

/// Everything a `ChannelForecastSink` forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    Grids(OccupancyGridTime),
    Marker(MarkerTopic, Marker),
}

/// Forecast sink that forwards into a Tokio channel.
#[derive(Clone)]
pub struct ChannelForecastSink {
    tx: mpsc::Sender<SinkMessage>,
}

impl ChannelForecastSink {
    /// Creates a sink and the receiver observing it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SinkMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ForecastSink for ChannelForecastSink {
    async fn publish_grids(&self, grids: OccupancyGridTime) -> Result<(), EnvError> {
        self.tx
            .send(SinkMessage::Grids(grids))
            .await
            .map_err(|_| EnvError::closed("occupancy_grid_time"))
    }

    async fn publish_marker(&self, topic: MarkerTopic, marker: Marker) -> Result<(), EnvError> {
        self.tx
            .send(SinkMessage::Marker(topic, marker))
            .await
            .map_err(|_| EnvError::closed(format!("{:?} marker", topic)))
    }
}
