//! Occucast Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the occupancy
//! prediction node run against real mocap/transport in **Production**
//! (tokio) and against a virtual clock in **Simulation**.
//!
//! # Intercepted I/O
//!
//! - Time (`now()`, `sleep()`)
//! - Inbound poses (`PoseFeed::recv()`)
//! - Outbound forecasts and markers (`ForecastSink`)
//!
//! # Example
//!
//! ```ignore
//! use occucast_env::{ChannelPoseFeed, ChannelForecastSink, TokioContext};
//!
//! let (pose_tx, feed) = ChannelPoseFeed::channel(16);
//! let (sink, mut outbox) = ChannelForecastSink::channel(64);
//! node.run(&feed, &sink).await?;
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::OccucastContext;
pub use network::{ForecastSink, PoseFeed};
pub use types::{
    Marker, MarkerShape, MarkerTopic, NodeId, OccupancyGridTime, PoseUpdate, ProbabilityGrid, Rgba,
};
pub use error::EnvError;
pub use tokio_impl::{ChannelForecastSink, ChannelPoseFeed, SinkMessage, TokioContext};
