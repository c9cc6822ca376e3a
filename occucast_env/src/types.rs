//! Wire types exchanged between the prediction node and its transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an Occucast node (a predictor or a pose source).
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Creates a new random NodeId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic NodeId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A tracked position observation, as delivered by motion capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    /// Capture time on the sender's clock (seconds)
    pub stamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PoseUpdate {
    /// Creates a planar pose (z = 0).
    pub fn planar(stamp: f64, x: f64, y: f64) -> Self {
        Self { stamp, x, y, z: 0.0 }
    }
}

/// One forecast step of the outbound occupancy message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityGrid {
    /// Forecast step this record was taken from
    pub step: usize,

    /// `step * delta_t`, seconds after the issuing update
    pub capture_time_offset: f64,

    /// Absolute stamp in seconds since the session start
    pub stamp: f64,

    /// Real units per cell
    pub resolution: f64,

    /// Real-world extent along x
    pub width: f64,

    /// Real-world extent along y
    pub height: f64,

    /// Real-world coordinate of cell (0, 0)
    pub origin: [f64; 2],

    /// Row-major occupancy probabilities, `rows * cols` long
    pub data: Vec<f64>,
}

/// The full forecast time series emitted on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGridTime {
    /// Node that produced the forecast
    pub source: NodeId,

    /// Context time of the first emission (seconds)
    pub session_start: f64,

    /// Records ordered by step ascending
    pub grids: Vec<ProbabilityGrid>,
}

impl OccupancyGridTime {
    /// Number of per-step records.
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

/// RGBA color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const RED: Rgba = Rgba::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Rgba = Rgba::new(0.0, 1.0, 0.0, 1.0);
}

/// Primitive used to render a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    Sphere,
    Cube,
}

/// Logical output channel a marker is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerTopic {
    /// Fixed start reference point
    Start,
    /// Fixed goal reference point
    Goal,
    /// Workspace volume and above-threshold occupancy cells
    GridVis,
}

/// A world-frame visualization primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Marker id, unique per topic within one emission
    pub id: u32,
    pub shape: MarkerShape,
    /// Center in world coordinates
    pub position: [f64; 3],
    /// Extent along each axis
    pub scale: [f64; 3],
    pub color: Rgba,
}
