//! Append-only log of observed real-world positions.

use crate::occucast_space::Position;
use serde::{Deserialize, Serialize};

/// The tracked human trajectory.
///
/// Positions are kept for the lifetime of the node even when they could not
/// be mapped onto the grid; only the most recent one feeds the forecaster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trajectory {
    points: Vec<Position>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation.
    pub fn record_observation(&mut self, pos: Position) {
        self.points.push(pos);
    }

    /// Most recent observation, or `None` before the first one.
    pub fn latest(&self) -> Option<Position> {
        self.points.last().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observations in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.points.iter()
    }

    /// Total path length walked so far.
    pub fn distance_travelled(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
            .sum()
    }
}
