//! Simulated human that walks straight lines between waypoints.
//!
//! The route is start → goals... → start, each leg taking an equal share
//! of the period. After the period the human stands at the start.

use nalgebra::Vector2;
use occucast_core::Position;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Default time to complete the whole route (seconds)
pub const DEFAULT_PERIOD_SECS: f64 = 60.0;

pub struct LinearHuman {
    /// start, goals..., start
    waypoints: Vec<Vector2<f64>>,

    /// Seconds per leg
    leg_time: f64,

    period: f64,

    /// Gaussian position noise and its stream
    noise: Option<(Normal<f64>, ChaCha8Rng)>,
}

impl LinearHuman {
    pub fn new(start: Position, goals: &[Position]) -> Self {
        Self::with_period(start, goals, DEFAULT_PERIOD_SECS)
    }

    pub fn with_period(start: Position, goals: &[Position], period: f64) -> Self {
        let start = Vector2::new(start.x, start.y);
        let mut waypoints = Vec::with_capacity(goals.len() + 2);
        waypoints.push(start);
        waypoints.extend(goals.iter().map(|g| Vector2::new(g.x, g.y)));
        waypoints.push(start);

        Self {
            leg_time: period / (goals.len() + 1) as f64,
            period,
            waypoints,
            noise: None,
        }
    }

    /// Adds zero-mean gaussian noise with standard deviation `std_dev`.
    ///
    /// A non-finite or negative deviation leaves the human noiseless.
    pub fn with_noise(mut self, std_dev: f64, rng: ChaCha8Rng) -> Self {
        self.noise = Normal::new(0.0, std_dev).ok().map(|n| (n, rng));
        self
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    /// Noise-free position on the route at `t` seconds.
    pub fn position_at(&self, t: f64) -> Position {
        let start = self.waypoints[0];
        if t >= self.period || t <= 0.0 {
            return Position::new(start.x, start.y);
        }

        let leg = ((t / self.leg_time) as usize).min(self.waypoints.len() - 2);
        let from = self.waypoints[leg];
        let to = self.waypoints[leg + 1];
        let alpha = (t - leg as f64 * self.leg_time) / self.leg_time;

        let p = from + (to - from) * alpha;
        Position::new(p.x, p.y)
    }

    /// Observed position at `t`: route position plus noise.
    pub fn observe(&mut self, t: f64) -> Position {
        let mut pos = self.position_at(t);
        if let Some((normal, rng)) = self.noise.as_mut() {
            pos.x += normal.sample(rng);
            pos.y += normal.sample(rng);
        }
        pos
    }
}
