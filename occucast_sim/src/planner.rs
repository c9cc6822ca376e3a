//! Reference occupancy forecaster: a Boltzmann-rational walker on an open grid.
//!
//! The human is modelled as noisily optimal. From every cell it can stay or
//! move to one of its 8 neighbours. Each action is scored by
//! `Q(s, a) = -(cost(a) + V(s'))`, where `V` is the octile cost-to-go to the
//! goal, and picked with probability `∝ exp(Q(s, a) / β)`. Small β walks
//! almost straight at the goal, large β wanders. The goal is absorbing.
//!
//! Occupancy is propagated forward from a point mass at the start for
//! `horizon` steps.

use nalgebra::DMatrix;
use occucast_core::{ForecastError, ForecastMatrix, OccupancyForecaster, SpaceError, StateIndex};
use std::f64::consts::SQRT_2;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cost of standing still for one step
const STAY_COST: f64 = 1.0;

/// (d_row, d_col) for the 8 neighbours and staying put
const ACTIONS: [(i64, i64); 9] = [
    (0, 0),
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone)]
pub struct BoltzmannPlanner {
    height: usize,
    width: usize,
}

impl BoltzmannPlanner {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn num_cells(&self) -> usize {
        self.height * self.width
    }

    fn check_index(&self, index: StateIndex) -> Result<(usize, usize), ForecastError> {
        if index.get() >= self.num_cells() {
            return Err(SpaceError::IndexOutOfRange {
                index: index.get(),
                num_cells: self.num_cells(),
            }
            .into());
        }
        Ok((index.get() / self.width, index.get() % self.width))
    }

    /// Octile distance, the exact cost-to-go on an obstacle-free 8-grid.
    fn cost_to_go(from: (usize, usize), goal: (usize, usize)) -> f64 {
        let dr = from.0.abs_diff(goal.0) as f64;
        let dc = from.1.abs_diff(goal.1) as f64;
        (dr.max(dc) - dr.min(dc)) + SQRT_2 * dr.min(dc)
    }

    /// Successor states and their probabilities for every state.
    fn policy(&self, goal: (usize, usize), beta: f64) -> Vec<Vec<(usize, f64)>> {
        let goal_index = goal.0 * self.width + goal.1;

        (0..self.num_cells())
            .map(|s| {
                if s == goal_index {
                    return vec![(s, 1.0)];
                }
                let (row, col) = (s / self.width, s % self.width);

                let scored: Vec<(usize, f64)> = ACTIONS
                    .iter()
                    .filter_map(|&(dr, dc)| {
                        let r = row as i64 + dr;
                        let c = col as i64 + dc;
                        if r < 0 || c < 0 || r >= self.height as i64 || c >= self.width as i64 {
                            return None;
                        }
                        let next = (r as usize, c as usize);
                        let cost = match (dr, dc) {
                            (0, 0) => STAY_COST,
                            (0, _) | (_, 0) => 1.0,
                            _ => SQRT_2,
                        };
                        let q = -(cost + Self::cost_to_go(next, goal));
                        Some((next.0 * self.width + next.1, q / beta))
                    })
                    .collect();

                // Softmax, shifted by the best score for stability
                let best = scored.iter().map(|(_, z)| *z).fold(f64::NEG_INFINITY, f64::max);
                let weights: Vec<(usize, f64)> =
                    scored.iter().map(|&(next, z)| (next, (z - best).exp())).collect();
                let total: f64 = weights.iter().map(|(_, w)| w).sum();
                weights.into_iter().map(|(next, w)| (next, w / total)).collect()
            })
            .collect()
    }
}

impl OccupancyForecaster for BoltzmannPlanner {
    fn forecast(
        &self,
        start: StateIndex,
        goal: StateIndex,
        horizon: usize,
        rationality: f64,
    ) -> Result<ForecastMatrix, ForecastError> {
        self.check_index(start)?;
        let goal = self.check_index(goal)?;
        if !(rationality.is_finite() && rationality > 0.0) {
            return Err(ForecastError::unavailable(format!(
                "rationality must be positive, got {}",
                rationality
            )));
        }

        let policy = self.policy(goal, rationality);
        let n = self.num_cells();
        let mut occupancy = DMatrix::zeros(horizon + 1, n);
        occupancy[(0, start.get())] = 1.0;

        for t in 0..horizon {
            for s in 0..n {
                let mass = occupancy[(t, s)];
                if mass == 0.0 {
                    continue;
                }
                for &(next, p) in &policy[s] {
                    occupancy[(t + 1, next)] += mass * p;
                }
            }
        }

        Ok(ForecastMatrix::new(occupancy))
    }
}

/// Wraps a forecaster and makes every `fail_every`-th call fail.
pub struct FlakyForecaster<F> {
    inner: F,
    fail_every: u64,
    calls: AtomicU64,
}

impl<F: OccupancyForecaster> FlakyForecaster<F> {
    pub fn new(inner: F, fail_every: u64) -> Self {
        Self {
            inner,
            fail_every: fail_every.max(1),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<F: OccupancyForecaster> OccupancyForecaster for FlakyForecaster<F> {
    fn forecast(
        &self,
        start: StateIndex,
        goal: StateIndex,
        horizon: usize,
        rationality: f64,
    ) -> Result<ForecastMatrix, ForecastError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call % self.fail_every == 0 {
            return Err(ForecastError::unavailable(format!("injected failure on call {}", call)));
        }
        self.inner.forecast(start, goal, horizon, rationality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn planner() -> BoltzmannPlanner {
        BoltzmannPlanner::new(10, 10)
    }

    #[test]
    fn test_first_row_is_point_mass_at_start() {
        let m = planner().forecast(StateIndex(23), StateIndex(99), 3, 1.0).unwrap();
        assert_eq!(m.steps(), 4);
        assert_eq!(m.num_cells(), 100);
        assert_eq!(m.prob(0, 23), 1.0);
        assert_relative_eq!(m.row_vec(0).iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_low_beta_walks_the_diagonal() {
        let m = planner().forecast(StateIndex(0), StateIndex(99), 12, 0.05).unwrap();
        assert!(m.prob(1, 11) > 0.99);
        assert!(m.prob(12, 99) > 0.95);
    }

    #[test]
    fn test_high_beta_spreads_mass() {
        let m = planner().forecast(StateIndex(55), StateIndex(99), 1, 50.0).unwrap();
        let occupied = m.row_vec(1).iter().filter(|p| **p > 0.05).count();
        assert_eq!(occupied, 9);
    }

    #[test]
    fn test_goal_is_absorbing() {
        let m = planner().forecast(StateIndex(99), StateIndex(99), 4, 1.0).unwrap();
        for t in 0..=4 {
            assert_eq!(m.prob(t, 99), 1.0);
        }
    }

    #[test]
    fn test_rejects_out_of_range_indices() {
        let p = planner();
        assert!(matches!(
            p.forecast(StateIndex(100), StateIndex(0), 3, 1.0),
            Err(ForecastError::CoordinateOutOfRange(_))
        ));
        assert!(matches!(
            p.forecast(StateIndex(0), StateIndex(250), 3, 1.0),
            Err(ForecastError::CoordinateOutOfRange(_))
        ));
        assert!(matches!(
            p.forecast(StateIndex(0), StateIndex(9), 3, 0.0),
            Err(ForecastError::ForecastUnavailable(_))
        ));
    }

    #[test]
    fn test_flaky_forecaster_fails_on_schedule() {
        let flaky = FlakyForecaster::new(planner(), 3);
        let outcomes: Vec<bool> = (0..6)
            .map(|_| flaky.forecast(StateIndex(0), StateIndex(99), 2, 1.0).is_ok())
            .collect();
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
        assert_eq!(flaky.calls(), 6);
    }

    proptest! {
        #[test]
        fn prop_rows_are_distributions(
            start in 0usize..100,
            goal in 0usize..100,
            horizon in 1usize..8,
            beta in 0.05f64..20.0,
        ) {
            let m = planner().forecast(StateIndex(start), StateIndex(goal), horizon, beta).unwrap();
            for t in 0..=horizon {
                let row = m.row_vec(t);
                prop_assert!(row.iter().all(|p| *p >= 0.0));
                prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            }
        }
    }
}
