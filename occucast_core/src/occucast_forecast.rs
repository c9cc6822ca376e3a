//! The "FORECAST" Engine - invocation of the external occupancy predictor
//!
//! The inference algorithm itself (a Boltzmann-rational MDP planner, in the
//! reference setup) is an external collaborator. This module only
//! translates the tracked human's real-world position into the planner's
//! state-index vocabulary, calls it through the narrow
//! [`OccupancyForecaster`] seam and checks the shape of what comes back.

use crate::occucast_space::{GridCell, GridGeometry, Position, SpaceError, StateIndex};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Per-step occupancy probabilities, shape `(horizon + 1) × num_cells`.
///
/// Row `t` is the distribution at forecast step `t` (row 0 is "now").
/// Rows are expected to sum to one; that is the forecaster's contract and
/// is not re-checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMatrix(DMatrix<f64>);

impl ForecastMatrix {
    pub fn new(matrix: DMatrix<f64>) -> Self {
        Self(matrix)
    }

    /// Builds a matrix from per-step rows.
    ///
    /// Returns `None` if the rows are ragged or there are none.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let cols = rows.first()?.len();
        if rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self(DMatrix::from_fn(rows.len(), cols, |t, k| rows[t][k])))
    }

    /// Number of stored steps (`horizon + 1`).
    pub fn steps(&self) -> usize {
        self.0.nrows()
    }

    pub fn num_cells(&self) -> usize {
        self.0.ncols()
    }

    /// Probability of occupying cell `k` at step `t`.
    pub fn prob(&self, t: usize, k: usize) -> f64 {
        self.0[(t, k)]
    }

    /// Copies out the distribution at step `t`.
    pub fn row_vec(&self, t: usize) -> Vec<f64> {
        self.0.row(t).iter().copied().collect()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.0
    }
}

/// How a continuous time maps back onto forecast steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeHorizonMeta {
    /// Number of forward steps (the horizon)
    pub step_count: usize,

    /// Real seconds per step
    pub delta_t: f64,
}

/// One complete forecast: matrix plus the metadata it was computed with.
///
/// Deserialization goes through [`Forecast::new`], so a decoded forecast
/// carries the same shape guarantee as a computed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForecastParts")]
pub struct Forecast {
    matrix: ForecastMatrix,
    meta: TimeHorizonMeta,

    /// Cell the human occupied when the forecast was requested
    start: GridCell,

    /// Goal the forecast was conditioned on
    goal: GridCell,
}

#[derive(Deserialize)]
struct ForecastParts {
    matrix: ForecastMatrix,
    meta: TimeHorizonMeta,
    start: GridCell,
    goal: GridCell,
}

impl TryFrom<ForecastParts> for Forecast {
    type Error = ForecastError;

    fn try_from(parts: ForecastParts) -> Result<Self, Self::Error> {
        Forecast::new(parts.matrix, parts.meta, parts.start, parts.goal)
    }
}

impl Forecast {
    /// Pairs a matrix with its horizon metadata.
    ///
    /// Fails with `ForecastUnavailable` unless the matrix holds exactly
    /// `step_count + 1` rows.
    pub fn new(
        matrix: ForecastMatrix,
        meta: TimeHorizonMeta,
        start: GridCell,
        goal: GridCell,
    ) -> Result<Self, ForecastError> {
        if matrix.steps() != meta.step_count + 1 {
            return Err(ForecastError::ForecastUnavailable(format!(
                "matrix has {} steps, horizon {} needs {}",
                matrix.steps(),
                meta.step_count,
                meta.step_count + 1
            )));
        }
        Ok(Self {
            matrix,
            meta,
            start,
            goal,
        })
    }

    pub fn matrix(&self) -> &ForecastMatrix {
        &self.matrix
    }

    pub fn meta(&self) -> TimeHorizonMeta {
        self.meta
    }

    pub fn start(&self) -> GridCell {
        self.start
    }

    pub fn goal(&self) -> GridCell {
        self.goal
    }
}

/// The external inference function.
///
/// Given start and goal state indices, a horizon `T` and a rationality
/// coefficient, returns a `(T + 1) × num_cells` matrix whose rows are
/// occupancy distributions. Must fail (rather than guess) when either
/// index is outside the grid.
///
/// Plain closures implement this trait, which keeps test doubles small:
///
/// ```ignore
/// let stub = |_s: StateIndex, _g: StateIndex, _t: usize, _b: f64|
///     -> Result<ForecastMatrix, ForecastError> { Ok(matrix.clone()) };
/// ```
pub trait OccupancyForecaster: Send + Sync {
    fn forecast(
        &self,
        start: StateIndex,
        goal: StateIndex,
        horizon: usize,
        rationality: f64,
    ) -> Result<ForecastMatrix, ForecastError>;
}

impl<F> OccupancyForecaster for F
where
    F: Fn(StateIndex, StateIndex, usize, f64) -> Result<ForecastMatrix, ForecastError> + Send + Sync,
{
    fn forecast(
        &self,
        start: StateIndex,
        goal: StateIndex,
        horizon: usize,
        rationality: f64,
    ) -> Result<ForecastMatrix, ForecastError> {
        self(start, goal, horizon, rationality)
    }
}

/// Wraps a forecaster with the grid geometry needed to call it.
pub struct ForecastInvoker<F> {
    geometry: GridGeometry,
    forecaster: F,
    delta_t: f64,
}

impl<F: OccupancyForecaster> ForecastInvoker<F> {
    /// # Arguments
    /// * `geometry` - Grid the forecaster's state indices refer to
    /// * `forecaster` - The external inference function
    /// * `delta_t` - Real seconds per forecast step
    pub fn new(geometry: GridGeometry, forecaster: F, delta_t: f64) -> Self {
        Self {
            geometry,
            forecaster,
            delta_t,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn forecaster(&self) -> &F {
        &self.forecaster
    }

    /// Requests a fresh forecast from the human's current position.
    ///
    /// # Errors
    /// * `CoordinateOutOfRange` - `current` or `goal` is not on the grid
    /// * `ForecastUnavailable` - the forecaster failed or returned a
    ///   matrix of the wrong shape
    pub fn recompute(
        &self,
        current: Position,
        goal: GridCell,
        horizon: usize,
        rationality: f64,
    ) -> Result<Forecast, ForecastError> {
        let start_cell = self.geometry.locate(current)?;
        let start = self.geometry.cell_to_index(start_cell)?;
        let goal_index = self.geometry.cell_to_index(goal)?;

        debug!(
            "Forecasting from {} {} towards {} {} over {} steps",
            start_cell, start, goal, goal_index, horizon
        );

        let matrix = self
            .forecaster
            .forecast(start, goal_index, horizon, rationality)
            .map_err(|e| match e {
                ForecastError::CoordinateOutOfRange(inner) => {
                    ForecastError::ForecastUnavailable(inner.to_string())
                }
                unavailable => unavailable,
            })?;

        if matrix.num_cells() != self.geometry.num_cells() {
            return Err(ForecastError::ForecastUnavailable(format!(
                "forecaster returned {} cells, grid has {}",
                matrix.num_cells(),
                self.geometry.num_cells()
            )));
        }

        Forecast::new(
            matrix,
            TimeHorizonMeta {
                step_count: horizon,
                delta_t: self.delta_t,
            },
            start_cell,
            goal,
        )
    }
}

/// Errors that can occur while producing a forecast.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),

    #[error("Coordinate out of range: {0}")]
    CoordinateOutOfRange(#[from] SpaceError),
}

impl ForecastError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ForecastUnavailable(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn workspace() -> GridGeometry {
        GridGeometry::new(10, 10, 1.0, [-5.0, -5.0], [5.0, 5.0]).unwrap()
    }

    fn uniform(steps: usize, cells: usize) -> ForecastMatrix {
        ForecastMatrix::new(DMatrix::from_element(steps, cells, 1.0 / cells as f64))
    }

    fn invoker_with<F>(forecaster: F) -> ForecastInvoker<F>
    where
        F: Fn(StateIndex, StateIndex, usize, f64) -> Result<ForecastMatrix, ForecastError> + Send + Sync,
    {
        ForecastInvoker::new(workspace(), forecaster, 0.5)
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        assert!(ForecastMatrix::from_rows(&[]).is_none());
        assert!(ForecastMatrix::from_rows(&[vec![1.0, 0.0], vec![1.0]]).is_none());

        let m = ForecastMatrix::from_rows(&[vec![1.0, 0.0], vec![0.25, 0.75]]).unwrap();
        assert_eq!(m.steps(), 2);
        assert_eq!(m.num_cells(), 2);
        assert_eq!(m.prob(1, 1), 0.75);
        assert_eq!(m.row_vec(1), vec![0.25, 0.75]);
    }

    #[test]
    fn test_recompute_passes_state_indices() {
        let seen = Mutex::new(None);
        let invoker = invoker_with(|s, g, t, beta| {
            *seen.lock().unwrap() = Some((s, g, t, beta));
            Ok(uniform(t + 1, 100))
        });

        let forecast = invoker
            .recompute(Position::new(-4.5, -4.5), GridCell::new(9, 9), 3, 0.7)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((StateIndex(0), StateIndex(99), 3, 0.7)));
        assert_eq!(forecast.meta().step_count, 3);
        assert_eq!(forecast.meta().delta_t, 0.5);
        assert_eq!(forecast.start(), GridCell::new(0, 0));
        assert_eq!(forecast.goal(), GridCell::new(9, 9));
        assert_eq!(forecast.matrix().steps(), 4);
    }

    #[test]
    fn test_recompute_rejects_position_outside_grid() {
        let invoker = invoker_with(|_, _, t, _| Ok(uniform(t + 1, 100)));

        let err = invoker
            .recompute(Position::new(12.0, 0.0), GridCell::new(9, 9), 3, 1.0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::CoordinateOutOfRange(_)));
    }

    #[test]
    fn test_recompute_rejects_goal_outside_grid() {
        let invoker = invoker_with(|_, _, t, _| Ok(uniform(t + 1, 100)));

        let err = invoker
            .recompute(Position::new(0.0, 0.0), GridCell::new(10, 0), 3, 1.0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::CoordinateOutOfRange(_)));
    }

    #[test]
    fn test_forecaster_failure_is_unavailable() {
        let invoker = invoker_with(|_, _, _, _| Err(ForecastError::unavailable("planner crashed")));

        let err = invoker
            .recompute(Position::new(0.0, 0.0), GridCell::new(9, 9), 3, 1.0)
            .unwrap_err();
        assert_eq!(err, ForecastError::ForecastUnavailable("planner crashed".into()));
    }

    #[test]
    fn test_wrong_cell_count_is_unavailable() {
        let invoker = invoker_with(|_, _, t, _| Ok(uniform(t + 1, 64)));

        let err = invoker
            .recompute(Position::new(0.0, 0.0), GridCell::new(9, 9), 3, 1.0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::ForecastUnavailable(_)));
    }

    #[test]
    fn test_decoding_enforces_row_count() {
        let forecast = Forecast::new(
            uniform(2, 4),
            TimeHorizonMeta {
                step_count: 1,
                delta_t: 0.5,
            },
            GridCell::new(0, 0),
            GridCell::new(1, 1),
        )
        .unwrap();

        let json = serde_json::to_string(&forecast).unwrap();
        let decoded: Forecast = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, forecast);

        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["meta"]["step_count"] = serde_json::json!(3);
        let err = serde_json::from_value::<Forecast>(value).unwrap_err();
        assert!(err.to_string().contains("horizon 3 needs 4"));
    }

    #[test]
    fn test_wrong_shape_is_unavailable() {
        // One row short of horizon + 1
        let invoker = invoker_with(|_, _, t, _| Ok(uniform(t, 100)));

        let err = invoker
            .recompute(Position::new(0.0, 0.0), GridCell::new(9, 9), 3, 1.0)
            .unwrap_err();
        assert!(matches!(err, ForecastError::ForecastUnavailable(_)));
    }
}
