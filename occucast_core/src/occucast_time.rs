//! The "TIME" Engine - forecast storage and continuous-time interpolation
//!
//! The forecaster works in whole steps of `delta_t` seconds, while the
//! visualization and consumption layers run at their own rate. This module
//! keeps the latest forecast behind an atomic swap and answers "what does
//! the occupancy look like `t` steps from now" for any real `t` inside the
//! horizon, linearly blending the two bounding step rows per cell.

use crate::occucast_forecast::{Forecast, TimeHorizonMeta};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Relative tolerance for snapping a query onto an integer step.
pub const STEP_RTOL: f64 = 1e-5;

/// Absolute tolerance for snapping a query onto an integer step.
pub const STEP_ATOL: f64 = 1e-8;

/// An occupancy distribution at a single (possibly fractional) step.
///
/// Interpolated snapshots are not renormalized and may not sum exactly to
/// one; consumers threshold individual cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancySnapshot {
    /// Query time in forecast steps
    pub future_time: f64,

    /// Set when the query snapped onto a stored step
    pub exact_step: Option<usize>,

    /// One probability per state index
    pub probabilities: DVector<f64>,
}

impl OccupancySnapshot {
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// Holds the most recent forecast.
///
/// Single writer, many readers. `replace` swaps in a whole new `Arc`, so a
/// reader either sees the old forecast or the new one, never a mix.
#[derive(Debug, Default)]
pub struct ForecastStore {
    current: RwLock<Option<Arc<Forecast>>>,
    generation: AtomicU64,
}

impl ForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped store for sharing with readers.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Replaces the stored forecast wholesale.
    pub fn replace(&self, forecast: Forecast) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::new(forecast));
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Snapshot of the stored forecast, `None` before the first success.
    pub fn get(&self) -> Option<Arc<Forecast>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful replacements so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    /// Metadata of the stored forecast.
    pub fn meta(&self) -> Option<TimeHorizonMeta> {
        self.get().map(|f| f.meta())
    }

    /// Interpolates the stored forecast at `future_time` steps.
    pub fn interpolate(&self, future_time: f64) -> Result<OccupancySnapshot, InterpolationError> {
        let forecast = self.get().ok_or(InterpolationError::NotReady)?;
        interpolate(&forecast, future_time)
    }
}

/// Occupancy distribution `future_time` steps ahead.
///
/// # Errors
/// * `InvalidTime` - negative or non-finite time
/// * `HorizonExceeded` - beyond `step_count`
pub fn interpolate(forecast: &Forecast, future_time: f64) -> Result<OccupancySnapshot, InterpolationError> {
    let step_count = forecast.meta().step_count;

    if !future_time.is_finite() || future_time < 0.0 {
        return Err(InterpolationError::InvalidTime(future_time));
    }
    if future_time > step_count as f64 {
        return Err(InterpolationError::HorizonExceeded {
            requested: future_time,
            step_count,
        });
    }

    let matrix = forecast.matrix();

    if let Some(step) = (0..=step_count).find(|&i| is_close(i as f64, future_time)) {
        return Ok(OccupancySnapshot {
            future_time,
            exact_step: Some(step),
            probabilities: DVector::from_iterator(
                matrix.num_cells(),
                matrix.as_matrix().row(step).iter().copied(),
            ),
        });
    }

    let t0 = future_time.floor() as usize;
    let t1 = t0 + 1;
    let alpha = (future_time - t0 as f64) / (t1 - t0) as f64;

    let probabilities = DVector::from_fn(matrix.num_cells(), |k, _| {
        let prev = matrix.prob(t0, k);
        let next = matrix.prob(t1, k);
        prev + (next - prev) * alpha
    });

    Ok(OccupancySnapshot {
        future_time,
        exact_step: None,
        probabilities,
    })
}

/// `|a - b| <= atol + rtol * |b|`, the usual floating-point snap test.
fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= STEP_ATOL + STEP_RTOL * b.abs()
}

/// Errors that can occur when querying the forecast in time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    #[error("No forecast has been computed yet")]
    NotReady,

    #[error("Invalid forecast time {0}: must be a non-negative number of steps")]
    InvalidTime(f64),

    #[error("Cannot interpolate {requested} steps ahead, horizon is {step_count}")]
    HorizonExceeded { requested: f64, step_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occucast_forecast::ForecastMatrix;
    use crate::occucast_space::GridCell;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn forecast_from(rows: &[Vec<f64>]) -> Forecast {
        Forecast::new(
            ForecastMatrix::from_rows(rows).unwrap(),
            TimeHorizonMeta {
                step_count: rows.len() - 1,
                delta_t: 0.5,
            },
            GridCell::new(0, 0),
            GridCell::new(0, 2),
        )
        .unwrap()
    }

    fn walking_right() -> Forecast {
        forecast_from(&[
            vec![1.0, 0.0, 0.0],
            vec![0.2, 0.8, 0.0],
            vec![0.0, 0.3, 0.7],
            vec![0.0, 0.0, 1.0],
        ])
    }

    #[test]
    fn test_empty_store_is_not_ready() {
        let store = ForecastStore::new();
        assert!(!store.is_ready());
        assert_eq!(store.generation(), 0);
        assert_eq!(store.interpolate(0.0), Err(InterpolationError::NotReady));
    }

    #[test]
    fn test_replace_swaps_whole_forecast() {
        let store = ForecastStore::new();
        store.replace(walking_right());
        let before = store.get().unwrap();

        store.replace(forecast_from(&[vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]]));

        // A reader holding the old snapshot keeps a consistent view
        assert_eq!(before.meta().step_count, 3);
        assert_eq!(store.meta().unwrap().step_count, 1);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_exact_steps_return_rows_unmodified() {
        let forecast = walking_right();
        for step in 0..=3 {
            let snap = interpolate(&forecast, step as f64).unwrap();
            assert_eq!(snap.exact_step, Some(step));
            assert_eq!(snap.probabilities.as_slice(), forecast.matrix().row_vec(step).as_slice());
        }
    }

    #[test]
    fn test_near_integer_snaps_to_step() {
        let forecast = walking_right();
        let snap = interpolate(&forecast, 2.0 + 1e-9).unwrap();
        assert_eq!(snap.exact_step, Some(2));

        let snap = interpolate(&forecast, 2.001).unwrap();
        assert_eq!(snap.exact_step, None);
    }

    #[test]
    fn test_midpoint_is_average_of_bounding_rows() {
        let snap = interpolate(&walking_right(), 1.5).unwrap();
        assert_relative_eq!(snap.probabilities[0], 0.1);
        assert_relative_eq!(snap.probabilities[1], 0.55);
        assert_relative_eq!(snap.probabilities[2], 0.35);
    }

    #[test]
    fn test_quarter_step_weighting() {
        let snap = interpolate(&walking_right(), 0.25).unwrap();
        assert_relative_eq!(snap.probabilities[0], 0.8);
        assert_relative_eq!(snap.probabilities[1], 0.2);
        assert_relative_eq!(snap.probabilities[2], 0.0);
    }

    #[test]
    fn test_horizon_boundaries() {
        let forecast = walking_right();
        assert_eq!(
            interpolate(&forecast, -0.01),
            Err(InterpolationError::InvalidTime(-0.01))
        );
        assert!(matches!(
            interpolate(&forecast, 3.01),
            Err(InterpolationError::HorizonExceeded { step_count: 3, .. })
        ));
        assert!(matches!(
            interpolate(&forecast, f64::NAN),
            Err(InterpolationError::InvalidTime(_))
        ));
        assert!(interpolate(&forecast, 3.0).is_ok());
        assert!(interpolate(&forecast, 0.0).is_ok());
    }

    proptest! {
        #[test]
        fn prop_interpolation_bounded_by_neighbours(
            rows in prop::collection::vec(prop::collection::vec(0.0f64..1.0, 6), 2..8),
            frac in 0.0f64..1.0,
            pick in 0usize..100,
        ) {
            let forecast = forecast_from(&rows);
            let t0 = pick % (rows.len() - 1);
            let t = t0 as f64 + frac;
            let snap = interpolate(&forecast, t).unwrap();

            for k in 0..6 {
                let lo = rows[t0][k].min(rows[t0 + 1][k]);
                let hi = rows[t0][k].max(rows[t0 + 1][k]);
                let value = snap.probabilities[k];
                prop_assert!(value >= lo - 1e-12 && value <= hi + 1e-12);
            }
        }

        #[test]
        fn prop_integer_queries_are_exact(
            rows in prop::collection::vec(prop::collection::vec(0.0f64..1.0, 4), 2..8),
            pick in 0usize..100,
        ) {
            let forecast = forecast_from(&rows);
            let step = pick % rows.len();
            let snap = interpolate(&forecast, step as f64).unwrap();
            prop_assert_eq!(snap.probabilities.as_slice(), rows[step].as_slice());
        }
    }
}
