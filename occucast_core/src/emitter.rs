//! Snapshot emission - forecasts and snapshots into outbound messages
//!
//! Two consumers are served:
//! - planners downstream get the whole discrete time series as one
//!   [`OccupancyGridTime`] message per update
//! - visualization gets one colored cube per cell whose (interpolated)
//!   probability clears the threshold, plus fixed start/goal spheres

use crate::occucast_forecast::Forecast;
use crate::occucast_space::{GridCell, GridGeometry, Position, StateIndex};
use occucast_env::{Marker, MarkerShape, NodeId, OccupancyGridTime, ProbabilityGrid, Rgba};

/// One above-threshold cell of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotCell {
    pub index: StateIndex,
    /// `to_real` of the cell
    pub position: Position,
    pub probability: f64,
}

/// Converts forecasts and snapshots into wire messages and markers.
#[derive(Debug, Clone)]
pub struct SnapshotEmitter {
    geometry: GridGeometry,

    /// Node id stamped on every grid message
    source: NodeId,

    /// Height of occupancy cubes (real units)
    human_height: f64,

    /// Context time of the first emission (seconds)
    session_start: Option<f64>,
}

impl SnapshotEmitter {
    pub fn new(geometry: GridGeometry, source: NodeId, human_height: f64) -> Self {
        Self {
            geometry,
            source,
            human_height,
            session_start: None,
        }
    }

    pub fn session_start(&self) -> Option<f64> {
        self.session_start
    }

    /// Builds the outbound message for steps `0..step_count` of `forecast`.
    ///
    /// The first call fixes the session start to `now_secs`; every record's
    /// stamp is `(now_secs - session_start) + step * delta_t`.
    pub fn to_external_grid(&mut self, forecast: &Forecast, now_secs: f64) -> OccupancyGridTime {
        let session_start = *self.session_start.get_or_insert(now_secs);
        let issued = now_secs - session_start;

        let meta = forecast.meta();
        let origin = self.geometry.to_real(GridCell::new(0, 0));

        let grids = (0..meta.step_count)
            .map(|step| {
                let capture_time_offset = step as f64 * meta.delta_t;
                ProbabilityGrid {
                    step,
                    capture_time_offset,
                    stamp: issued + capture_time_offset,
                    resolution: self.geometry.resolution(),
                    width: self.geometry.real_width(),
                    height: self.geometry.real_height(),
                    origin: [origin.x, origin.y],
                    data: forecast.matrix().row_vec(step),
                }
            })
            .collect();

        OccupancyGridTime {
            source: self.source,
            session_start,
            grids,
        }
    }

    /// Cells of `distribution` strictly above `threshold`, in index order.
    ///
    /// Lazy and single-pass; call again to regenerate. `distribution` holds
    /// one probability per state index and must not be longer than the grid.
    pub fn hot_cells<'a>(
        &'a self,
        distribution: &'a [f64],
        threshold: f64,
    ) -> impl Iterator<Item = HotCell> + 'a {
        debug_assert!(
            distribution.len() <= self.geometry.num_cells(),
            "distribution has {} entries, grid has {} cells",
            distribution.len(),
            self.geometry.num_cells()
        );
        distribution
            .iter()
            .enumerate()
            .filter(move |(_, p)| **p > threshold)
            .filter_map(move |(k, p)| {
                let index = StateIndex(k);
                let cell = self.geometry.index_to_cell(index).ok()?;
                Some(HotCell {
                    index,
                    position: self.geometry.to_real(cell),
                    probability: *p,
                })
            })
    }

    /// `(position, probability)` pairs for every cell above `threshold`.
    pub fn to_thresholded_snapshot<'a>(
        &'a self,
        distribution: &'a [f64],
        threshold: f64,
    ) -> impl Iterator<Item = (Position, f64)> + 'a {
        self.hot_cells(distribution, threshold)
            .map(|hot| (hot.position, hot.probability))
    }

    /// Sphere marking a fixed reference point (start or goal).
    pub fn reference_marker(&self, position: Position, color: Rgba) -> Marker {
        let res = self.geometry.resolution();
        Marker {
            id: 0,
            shape: MarkerShape::Sphere,
            position: [position.x, position.y, 0.0],
            scale: [res, res, res],
            color,
        }
    }

    /// Translucent box outlining the monitored volume.
    pub fn workspace_marker(&self) -> Marker {
        let w = self.geometry.real_width();
        let h = self.geometry.real_height();
        let depth = w / 2.0;
        Marker {
            id: 0,
            shape: MarkerShape::Cube,
            position: [0.0, 0.0, depth / 2.0],
            scale: [w, h, depth],
            color: Rgba::new(0.3, 0.7, 0.7, 0.3),
        }
    }

    /// Cube for one above-threshold cell. Ids start at 1, 0 is the workspace.
    ///
    /// Green fades as probability rises, so likely cells read red.
    pub fn occupancy_marker(&self, hot: &HotCell) -> Marker {
        let res = self.geometry.resolution();
        let p = hot.probability.clamp(0.0, 1.0) as f32;
        Marker {
            id: hot.index.get() as u32 + 1,
            shape: MarkerShape::Cube,
            position: [hot.position.x, hot.position.y, self.human_height / 2.0],
            scale: [res, res, self.human_height],
            color: Rgba::new(1.0, 1.0 - p, 0.0, 0.4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occucast_forecast::{ForecastMatrix, TimeHorizonMeta};
    use approx::assert_relative_eq;

    fn geometry() -> GridGeometry {
        GridGeometry::new(2, 3, 0.5, [-0.75, -0.5], [0.75, 0.5]).unwrap()
    }

    fn emitter() -> SnapshotEmitter {
        SnapshotEmitter::new(geometry(), NodeId::from_seed(7), 1.8)
    }

    fn forecast() -> Forecast {
        let rows = vec![
            vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.5, 0.5, 0.0, 0.0, 0.0],
        ];
        Forecast::new(
            ForecastMatrix::from_rows(&rows).unwrap(),
            TimeHorizonMeta {
                step_count: 2,
                delta_t: 0.25,
            },
            GridCell::new(0, 0),
            GridCell::new(1, 2),
        )
        .unwrap()
    }

    #[test]
    fn test_external_grid_has_one_record_per_step() {
        let mut emitter = emitter();
        let msg = emitter.to_external_grid(&forecast(), 10.0);

        assert_eq!(msg.len(), 2);
        assert_eq!(msg.session_start, 10.0);
        for (i, grid) in msg.grids.iter().enumerate() {
            assert_eq!(grid.step, i);
            assert_relative_eq!(grid.capture_time_offset, i as f64 * 0.25);
            assert_eq!(grid.data.len(), 6);
            assert_relative_eq!(grid.resolution, 0.5);
            assert_relative_eq!(grid.width, 1.5);
            assert_relative_eq!(grid.height, 1.0);
            assert_eq!(grid.origin, [-0.75, -0.5]);
        }
        assert_eq!(msg.grids[1].data, vec![0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_session_start_fixed_by_first_emission() {
        let mut emitter = emitter();
        emitter.to_external_grid(&forecast(), 10.0);
        let msg = emitter.to_external_grid(&forecast(), 12.0);

        assert_eq!(emitter.session_start(), Some(10.0));
        assert_relative_eq!(msg.grids[0].stamp, 2.0);
        assert_relative_eq!(msg.grids[1].stamp, 2.25);
    }

    #[test]
    fn test_thresholded_snapshot_yields_only_hot_cells() {
        let emitter = emitter();
        let geo = geometry();
        let distribution = [0.05, 0.35, 0.3, 0.4, 0.9, 0.0];

        let pairs: Vec<_> = emitter.to_thresholded_snapshot(&distribution, 0.3).collect();

        // 0.3 itself is not strictly above the threshold
        assert_eq!(pairs.len(), 3);
        for ((pos, p), k) in pairs.iter().zip([1usize, 3, 4]) {
            assert!(*p > 0.3);
            let cell = geo.index_to_cell(StateIndex(k)).unwrap();
            assert_eq!(*pos, geo.to_real(cell));
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "grid has 6 cells")]
    fn test_distribution_longer_than_grid_is_caught() {
        let distribution = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let _ = emitter().hot_cells(&distribution, 0.5).count();
    }

    #[test]
    fn test_occupancy_marker_color_tracks_probability() {
        let emitter = emitter();
        let low = emitter.occupancy_marker(&HotCell {
            index: StateIndex(2),
            position: Position::new(0.25, -0.5),
            probability: 0.2,
        });
        let high = emitter.occupancy_marker(&HotCell {
            index: StateIndex(3),
            position: Position::new(-0.75, 0.0),
            probability: 0.9,
        });

        assert_eq!(low.id, 3);
        assert!(high.color.g < low.color.g);
        assert_eq!(high.color.r, 1.0);
        assert_relative_eq!(high.scale[2], 1.8);
        assert_relative_eq!(high.scale[0], 0.5);
    }

    #[test]
    fn test_reference_marker_sized_by_resolution() {
        let marker = emitter().reference_marker(Position::new(0.1, 0.2), Rgba::GREEN);
        assert_eq!(marker.shape, MarkerShape::Sphere);
        assert_eq!(marker.scale, [0.5, 0.5, 0.5]);
        assert_eq!(marker.position, [0.1, 0.2, 0.0]);
    }
}
