//! The "SPACE" Engine - real-world frame ↔ simulation grid ↔ state index
//!
//! The monitored workspace is a rectangle centred on the world origin. It is
//! discretized into `height × width` square cells of side `resolution`, and
//! each cell is addressed by a row-major state index for the inference
//! collaborator:
//!
//! ```text
//!   y ▲            col →
//!     │   row 2 │ 10 │ 11 │ ...
//!     │   row 1 │  5 │  6 │ ...
//!     │   row 0 │  0 │  1 │ ...
//!     └──────────────────────▶ x
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in the real-world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A grid cell. May lie outside the grid until it is validated by
/// [`GridGeometry::cell_to_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i64,
    pub col: i64,
}

impl GridCell {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Row-major linear address of a valid grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateIndex(pub usize);

impl StateIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable geometry of the monitored workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Number of rows (cells along y)
    height: usize,

    /// Number of columns (cells along x)
    width: usize,

    /// Real units per cell
    resolution: f64,

    /// Real-world lower corner [x, y]
    lower: [f64; 2],

    /// Real-world upper corner [x, y]
    upper: [f64; 2],
}

impl GridGeometry {
    /// Creates a validated geometry.
    ///
    /// # Arguments
    /// * `height` - Number of rows
    /// * `width` - Number of columns
    /// * `resolution` - Real units per cell, must be positive
    /// * `lower` / `upper` - Corners of the monitored area
    pub fn new(
        height: usize,
        width: usize,
        resolution: f64,
        lower: [f64; 2],
        upper: [f64; 2],
    ) -> Result<Self, SpaceError> {
        if height == 0 || width == 0 {
            return Err(SpaceError::InvalidGeometry(format!(
                "grid must have at least one cell, got {}x{}",
                height, width
            )));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(SpaceError::InvalidGeometry(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        for axis in 0..2 {
            if !(lower[axis].is_finite() && upper[axis].is_finite() && upper[axis] > lower[axis]) {
                return Err(SpaceError::InvalidGeometry(format!(
                    "upper bound {:?} must exceed lower bound {:?}",
                    upper, lower
                )));
            }
        }
        Ok(Self {
            height,
            width,
            resolution,
            lower,
            upper,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Total number of cells (`height * width`).
    pub fn num_cells(&self) -> usize {
        self.height * self.width
    }

    /// Real-world extent along x.
    pub fn real_width(&self) -> f64 {
        self.upper[0] - self.lower[0]
    }

    /// Real-world extent along y.
    pub fn real_height(&self) -> f64 {
        self.upper[1] - self.lower[1]
    }

    /// Maps a real-world position to its (possibly out-of-range) cell.
    ///
    /// No clamping is performed. Non-finite input saturates, so use
    /// [`locate`](Self::locate) when the input is untrusted.
    pub fn to_grid(&self, pos: Position) -> GridCell {
        let col = ((pos.x + self.real_width() / 2.0) / self.resolution).floor();
        let row = ((pos.y + self.real_height() / 2.0) / self.resolution).floor();
        GridCell::new(row as i64, col as i64)
    }

    /// Maps a cell back to the real-world position of its reference corner.
    pub fn to_real(&self, cell: GridCell) -> Position {
        Position::new(
            cell.col as f64 * self.resolution - self.real_width() / 2.0,
            cell.row as f64 * self.resolution - self.real_height() / 2.0,
        )
    }

    /// Returns true if the cell lies inside `[0, height) × [0, width)`.
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as u64) < self.height as u64
            && (cell.col as u64) < self.width as u64
    }

    /// Maps a real-world position to a validated in-grid cell.
    pub fn locate(&self, pos: Position) -> Result<GridCell, SpaceError> {
        if !pos.is_finite() {
            return Err(SpaceError::NonFinitePosition(pos));
        }
        let cell = self.to_grid(pos);
        if self.contains(cell) {
            Ok(cell)
        } else {
            Err(SpaceError::CellOutOfRange(cell))
        }
    }

    /// Row-major state index of an in-grid cell.
    pub fn cell_to_index(&self, cell: GridCell) -> Result<StateIndex, SpaceError> {
        if !self.contains(cell) {
            return Err(SpaceError::CellOutOfRange(cell));
        }
        Ok(StateIndex(cell.row as usize * self.width + cell.col as usize))
    }

    /// Inverse of [`cell_to_index`](Self::cell_to_index).
    pub fn index_to_cell(&self, index: StateIndex) -> Result<GridCell, SpaceError> {
        if index.0 >= self.num_cells() {
            return Err(SpaceError::IndexOutOfRange {
                index: index.0,
                num_cells: self.num_cells(),
            });
        }
        Ok(GridCell::new(
            (index.0 / self.width) as i64,
            (index.0 % self.width) as i64,
        ))
    }
}

/// Errors raised by grid geometry conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error("Invalid grid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Cell {0} lies outside the grid")]
    CellOutOfRange(GridCell),

    #[error("State index {index} out of range for {num_cells} cells")]
    IndexOutOfRange { index: usize, num_cells: usize },

    #[error("Position {0:?} is not finite")]
    NonFinitePosition(Position),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn workspace() -> GridGeometry {
        GridGeometry::new(10, 10, 1.0, [-5.0, -5.0], [5.0, 5.0]).unwrap()
    }

    #[test]
    fn test_geometry_rejects_bad_parameters() {
        assert!(GridGeometry::new(0, 10, 1.0, [-5.0, -5.0], [5.0, 5.0]).is_err());
        assert!(GridGeometry::new(10, 10, 0.0, [-5.0, -5.0], [5.0, 5.0]).is_err());
        assert!(GridGeometry::new(10, 10, -1.0, [-5.0, -5.0], [5.0, 5.0]).is_err());
        assert!(GridGeometry::new(10, 10, 1.0, [5.0, -5.0], [-5.0, 5.0]).is_err());
    }

    #[test]
    fn test_to_grid_corner_cells() {
        let geo = workspace();
        assert_eq!(geo.to_grid(Position::new(-4.5, -4.5)), GridCell::new(0, 0));
        assert_eq!(geo.to_grid(Position::new(4.5, 4.5)), GridCell::new(9, 9));
        // x selects the column, y selects the row
        assert_eq!(geo.to_grid(Position::new(4.5, -4.5)), GridCell::new(0, 9));
    }

    #[test]
    fn test_to_grid_does_not_clamp() {
        let geo = workspace();
        let cell = geo.to_grid(Position::new(-5.5, 7.2));
        assert_eq!(cell, GridCell::new(12, -1));
        assert!(!geo.contains(cell));
        assert_eq!(geo.cell_to_index(cell), Err(SpaceError::CellOutOfRange(cell)));
    }

    #[test]
    fn test_to_real_returns_cell_corner() {
        let geo = workspace();
        let p = geo.to_real(GridCell::new(0, 0));
        assert_relative_eq!(p.x, -5.0);
        assert_relative_eq!(p.y, -5.0);

        let p = geo.to_real(GridCell::new(9, 3));
        assert_relative_eq!(p.x, -2.0);
        assert_relative_eq!(p.y, 4.0);
    }

    #[test]
    fn test_row_major_indexing() {
        let geo = GridGeometry::new(4, 6, 0.5, [-1.5, -1.0], [1.5, 1.0]).unwrap();
        assert_eq!(geo.cell_to_index(GridCell::new(0, 0)).unwrap(), StateIndex(0));
        assert_eq!(geo.cell_to_index(GridCell::new(1, 0)).unwrap(), StateIndex(6));
        assert_eq!(geo.cell_to_index(GridCell::new(3, 5)).unwrap(), StateIndex(23));
        assert!(geo.index_to_cell(StateIndex(24)).is_err());
    }

    #[test]
    fn test_locate_rejects_nan_and_outside() {
        let geo = workspace();
        assert!(matches!(
            geo.locate(Position::new(f64::NAN, 0.0)),
            Err(SpaceError::NonFinitePosition(_))
        ));
        assert!(matches!(
            geo.locate(Position::new(6.0, 0.0)),
            Err(SpaceError::CellOutOfRange(_))
        ));
        assert_eq!(geo.locate(Position::new(0.1, -0.1)).unwrap(), GridCell::new(4, 5));
    }

    proptest! {
        #[test]
        fn prop_cell_index_bijection(h in 1usize..40, w in 1usize..40, r in 0usize..40, c in 0usize..40) {
            let geo = GridGeometry::new(h, w, 0.25, [-1.0, -1.0], [1.0, 1.0]).unwrap();
            let cell = GridCell::new((r % h) as i64, (c % w) as i64);
            let idx = geo.cell_to_index(cell).unwrap();
            prop_assert_eq!(geo.index_to_cell(idx).unwrap(), cell);
        }

        #[test]
        fn prop_index_cell_bijection(h in 1usize..40, w in 1usize..40, i in 0usize..1600) {
            let geo = GridGeometry::new(h, w, 0.25, [-1.0, -1.0], [1.0, 1.0]).unwrap();
            let idx = StateIndex(i % geo.num_cells());
            let cell = geo.index_to_cell(idx).unwrap();
            prop_assert_eq!(geo.cell_to_index(cell).unwrap(), idx);
        }

        #[test]
        fn prop_round_trip_within_one_cell(x in -4.999f64..4.999, y in -4.999f64..4.999) {
            let geo = workspace();
            let p = Position::new(x, y);
            let back = geo.to_real(geo.to_grid(p));
            prop_assert!((back.x - p.x).abs() <= geo.resolution());
            prop_assert!((back.y - p.y).abs() <= geo.resolution());
        }
    }
}
