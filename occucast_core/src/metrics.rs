//! Occucast Metrics Module
//! =======================
//!
//! Summary statistics of an occupancy snapshot, used for debug logging and
//! for the simulator's exported frames:
//! - **Mass**: sum of cell probabilities (1 for a stored step, roughly 1
//!   for an interpolated snapshot)
//! - **Entropy**: how spread out the prediction is (bits)
//! - **Peak**: the single most likely cell
//! - **Expected position**: probability-weighted mean of cell centres

use crate::occucast_space::{GridGeometry, Position, StateIndex};
use serde::{Deserialize, Serialize};

/// Metrics calculated for one occupancy snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Sum of all cell probabilities
    pub total_mass: f64,
    /// Shannon entropy of the normalized distribution (bits)
    pub entropy_bits: f64,
    /// Most likely cell and its probability
    pub peak: Option<(StateIndex, f64)>,
    /// Probability-weighted mean of cell centres
    pub expected_position: Option<Position>,
    /// Cells strictly above the visualization threshold
    pub cells_above_threshold: usize,
}

// =============================================================================
// ENTROPY
// =============================================================================

/// Shannon entropy (bits) of a probability vector, normalized by its mass.
///
/// Zero-probability cells contribute nothing; an all-zero vector has zero
/// entropy.
pub fn entropy_bits(probabilities: &[f64]) -> f64 {
    let mass: f64 = probabilities.iter().filter(|p| **p > 0.0).sum();
    if mass <= 0.0 {
        return 0.0;
    }
    probabilities
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| {
            let q = p / mass;
            -q * q.log2()
        })
        .sum()
}

// =============================================================================
// SNAPSHOT SUMMARY
// =============================================================================

/// Computes [`SnapshotStats`] for a distribution over `geometry`'s cells.
pub fn snapshot_stats(probabilities: &[f64], geometry: &GridGeometry, threshold: f64) -> SnapshotStats {
    let total_mass: f64 = probabilities.iter().sum();

    let peak = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(k, p)| (StateIndex(k), p));

    let half = geometry.resolution() / 2.0;
    let mut weighted = [0.0f64; 2];
    let mut weight = 0.0;
    for (k, p) in probabilities.iter().enumerate() {
        if *p <= 0.0 {
            continue;
        }
        if let Ok(cell) = geometry.index_to_cell(StateIndex(k)) {
            let corner = geometry.to_real(cell);
            weighted[0] += p * (corner.x + half);
            weighted[1] += p * (corner.y + half);
            weight += p;
        }
    }
    let expected_position = (weight > 0.0)
        .then(|| Position::new(weighted[0] / weight, weighted[1] / weight));

    SnapshotStats {
        total_mass,
        entropy_bits: entropy_bits(probabilities),
        peak,
        expected_position,
        cells_above_threshold: probabilities.iter().filter(|p| **p > threshold).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry() -> GridGeometry {
        GridGeometry::new(2, 2, 1.0, [-1.0, -1.0], [1.0, 1.0]).unwrap()
    }

    #[test]
    fn test_entropy_of_point_mass_is_zero() {
        assert_relative_eq!(entropy_bits(&[0.0, 1.0, 0.0, 0.0]), 0.0);
        assert_relative_eq!(entropy_bits(&[0.0; 4]), 0.0);
    }

    #[test]
    fn test_entropy_of_uniform_is_log2_n() {
        assert_relative_eq!(entropy_bits(&[0.25; 4]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_snapshot_stats() {
        // Cells 0 and 3 are opposite corners of the 2x2 grid
        let stats = snapshot_stats(&[0.5, 0.0, 0.0, 0.5], &geometry(), 0.3);

        assert_relative_eq!(stats.total_mass, 1.0);
        assert_relative_eq!(stats.entropy_bits, 1.0, epsilon = 1e-12);
        assert_eq!(stats.cells_above_threshold, 2);

        let centre = stats.expected_position.unwrap();
        assert_relative_eq!(centre.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(centre.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_peak_picks_most_likely_cell() {
        let stats = snapshot_stats(&[0.1, 0.6, 0.2, 0.1], &geometry(), 0.5);
        assert_eq!(stats.peak, Some((StateIndex(1), 0.6)));
        assert_eq!(stats.cells_above_threshold, 1);
    }
}
