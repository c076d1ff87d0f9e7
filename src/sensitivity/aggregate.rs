use tracing::debug;

use crate::models::{ConfidenceGrid, SENSITIVITY_GRID_SIZE, SensitivityGrid, UNSAMPLED};

/// Weights of the 4x4 window averaged into each sensitivity cell
pub const KERNEL: [[f64; 4]; 4] = [
    [0.1, 0.5, 0.5, 0.1],
    [0.5, 1.0, 1.0, 0.5],
    [0.5, 1.0, 1.0, 0.5],
    [0.1, 0.5, 0.5, 0.1],
];

/// Score drops smaller than this are treated as no drop at all.
/// Absorbs rounding in the weighted mean of identical scores.
const DROP_EPSILON: f64 = 1e-9;

/// Weighted mean of the 4x4 window whose top-left corner is (row, col).
/// Unsampled cells are left out of both sums; an empty window averages to 0.
pub fn window_mean(grid: &ConfidenceGrid, row: usize, col: usize) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;

    for (dr, weights) in KERNEL.iter().enumerate() {
        for (dc, &w) in weights.iter().enumerate() {
            match grid.get(row + dr, col + dc) {
                Some(score) if score != UNSAMPLED => {
                    total += score * w;
                    weight += w;
                }
                _ => {}
            }
        }
    }

    if weight > 0.0 { total / weight } else { 0.0 }
}

/// Turn occlusion scores into a normalized alpha grid.
///
/// `alpha = 1 - drop / max_drop` where `drop = baseline - mean` (floored at
/// 0) and `max_drop` comes from the lowest mean. With no drop anywhere every
/// cell is 1.0.
pub fn aggregate(grid: &ConfidenceGrid, baseline: f64) -> SensitivityGrid {
    let mut means = [[0.0; SENSITIVITY_GRID_SIZE]; SENSITIVITY_GRID_SIZE];
    let mut min_mean = f64::INFINITY;

    for (row, means_row) in means.iter_mut().enumerate() {
        for (col, mean) in means_row.iter_mut().enumerate() {
            *mean = window_mean(grid, row, col);
            min_mean = min_mean.min(*mean);
        }
    }

    let max_drop = score_drop(baseline, min_mean);
    debug!(baseline, min_mean, max_drop, "aggregated occlusion scores");

    if max_drop == 0.0 {
        return SensitivityGrid::uniform(1.0);
    }

    SensitivityGrid::from_fn(|row, col| 1.0 - score_drop(baseline, means[row][col]) / max_drop)
}

fn score_drop(baseline: f64, mean: f64) -> f64 {
    let drop = (baseline - mean).max(0.0);
    if drop <= DROP_EPSILON { 0.0 } else { drop }
}
