pub mod aggregate;
pub mod outline;
pub mod preprocessing;
pub mod render;
pub mod sampler;

use crate::models::{ConfidenceGrid, Contour, SensitivityGrid};

/// Alpha grid and outlines for a finished sampling round.
/// Pure; safe to call from whichever thread owns the output surface.
pub fn analyze(
    grid: &ConfidenceGrid,
    baseline: f64,
    threshold: f64,
) -> (SensitivityGrid, Vec<Contour>) {
    let alpha = aggregate::aggregate(grid, baseline);
    let contours = outline::trace(&alpha, threshold);
    (alpha, contours)
}
