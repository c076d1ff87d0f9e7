use image::{DynamicImage, RgbaImage};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

/// Side length of the confidence grid, including the unsampled border
pub const CONFIDENCE_GRID_SIZE: usize = 17;

/// Side length of the aggregated sensitivity grid
pub const SENSITIVITY_GRID_SIZE: usize = 14;

/// Number of mask positions along each axis
pub const SAMPLE_POSITIONS: usize = 11;

/// Offset of the sampled block inside the confidence grid
pub const GRID_INSET: usize = 3;

/// Marker for a confidence cell without a score
pub const UNSAMPLED: f64 = -1.0;

/// A corner of a sensitivity grid cell (x = column, y = row)
pub type GridPoint = Point<u32>;

/// One (label, score) pair reported by a classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(alias = "class", alias = "className")]
    pub label: String,
    pub score: f64,
}

impl Classification {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Per-position classifier scores for one (image, label) round.
///
/// The sampled 11x11 block sits at `[3..=13]` on both axes; everything else
/// stays [`UNSAMPLED`] so the 4x4 aggregation window never leaves the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceGrid {
    cells: [[f64; CONFIDENCE_GRID_SIZE]; CONFIDENCE_GRID_SIZE],
}

impl ConfidenceGrid {
    pub fn new() -> Self {
        Self {
            cells: [[UNSAMPLED; CONFIDENCE_GRID_SIZE]; CONFIDENCE_GRID_SIZE],
        }
    }

    /// Build a grid by asking `score` for every sampled position
    pub fn from_samples(mut score: impl FnMut(usize, usize) -> Option<f64>) -> Self {
        let mut grid = Self::new();
        for row in 0..SAMPLE_POSITIONS {
            for col in 0..SAMPLE_POSITIONS {
                if let Some(value) = score(row, col) {
                    grid.set_sample(row, col, value);
                }
            }
        }
        grid
    }

    /// Raw cell value in grid coordinates (border included)
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Store the score for mask position (row, col); out-of-range positions are ignored
    pub fn set_sample(&mut self, row: usize, col: usize, score: f64) {
        if row >= SAMPLE_POSITIONS || col >= SAMPLE_POSITIONS {
            return;
        }
        if let Some(cell) = self
            .cells
            .get_mut(row + GRID_INSET)
            .and_then(|r| r.get_mut(col + GRID_INSET))
        {
            *cell = score;
        }
    }

    /// Score stored for mask position (row, col), if it was sampled
    pub fn sample(&self, row: usize, col: usize) -> Option<f64> {
        if row >= SAMPLE_POSITIONS || col >= SAMPLE_POSITIONS {
            return None;
        }
        self.get(row + GRID_INSET, col + GRID_INSET)
            .filter(|&value| value != UNSAMPLED)
    }

    pub fn sampled_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|&&value| value != UNSAMPLED)
            .count()
    }

    pub fn rows(&self) -> &[[f64; CONFIDENCE_GRID_SIZE]; CONFIDENCE_GRID_SIZE] {
        &self.cells
    }
}

impl Default for ConfidenceGrid {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized alpha per cell: 1.0 = occlusion did not matter, 0.0 = most damaging region
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityGrid {
    cells: [[f64; SENSITIVITY_GRID_SIZE]; SENSITIVITY_GRID_SIZE],
}

impl SensitivityGrid {
    /// Build a grid from a per-cell function. Values are clamped to `[0, 1]`
    /// and NaN becomes 1.0.
    pub fn from_fn(mut alpha: impl FnMut(usize, usize) -> f64) -> Self {
        let mut cells = [[1.0; SENSITIVITY_GRID_SIZE]; SENSITIVITY_GRID_SIZE];
        for (row, cells_row) in cells.iter_mut().enumerate() {
            for (col, cell) in cells_row.iter_mut().enumerate() {
                *cell = clamp_alpha(alpha(row, col));
            }
        }
        Self { cells }
    }

    pub fn uniform(alpha: f64) -> Self {
        Self::from_fn(|_, _| alpha)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Whether (row, col) is on the grid and at or below `threshold`
    pub fn is_inside(&self, row: usize, col: usize, threshold: f64) -> bool {
        self.get(row, col).is_some_and(|alpha| alpha <= threshold)
    }

    pub fn rows(&self) -> &[[f64; SENSITIVITY_GRID_SIZE]; SENSITIVITY_GRID_SIZE] {
        &self.cells
    }

    pub fn min(&self) -> f64 {
        self.cells.iter().flatten().copied().fold(1.0, f64::min)
    }

    /// Position of the lowest alpha (first in row-major order on ties)
    pub fn argmin(&self) -> (usize, usize) {
        let mut best = (0, 0);
        let mut best_alpha = f64::INFINITY;
        for (row, cells_row) in self.cells.iter().enumerate() {
            for (col, &alpha) in cells_row.iter().enumerate() {
                if alpha < best_alpha {
                    best_alpha = alpha;
                    best = (row, col);
                }
            }
        }
        best
    }
}

fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() {
        1.0
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

/// Closed outline around a below-threshold region, in grid corner coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<GridPoint>,
}

impl Contour {
    pub fn new(points: Vec<GridPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.points.len() > 1 && self.points.first() == self.points.last()
    }

    /// (min_x, min_y, max_x, max_y) of the corner points
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        ))
    }

    pub fn width(&self) -> u32 {
        self.bounds().map_or(0, |(min_x, _, max_x, _)| max_x - min_x)
    }

    pub fn height(&self) -> u32 {
        self.bounds().map_or(0, |(_, min_y, _, max_y)| max_y - min_y)
    }

    /// Enclosed area in grid cells (shoelace formula)
    pub fn area(&self) -> f64 {
        let twice: i64 = self
            .points
            .windows(2)
            .map(|w| {
                let (a, b) = (w[0], w[1]);
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    /// Points mapped to display space: `x * scale`, `y * scale + offset`
    pub fn to_display(&self, scale: f32, offset: f32) -> Vec<(f32, f32)> {
        self.points
            .iter()
            .map(|p| (p.x as f32 * scale, p.y as f32 * scale + offset))
            .collect()
    }
}

/// Rendered result of one round, plus the data it was drawn from
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub label: String,
    pub baseline: f64,
    pub alpha: SensitivityGrid,
    pub contours: Vec<Contour>,
    pub fill: RgbaImage,
    pub outline: RgbaImage,
}

impl Heatmap {
    /// Fill and outline layered over `source` (resized to the heatmap if needed)
    pub fn composite(&self, source: &DynamicImage) -> RgbaImage {
        let (width, height) = self.fill.dimensions();
        let mut base = source.to_rgba8();
        if base.dimensions() != (width, height) {
            base = image::imageops::resize(
                &base,
                width,
                height,
                image::imageops::FilterType::Triangle,
            );
        }
        image::imageops::overlay(&mut base, &self.fill, 0, 0);
        image::imageops::overlay(&mut base, &self.outline, 0, 0);
        base
    }
}

/// Shorten `label` to `max` characters by cutting out the middle.
/// The cut is replaced with "...", so the result is `max + 3` characters long.
pub fn truncate_label(label: &str, max: usize) -> String {
    let count = label.chars().count();
    if count <= max {
        return label.to_string();
    }
    let head = max / 2;
    let tail = max - head;
    let mut out: String = label.chars().take(head).collect();
    out.push_str("...");
    out.extend(label.chars().skip(count - tail));
    out
}
