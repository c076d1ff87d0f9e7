#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, Rgba, RgbaImage};
use occlusion_heatmap::{Classification, Classifier, ConfidenceGrid, SensitivityGrid};

pub const LABEL: &str = "cat";
pub const MASK: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Pixel square the fake classifier "looks at": [96, 128) on both axes
pub const TARGET_START: u32 = 96;
pub const TARGET_END: u32 = 128;

/// Gray 224x224 image with a red target square
pub fn create_test_image() -> RgbaImage {
    RgbaImage::from_fn(224, 224, |x, y| {
        let in_target = (TARGET_START..TARGET_END).contains(&x)
            && (TARGET_START..TARGET_END).contains(&y);
        if in_target {
            Rgba([220, 30, 30, 255])
        } else {
            Rgba([120, 120, 120, 255])
        }
    })
}

pub fn create_test_dynamic_image() -> DynamicImage {
    DynamicImage::ImageRgba8(create_test_image())
}

/// Share of the target square covered by the magenta mask
pub fn masked_target_fraction(image: &RgbaImage) -> f64 {
    let mut covered = 0u32;
    for y in TARGET_START..TARGET_END {
        for x in TARGET_START..TARGET_END {
            if *image.get_pixel(x, y) == MASK {
                covered += 1;
            }
        }
    }
    let side = TARGET_END - TARGET_START;
    covered as f64 / (side * side) as f64
}

/// Top-left corner of the magenta mask, if any
pub fn mask_origin(image: &RgbaImage) -> Option<(u32, u32)> {
    image
        .enumerate_pixels()
        .find(|(_, _, p)| **p == MASK)
        .map(|(x, y, _)| (x, y))
}

/// Fake classifier: confident about "cat" unless the target square is hidden
pub fn target_classifier() -> Arc<dyn Classifier> {
    Arc::new(|image: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
        let score = 0.9 - 0.8 * masked_target_fraction(image);
        Ok(vec![
            Classification::new("dog", 0.05),
            Classification::new(LABEL, score),
        ])
    })
}

/// Counts classify calls; always reports a constant score
pub struct CountingClassifier {
    pub calls: AtomicUsize,
    pub score: f64,
}

impl CountingClassifier {
    pub fn new(score: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            score,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for CountingClassifier {
    fn classify(&self, _image: &RgbaImage) -> anyhow::Result<Vec<Classification>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Classification::new(LABEL, self.score)])
    }
}

/// Confidence grid with every sampled cell set to `score`
pub fn uniform_confidence_grid(score: f64) -> ConfidenceGrid {
    ConfidenceGrid::from_samples(|_, _| Some(score))
}

/// Sampled cells at `base`, except a 4x4 block of positions starting at (row, col) set to `low`
pub fn block_confidence_grid(base: f64, low: f64, row: usize, col: usize) -> ConfidenceGrid {
    ConfidenceGrid::from_samples(|r, c| {
        let in_block = (row..row + 4).contains(&r) && (col..col + 4).contains(&c);
        Some(if in_block { low } else { base })
    })
}

/// Sensitivity grid from a picture: '#' is alpha 0.0, anything else 1.0.
/// Missing rows and columns are 1.0.
pub fn grid_from_mask(rows: &[&str]) -> SensitivityGrid {
    SensitivityGrid::from_fn(|row, col| {
        let marked = rows
            .get(row)
            .and_then(|line| line.chars().nth(col))
            .is_some_and(|ch| ch == '#');
        if marked { 0.0 } else { 1.0 }
    })
}
