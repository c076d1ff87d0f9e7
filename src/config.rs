use std::path::Path;

use anyhow::Context;
use image::{Rgb, Rgba};
use serde::{Deserialize, Serialize};

use crate::error::HeatmapError;
use crate::models::SAMPLE_POSITIONS;
use crate::sensitivity::render::{OutlineStyle, Stroke};

/// Tunables for one heatmap round.
///
/// Grid dimensions are fixed; only the pixel geometry of the masks, the
/// contour threshold and the colors are configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Side of the square image the classifier sees
    pub analysis_size: u32,
    /// Pixels between neighbouring mask positions
    pub step: u32,
    /// Side of the square occluding mask
    pub mask_size: u32,
    /// Alpha at or below which a cell counts as sensitive
    pub threshold: f64,
    pub mask_color: [u8; 3],
    pub fill_color: [u8; 3],
    pub halo_width: f32,
    pub halo_color: [u8; 4],
    pub line_width: f32,
    pub line_color: [u8; 4],
    /// Upper bound on classifier calls in flight (None = all at once)
    pub max_concurrency: Option<usize>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            analysis_size: 224,
            step: 16,
            mask_size: 64,
            threshold: 0.5,
            mask_color: [255, 0, 255],
            fill_color: [0, 0, 0],
            halo_width: 8.0,
            halo_color: [0, 0, 0, 102],
            line_width: 6.0,
            line_color: [255, 255, 255, 255],
            max_concurrency: None,
        }
    }
}

impl HeatmapConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| HeatmapError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), HeatmapError> {
        let invalid = |msg: String| Err(HeatmapError::InvalidConfig(msg));

        if self.analysis_size == 0 || self.step == 0 || self.mask_size == 0 {
            return invalid("analysis_size, step and mask_size must be non-zero".into());
        }
        if self.mask_size < self.step {
            return invalid(format!(
                "mask_size ({}) must be at least step ({})",
                self.mask_size, self.step
            ));
        }
        let reach = self.step as u64 * (SAMPLE_POSITIONS as u64 - 1) + self.mask_size as u64;
        if reach > self.analysis_size as u64 {
            return invalid(format!(
                "last mask ends at {}px, past analysis_size {}px",
                reach, self.analysis_size
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return invalid(format!("threshold {} is outside [0, 1]", self.threshold));
        }
        for (name, width) in [("halo_width", self.halo_width), ("line_width", self.line_width)] {
            if !width.is_finite() || width <= 0.0 {
                return invalid(format!("{} must be a positive number", name));
            }
        }
        if self.max_concurrency == Some(0) {
            return invalid("max_concurrency must be at least 1".into());
        }
        Ok(())
    }

    pub fn mask_rgba(&self) -> Rgba<u8> {
        let [r, g, b] = self.mask_color;
        Rgba([r, g, b, 255])
    }

    pub fn fill_rgb(&self) -> Rgb<u8> {
        Rgb(self.fill_color)
    }

    pub fn outline_style(&self) -> OutlineStyle {
        OutlineStyle {
            halo: Stroke {
                width: self.halo_width,
                color: Rgba(self.halo_color),
            },
            line: Stroke {
                width: self.line_width,
                color: Rgba(self.line_color),
            },
        }
    }
}
