use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, GenericImageView, RgbaImage};
use tracing::{debug, info};

use crate::cache::HeatmapCache;
use crate::classifier::{Classifier, find_label_score};
use crate::config::HeatmapConfig;
use crate::error::HeatmapError;
use crate::models::Heatmap;
use crate::sensitivity::preprocessing::{crop_to_center, mask_at};
use crate::sensitivity::render::{render_fill, render_outline};
use crate::sensitivity::{analyze, sampler};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    fn save(&self, relative: impl AsRef<Path>, image: &RgbaImage) -> Result<()> {
        let path = self.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save debug image: {}", e))?;
        debug!("saved debug image {}", path.display());
        Ok(())
    }
}

/// Occlusion heatmap builder: crop, sample, aggregate, trace, render.
///
/// Holds the current source image and caches one heatmap per label for it.
pub struct HeatmapPipeline {
    classifier: Arc<dyn Classifier>,
    config: HeatmapConfig,
    debug: Option<DebugConfig>,
    source: Option<Arc<DynamicImage>>,
    cache: HeatmapCache,
}

impl HeatmapPipeline {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            config: HeatmapConfig::default(),
            debug: None,
            source: None,
            cache: HeatmapCache::new(),
        }
    }

    pub fn with_config(mut self, config: HeatmapConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });

        Ok(self)
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn cache(&self) -> &HeatmapCache {
        &self.cache
    }

    /// Replace the image being explained. Drops every cached heatmap.
    pub fn set_source_image(&mut self, image: DynamicImage) {
        self.cache.clear();
        self.source = Some(Arc::new(image));
    }

    /// Heatmap for `label` on the current source image, computed at most once
    pub async fn heatmap_for(&mut self, label: &str) -> Result<Arc<Heatmap>> {
        if let Some(cached) = self.cache.get(label) {
            debug!(label, "heatmap cache hit");
            return Ok(cached);
        }
        let source = self.source.clone().ok_or(HeatmapError::NoSourceImage)?;
        let heatmap = self.generate(&source, label).await?;
        Ok(self.cache.insert(heatmap))
    }

    /// Run one full round for `label` on `image`, without touching the cache
    pub async fn generate(&self, image: &DynamicImage, label: &str) -> Result<Heatmap> {
        let (width, height) = image.dimensions();
        info!(label, width, height, "generating occlusion heatmap");

        let cropped = Arc::new(crop_to_center(image, self.config.analysis_size)?);
        self.save_debug("00_input/01.png", &cropped)?;

        let grid = sampler::sample(
            Arc::clone(&cropped),
            Arc::clone(&self.classifier),
            label,
            &self.config,
        )
        .await?;
        self.save_masks(&cropped)?;

        let baseline = self.baseline_score(Arc::clone(&cropped), label).await?;
        let (alpha, contours) = analyze(&grid, baseline, self.config.threshold);

        let fill = render_fill(&alpha, self.config.fill_rgb(), width, height)?;
        let outline = render_outline(&contours, width, height, &self.config.outline_style())?;
        self.save_debug("02_fill/01.png", &fill)?;
        self.save_debug("03_outline/01.png", &outline)?;

        info!(label, baseline, contours = contours.len(), "heatmap ready");

        Ok(Heatmap {
            label: label.to_string(),
            baseline,
            alpha,
            contours,
            fill,
            outline,
        })
    }

    /// Score of `label` on the unmasked image; without it the round cannot be normalized
    async fn baseline_score(&self, image: Arc<RgbaImage>, label: &str) -> Result<f64> {
        let classifier = Arc::clone(&self.classifier);
        let classified = tokio::task::spawn_blocking(move || classifier.classify(&image)).await?;

        let unavailable = || HeatmapError::BaselineUnavailable {
            label: label.to_string(),
        };
        let baseline = match classified {
            Ok(classes) => find_label_score(&classes, label).ok_or_else(unavailable),
            Err(err) => {
                debug!("baseline classification failed: {:#}", err);
                Err(unavailable())
            }
        };
        Ok(baseline?)
    }

    fn save_debug(&self, relative: &str, image: &RgbaImage) -> Result<()> {
        match &self.debug {
            Some(debug_config) => debug_config.save(relative, image),
            None => Ok(()),
        }
    }

    fn save_masks(&self, cropped: &RgbaImage) -> Result<()> {
        let Some(debug_config) = self.debug.as_ref() else {
            return Ok(());
        };
        let color = self.config.mask_rgba();
        for (row, col) in sampler::mask_positions() {
            let masked = mask_at(
                cropped,
                col as u32,
                row as u32,
                self.config.step,
                self.config.mask_size,
                color,
            );
            debug_config.save(format!("01_masks/{:02}-{:02}.png", row + 1, col + 1), &masked)?;
        }
        Ok(())
    }
}
