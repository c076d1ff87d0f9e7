use thiserror::Error;

/// Failures that abort a whole heatmap round.
///
/// Per-position classifier problems never show up here; those degrade to
/// unsampled cells in the confidence grid.
#[derive(Debug, Error)]
pub enum HeatmapError {
    #[error("Image has no pixels to analyze ({width}x{height})")]
    InvalidImage { width: u32, height: u32 },

    #[error("Classifier returned no baseline score for label '{label}'")]
    BaselineUnavailable { label: String },

    #[error("Classifier failed for all {failed} of {total} occluded positions")]
    ClassifierUnavailable { failed: usize, total: usize },

    #[error("No source image has been set")]
    NoSourceImage,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
