pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sensitivity;

pub use cache::HeatmapCache;
pub use classifier::{Classifier, CommandClassifier};
pub use config::HeatmapConfig;
pub use error::HeatmapError;
pub use models::{
    Classification, ConfidenceGrid, Contour, GridPoint, Heatmap, SensitivityGrid, truncate_label,
};
pub use pipeline::{DebugConfig, HeatmapPipeline};
pub use sensitivity::aggregate::aggregate;
pub use sensitivity::outline::trace;
pub use sensitivity::render::{OutlineStyle, render_fill, render_outline};
pub use sensitivity::sampler::sample;
