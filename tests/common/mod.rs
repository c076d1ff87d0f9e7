mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from occlusion_heatmap for tests
pub use occlusion_heatmap::{
    Classification, Classifier, ConfidenceGrid, Contour, GridPoint, HeatmapConfig, HeatmapError,
    HeatmapPipeline, SensitivityGrid,
};
