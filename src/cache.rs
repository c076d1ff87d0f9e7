use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Heatmap;

/// Finished heatmaps for the current source image, keyed by label
#[derive(Debug, Default)]
pub struct HeatmapCache {
    entries: HashMap<String, Arc<Heatmap>>,
}

impl HeatmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<Arc<Heatmap>> {
        self.entries.get(label).cloned()
    }

    pub fn insert(&mut self, heatmap: Heatmap) -> Arc<Heatmap> {
        let heatmap = Arc::new(heatmap);
        self.entries.insert(heatmap.label.clone(), Arc::clone(&heatmap));
        heatmap
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
