use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::classifier::{Classifier, find_label_score};
use crate::config::HeatmapConfig;
use crate::error::HeatmapError;
use crate::models::{ConfidenceGrid, SAMPLE_POSITIONS};
use crate::sensitivity::preprocessing::mask_at;

/// What happened at one mask position
enum Outcome {
    Scored(f64),
    LabelMissing,
    Failed(anyhow::Error),
}

/// Mask positions in sampling order: row by row, left to right
pub fn mask_positions() -> impl Iterator<Item = (usize, usize)> {
    (0..SAMPLE_POSITIONS).flat_map(|row| (0..SAMPLE_POSITIONS).map(move |col| (row, col)))
}

/// Classify every masked variant of `image` and collect the score for `label`.
///
/// All 121 requests are issued at once (or up to `max_concurrency`) and the
/// grid is returned only after every one of them has finished. Each task
/// reports its own (row, col), so only the join loop writes to the grid.
/// A failed or label-less position stays unsampled; the round fails only
/// when every position failed.
pub async fn sample(
    image: Arc<RgbaImage>,
    classifier: Arc<dyn Classifier>,
    label: &str,
    config: &HeatmapConfig,
) -> Result<ConfidenceGrid> {
    config.validate()?;
    let limiter = config
        .max_concurrency
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
    let mask_color = config.mask_rgba();
    let (step, mask_size) = (config.step, config.mask_size);

    let mut tasks = JoinSet::new();
    for (row, col) in mask_positions() {
        let image = Arc::clone(&image);
        let classifier = Arc::clone(&classifier);
        let label = label.to_string();
        let limiter = limiter.clone();

        tasks.spawn(async move {
            // Held until the blocking call returns
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };

            let classified = tokio::task::spawn_blocking(move || {
                let masked = mask_at(&image, col as u32, row as u32, step, mask_size, mask_color);
                classifier.classify(&masked)
            })
            .await;

            let outcome = match classified {
                Ok(Ok(classes)) => match find_label_score(&classes, &label) {
                    Some(score) => Outcome::Scored(score),
                    None => Outcome::LabelMissing,
                },
                Ok(Err(err)) => Outcome::Failed(err),
                Err(join_err) => Outcome::Failed(join_err.into()),
            };
            (row, col, outcome)
        });
    }

    let mut grid = ConfidenceGrid::new();
    let mut failed = 0;
    let mut missing = 0;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((row, col, Outcome::Scored(score))) => {
                trace!(row, col, score, "position scored");
                grid.set_sample(row, col, score);
            }
            Ok((row, col, Outcome::LabelMissing)) => {
                trace!(row, col, "label not reported");
                missing += 1;
            }
            Ok((row, col, Outcome::Failed(err))) => {
                warn!(row, col, "classification failed: {:#}", err);
                failed += 1;
            }
            Err(join_err) => {
                warn!("sampling task did not finish: {}", join_err);
                failed += 1;
            }
        }
    }

    let total = SAMPLE_POSITIONS * SAMPLE_POSITIONS;
    debug!(
        sampled = grid.sampled_count(),
        missing, failed, total, "occlusion sampling finished"
    );

    if failed == total {
        return Err(HeatmapError::ClassifierUnavailable { failed, total }.into());
    }
    Ok(grid)
}
