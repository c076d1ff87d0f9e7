//! Integration tests for occlusion sampling against fake classifiers.

mod common;

use std::sync::Arc;

use image::RgbaImage;
use occlusion_heatmap::sample;
use occlusion_heatmap::sensitivity::preprocessing::mask_at;
use occlusion_heatmap::sensitivity::sampler::mask_positions;

use common::*;

/// Score that identifies the mask position: row * 11 + col, scaled down
fn position_score(image: &RgbaImage) -> Option<f64> {
    let (x, y) = mask_origin(image)?;
    Some(((y / 16) * 11 + x / 16) as f64 / 1000.0)
}

fn position_classifier() -> Arc<dyn Classifier> {
    Arc::new(|image: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
        let score = position_score(image).ok_or_else(|| anyhow::anyhow!("no mask found"))?;
        Ok(vec![Classification::new(LABEL, score)])
    })
}

#[test]
fn test_mask_positions_are_row_major() {
    let positions: Vec<_> = mask_positions().collect();
    assert_eq!(positions.len(), 121);
    assert_eq!(positions[0], (0, 0));
    assert_eq!(positions[1], (0, 1));
    assert_eq!(positions[11], (1, 0));
    assert_eq!(positions[120], (10, 10));
}

#[test]
fn test_mask_covers_expected_square() {
    let image = create_test_image();
    let masked = mask_at(&image, 2, 3, 16, 64, MASK);

    assert_eq!(mask_origin(&masked), Some((32, 48)));
    assert_eq!(*masked.get_pixel(95, 111), MASK);
    assert_ne!(*masked.get_pixel(96, 111), MASK);
    assert_ne!(*masked.get_pixel(95, 112), MASK);
    // The source is never modified
    assert_eq!(mask_origin(&image), None);
}

#[test]
fn test_mask_offset_past_pixel_range_is_not_painted() {
    let image = create_test_image();
    let masked = mask_at(&image, 10, 0, u32::MAX / 4, 64, MASK);
    assert_eq!(masked, image);

    let masked = mask_at(&image, 0, 20, 16, 64, MASK);
    assert_eq!(masked, image);
}

#[tokio::test]
async fn test_every_position_is_sampled() -> anyhow::Result<()> {
    let image = Arc::new(create_test_image());
    let grid = sample(image, target_classifier(), LABEL, &HeatmapConfig::default()).await?;

    assert_eq!(grid.sampled_count(), 121);
    assert_eq!(grid.sample(0, 0), Some(0.9));
    assert!((grid.sample(4, 4).unwrap() - 0.1).abs() < 1e-9);
    // Mask at column 3 covers half the target width
    assert!((grid.sample(4, 3).unwrap() - 0.5).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_scores_land_in_their_own_cells() -> anyhow::Result<()> {
    let image = Arc::new(create_test_image());
    let grid = sample(image, position_classifier(), LABEL, &HeatmapConfig::default()).await?;

    for (row, col) in mask_positions() {
        let expected = (row * 11 + col) as f64 / 1000.0;
        assert_eq!(grid.sample(row, col), Some(expected), "position ({}, {})", row, col);
    }
    Ok(())
}

#[tokio::test]
async fn test_concurrency_limit_does_not_change_result() -> anyhow::Result<()> {
    let image = Arc::new(create_test_image());
    let unbounded = sample(
        Arc::clone(&image),
        target_classifier(),
        LABEL,
        &HeatmapConfig::default(),
    )
    .await?;
    let serial = sample(
        image,
        target_classifier(),
        LABEL,
        &HeatmapConfig::default().with_max_concurrency(1),
    )
    .await?;

    assert_eq!(unbounded, serial);
    Ok(())
}

#[tokio::test]
async fn test_missing_label_leaves_cell_unsampled() -> anyhow::Result<()> {
    let classifier: Arc<dyn Classifier> =
        Arc::new(|image: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
            match mask_origin(image) {
                Some((0, _)) => Ok(vec![Classification::new("dog", 0.7)]),
                _ => Ok(vec![Classification::new(LABEL, 0.8)]),
            }
        });
    let grid = sample(Arc::new(create_test_image()), classifier, LABEL, &HeatmapConfig::default())
        .await?;

    assert_eq!(grid.sampled_count(), 110);
    for row in 0..11 {
        assert_eq!(grid.sample(row, 0), None);
        assert_eq!(grid.sample(row, 1), Some(0.8));
    }
    Ok(())
}

#[tokio::test]
async fn test_failed_positions_degrade_to_unsampled() -> anyhow::Result<()> {
    let classifier: Arc<dyn Classifier> =
        Arc::new(|image: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
            match mask_origin(image) {
                Some((_, 0)) => anyhow::bail!("inference timed out"),
                Some((16, 16)) => panic!("classifier crashed"),
                _ => Ok(vec![Classification::new(LABEL, 0.6)]),
            }
        });
    let grid = sample(Arc::new(create_test_image()), classifier, LABEL, &HeatmapConfig::default())
        .await?;

    assert_eq!(grid.sampled_count(), 121 - 11 - 1);
    assert_eq!(grid.sample(0, 5), None);
    assert_eq!(grid.sample(1, 1), None);
    assert_eq!(grid.sample(1, 2), Some(0.6));
    Ok(())
}

#[tokio::test]
async fn test_non_finite_scores_are_ignored() -> anyhow::Result<()> {
    let classifier: Arc<dyn Classifier> = Arc::new(|_: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
        Ok(vec![Classification::new(LABEL, f64::NAN)])
    });
    let grid = sample(Arc::new(create_test_image()), classifier, LABEL, &HeatmapConfig::default())
        .await?;
    assert_eq!(grid.sampled_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_round_fails_when_every_position_fails() {
    let classifier: Arc<dyn Classifier> =
        Arc::new(|_: &RgbaImage| -> anyhow::Result<Vec<Classification>> {
            anyhow::bail!("connection refused")
        });
    let result = sample(
        Arc::new(create_test_image()),
        classifier,
        LABEL,
        &HeatmapConfig::default(),
    )
    .await;

    let err = result.expect_err("round should fail");
    assert!(matches!(
        err.downcast_ref::<HeatmapError>(),
        Some(HeatmapError::ClassifierUnavailable { failed: 121, total: 121 })
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_classifying() {
    let classifier = CountingClassifier::new(0.5);
    let config = HeatmapConfig {
        step: u32::MAX / 4,
        ..HeatmapConfig::default()
    };
    let result = sample(
        Arc::new(create_test_image()),
        classifier.clone(),
        LABEL,
        &config,
    )
    .await;

    let err = result.expect_err("config should be rejected");
    assert!(matches!(
        err.downcast_ref::<HeatmapError>(),
        Some(HeatmapError::InvalidConfig(_))
    ));
    assert_eq!(classifier.calls(), 0);
}
