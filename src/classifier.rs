use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::models::Classification;

/// Anything that can score an image against a set of labels.
///
/// Calls may block (on-device inference, a subprocess, a network round trip);
/// the sampler runs them on tokio's blocking pool.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &RgbaImage) -> Result<Vec<Classification>>;
}

impl<F> Classifier for F
where
    F: Fn(&RgbaImage) -> Result<Vec<Classification>> + Send + Sync,
{
    fn classify(&self, image: &RgbaImage) -> Result<Vec<Classification>> {
        self(image)
    }
}

/// Score for `label`, or None when the label is missing or the score is not a number
pub fn find_label_score(classes: &[Classification], label: &str) -> Option<f64> {
    classes
        .iter()
        .find(|c| c.label == label)
        .map(|c| c.score)
        .filter(|score| score.is_finite())
}

/// Runs an external program once per image.
///
/// The image is written to a temporary PNG whose path is appended to `args`.
/// The program must print a JSON array of `{"label": .., "score": ..}` objects.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, image: &RgbaImage) -> Result<Vec<Classification>> {
        let file = tempfile::Builder::new()
            .prefix("occlusion-")
            .suffix(".png")
            .tempfile()
            .context("Failed to create temp image file")?;
        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| anyhow::anyhow!("Failed to write classifier input: {}", e))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("{} printed malformed JSON", self.program.display()))
    }
}
