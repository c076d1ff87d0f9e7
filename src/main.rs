use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use image::ImageReader;
use tracing_subscriber::EnvFilter;

use occlusion_heatmap::{CommandClassifier, HeatmapConfig, HeatmapPipeline, truncate_label};

#[derive(Parser)]
#[command(name = "occlusion-heatmap")]
#[command(about = "Show which parts of an image a classifier relies on for a label")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Label whose confidence is explained
    #[arg(short, long)]
    label: String,

    /// Classifier program; receives a PNG path, prints [{"label", "score"}] as JSON
    #[arg(short, long, value_name = "PROGRAM")]
    classifier: PathBuf,

    /// Extra arguments passed to the classifier before the image path
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// TOML file with heatmap settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Alpha at or below which a region is outlined
    #[arg(long)]
    threshold: Option<f64>,

    /// Where heatmap.png, outline.png and composite.png are written
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => HeatmapConfig::from_file(path)?,
        None => HeatmapConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }

    let img = ImageReader::open(&args.image_path)?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;

    if args.verbose {
        println!("Image loaded: {}x{}", img.width(), img.height());
    }

    let classifier = CommandClassifier::new(&args.classifier).with_args(args.classifier_args);
    let mut pipeline = HeatmapPipeline::new(Arc::new(classifier)).with_config(config)?;
    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    pipeline.set_source_image(img.clone());
    let heatmap = pipeline.heatmap_for(&args.label).await?;

    std::fs::create_dir_all(&args.out_dir)?;
    let save = |name: &str, image: &image::RgbaImage| -> anyhow::Result<()> {
        let path = args.out_dir.join(name);
        image
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save {}: {}", path.display(), e))
    };
    save("heatmap.png", &heatmap.fill)?;
    save("outline.png", &heatmap.outline)?;
    save("composite.png", &heatmap.composite(&img))?;

    println!("\n=== Occlusion Heatmap: {} ===", truncate_label(&heatmap.label, 32));
    println!("Baseline confidence: {:.3}", heatmap.baseline);
    println!("Sensitive regions: {}", heatmap.contours.len());

    if args.verbose {
        let (row, col) = heatmap.alpha.argmin();
        println!("Most sensitive cell: row {}, col {}", row + 1, col + 1);
        println!("\nAlpha grid:");
        for cells in heatmap.alpha.rows() {
            let line: Vec<String> = cells.iter().map(|a| format!("{:.2}", a)).collect();
            println!("  {}", line.join(" "));
        }
        for (i, contour) in heatmap.contours.iter().enumerate() {
            println!(
                "  Region {}: {}x{} cells, {} points",
                i + 1,
                contour.width(),
                contour.height(),
                contour.len()
            );
        }
    }

    println!("Saved heatmap.png, outline.png, composite.png to {}", args.out_dir.display());

    Ok(())
}
