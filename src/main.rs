use anyhow::{ensure, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rembg_center::{Config, ImageProcessor, ProgressTracker};

fn main() -> Result<()> {
    let config = Config::parse();

    let progress = if config.no_progress {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::new()
    };

    let log_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rembg_center={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(progress.clone()),
        )
        .init();

    ensure!(
        config.model_path.exists(),
        "Model path does not exist: {}",
        config.model_path.display()
    );

    let processor = ImageProcessor::with_onnx_model(config)
        .context("Failed to load segmentation model")?
        .with_progress(progress);

    // per-file failures are already logged; only enumeration aborts the run
    processor
        .process_directory()
        .with_context(|| {
            format!(
                "Failed to enumerate {}",
                processor.config().base_dir.display()
            )
        })?;

    Ok(())
}
