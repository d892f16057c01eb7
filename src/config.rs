use clap::Parser;
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// File name pattern of the sprites produced by the compression step.
pub const DEFAULT_PATTERN: &str = "compressed_final_*.webp";

/// Remove the background of every matching sprite and recenter what is left.
#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory whose immediate subdirectories hold the sprites.
    #[arg(default_value = ".")]
    pub base_dir: PathBuf,

    /// ONNX segmentation model.
    #[arg(short, long)]
    pub model_path: PathBuf,

    /// Wildcard pattern (`*`, `?`) matched against file names.
    #[arg(short, long, default_value = DEFAULT_PATTERN, value_parser = check_pattern)]
    pub pattern: String,

    /// Write results below this directory instead of overwriting the inputs.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Encode with this format instead of the input's own.
    #[arg(short, long, value_parser = check_format)]
    pub format: Option<String>,

    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Pixels with alpha at or below this value count as background when
    /// computing the bounding box.
    #[arg(short, long, default_value_t = 0)]
    pub alpha_threshold: u8,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub no_progress: bool,
}

impl Config {
    /// Configuration with every option at its command line default.
    pub fn new(base_dir: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            model_path: model_path.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            output_dir: None,
            format: None,
            device_id: 0,
            alpha_threshold: 0,
            verbose: false,
            no_progress: false,
        }
    }

    pub const fn overwrites_in_place(&self) -> bool {
        self.output_dir.is_none()
    }

    /// Container format to write `path` with. Falls back to WebP when the
    /// extension is unknown.
    pub fn output_format(&self, path: &Path) -> ImageFormat {
        self.format
            .as_deref()
            .and_then(ImageFormat::from_extension)
            .or_else(|| ImageFormat::from_path(path).ok())
            .unwrap_or(ImageFormat::WebP)
    }
}

fn check_format(s: &str) -> Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled())
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}

fn check_pattern(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("pattern must not be empty".to_string());
    }
    if s.contains('/') || s.contains(std::path::MAIN_SEPARATOR) {
        return Err(format!("{} must match a file name, not a path", s));
    }
    Ok(s.to_string())
}
