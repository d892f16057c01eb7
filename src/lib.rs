pub mod config;
pub mod errors;
pub mod imageops_ai;
pub mod mocks;
pub mod model;
pub mod progress_tracker;
pub mod traits;

use image::{DynamicImage, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use wildmatch::WildMatch;

pub use config::Config;
pub use errors::{RecenterError, Result};
pub use model::Model;
pub use progress_tracker::ProgressTracker;
pub use traits::*;

#[cfg(test)]
pub use mocks::*;

/// Outcome of one run over the base directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Inputs that were written back successfully, in processing order.
    pub processed: Vec<PathBuf>,
    /// Inputs that failed, with the reported message.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ImageProcessor<M: ImageSegmentationModel> {
    model: M,
    config: Config,
    pattern: WildMatch,
    progress: ProgressTracker,
}

impl<M: ImageSegmentationModel> ImageProcessor<M> {
    pub fn new(model: M, config: Config) -> Self {
        Self {
            model,
            pattern: WildMatch::new(&config.pattern),
            config,
            progress: ProgressTracker::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Processes every matching file one after another.
    ///
    /// Only a failure to enumerate the base directory is returned as an
    /// error. Per-file failures are logged and collected in the summary.
    pub fn process_directory(&self) -> Result<BatchSummary> {
        let image_files = self.collect_image_files()?;
        tracing::info!("Found {} images to process", image_files.len());

        let mut summary = BatchSummary::default();
        self.progress.start(image_files.len());

        for input_file in image_files {
            match self.process_single_image(&input_file) {
                Ok(output_file) if output_file == input_file => {
                    tracing::info!("Processed and overwritten: {}", output_file.display());
                    summary.processed.push(input_file);
                }
                Ok(output_file) => {
                    tracing::info!(
                        "Processed: {} -> {}",
                        input_file.display(),
                        output_file.display()
                    );
                    summary.processed.push(input_file);
                }
                Err(e) => {
                    let message = e.report();
                    tracing::error!("Error processing {}: {}", input_file.display(), message);
                    summary.failed.push((input_file, message));
                }
            }
            self.progress.inc();
        }

        self.progress.finish();
        tracing::info!(
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            "Background removal complete!"
        );
        Ok(summary)
    }

    /// Files matching the pattern exactly one directory below the base
    /// directory, sorted by path.
    pub fn collect_image_files(&self) -> Result<Vec<PathBuf>> {
        let base_dir = &self.config.base_dir;

        fs::read_dir(base_dir).map_err(|e| RecenterError::FileSystem {
            path: base_dir.clone(),
            operation: "ディレクトリ走査".to_string(),
            source: e,
        })?;

        let match_hidden = self.config.pattern.starts_with('.');
        let mut image_files: Vec<_> = WalkDir::new(base_dir)
            .max_depth(2)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !is_hidden(entry)
                    || (entry.depth() == 2 && match_hidden)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.depth() == 2 && entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| self.pattern.matches(name))
            })
            .map(DirEntry::into_path)
            .collect();

        // compare whole path strings; component order would put `a/` before `a-b/`
        image_files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        Ok(image_files)
    }

    /// Opens, strips, recenters and writes one image. Returns the path it was
    /// written to.
    pub fn process_single_image(&self, input_file: &Path) -> Result<PathBuf> {
        let img = image::open(input_file).map_err(|e| RecenterError::ImageProcessing {
            path: input_file.display().to_string(),
            operation: "画像読み込み".to_string(),
            source: Box::new(e),
        })?;

        let segmented =
            self.model
                .segment_image(&img)
                .map_err(|e| RecenterError::ImageProcessing {
                    path: input_file.display().to_string(),
                    operation: "背景除去".to_string(),
                    source: Box::new(e),
                })?;

        let centered = imageops_ai::recenter(segmented.into_rgba8(), self.config.alpha_threshold);

        let output_file = self.output_path(input_file)?;
        if let Some(parent) = output_file.parent().filter(|_| !self.config.overwrites_in_place())
        {
            fs::create_dir_all(parent).map_err(|e| RecenterError::FileSystem {
                path: parent.to_path_buf(),
                operation: "出力ディレクトリ作成".to_string(),
                source: e,
            })?;
        }

        let output_format = self.config.output_format(input_file);
        let processed_img = DynamicImage::ImageRgba8(centered);
        // JPEG has no alpha channel
        let processed_img = if output_format == ImageFormat::Jpeg {
            DynamicImage::ImageRgb8(processed_img.to_rgb8())
        } else {
            processed_img
        };

        processed_img
            .save_with_format(&output_file, output_format)
            .map_err(|e| RecenterError::ImageProcessing {
                path: output_file.display().to_string(),
                operation: "画像保存".to_string(),
                source: Box::new(e),
            })?;

        Ok(output_file)
    }

    /// Where the result for `input_file` is written: the file itself, or its
    /// mirror below the output directory. A format override swaps the
    /// extension.
    pub fn output_path(&self, input_file: &Path) -> Result<PathBuf> {
        let output_file = match &self.config.output_dir {
            Some(output_dir) => output_dir.join(self.get_relative_path(input_file)?),
            None => input_file.to_path_buf(),
        };

        Ok(match &self.config.format {
            Some(format) => output_file.with_extension(format),
            None => output_file,
        })
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        let base_dir = &self.config.base_dir;
        input_file
            .strip_prefix(base_dir)
            .map(|p| p.to_path_buf())
            .map_err(|_| RecenterError::FileSystem {
                path: input_file.to_path_buf(),
                operation: "相対パス取得".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "入力ファイルがベースディレクトリ内にありません",
                ),
            })
    }
}

impl ImageProcessor<Model> {
    pub fn with_onnx_model(config: Config) -> Result<Self> {
        let model = Model::new(&config.model_path, config.device_id)?;
        Ok(Self::new(model, config))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
