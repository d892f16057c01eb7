use std::path::PathBuf;
use thiserror::Error;

/// Boxed error source shared by the image and model variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error types for the background removal tool.
///
/// Each variant carries the context of its domain (filesystem, image
/// processing, model inference) so the batch driver can report a failing
/// file with its path and the step that broke without parsing strings.
#[derive(Error, Debug)]
pub enum RecenterError {
    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RecenterError>;

impl RecenterError {
    /// The error followed by every source in its chain, joined with `: `.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Fallback for I/O errors without path context.
///
/// Call sites that know the path construct `RecenterError::FileSystem`
/// directly.
impl From<std::io::Error> for RecenterError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for RecenterError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of mask tensor reshaping, so they count as model
/// errors.
impl From<ndarray::ShapeError> for RecenterError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
