//! Error types for paper detection

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for paperscan operations
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Every failure the detector or its runner can report
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Image file could not be opened or decoded
    #[error("Could not read the image at {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// No contour in the paper mask qualified as the sheet
    #[error("No paper-like region was detected. Try adjusting lighting or the min-area-ratio.")]
    NoPaperDetected,

    /// Corner ordering needs exactly four points
    #[error("Expected four 2D points to order, got {count}")]
    InvalidInputShape { count: usize },

    /// Writing an output image or directory failed
    #[error("Failed to write {}: {source}", path.display())]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl DetectionError {
    /// Create an output write error with context
    pub fn output_write<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::OutputWriteFailed {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Process exit code used by the command-line runner
    pub fn exit_code(&self) -> u8 {
        match self {
            DetectionError::NoPaperDetected => 2,
            DetectionError::OutputWriteFailed { .. } => 3,
            _ => 1,
        }
    }

    /// Whether the caller can reasonably retry with different input or parameters
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DetectionError::NoPaperDetected)
    }
}
