//! # Pipeline Error Handling
//!
//! Errors raised while pulling frames, preparing model input and classifying.
//!
//! ## Error Classification
//!
//! Every error is classified along two axes:
//!
//! - **Severity** ([`ErrorSeverity`]): how loudly the host should report it
//! - **Scope**: whether it only spoils the current frame
//!   ([`PipelineError::is_frame_local`]) or the whole run
//!
//! The frame pipeline skips frame-local failures (a failed allocation, a
//! resampling failure, a classifier hiccup) and carries on with the next
//! frame. Everything else ends the run and is returned to the caller.
//!
//! ## Usage
//!
//! ```rust
//! use camera_classifier::error::{PipelineError, Retryable};
//!
//! let error = PipelineError::capture("raw-file", "truncated frame at offset 1228800");
//! assert!(!error.is_retryable());
//! assert_eq!(error.category(), "capture");
//! ```

use pixel_resample::{AllocationError, BufferError, ResampleError};
use thiserror::Error;

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, nothing was lost
    Info,
    /// A single frame was lost
    Warning,
    /// The run cannot continue
    Error,
}

/// Base error type for the camera classifier.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Cropping or scaling a frame failed.
    #[error("resample failed: {0}")]
    Resample(#[from] ResampleError),

    /// No memory for a frame buffer.
    #[error("frame allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// A frame source produced memory that does not describe a valid image.
    #[error("invalid frame buffer: {0}")]
    Buffer(#[from] BufferError),

    /// The frame source failed.
    #[error("capture error from {source_name}: {reason}")]
    Capture { source_name: String, reason: String },

    /// The classifier failed to produce a prediction.
    #[error("classifier error: {reason}")]
    Classifier { reason: String },

    /// Configuration validation failed.
    #[error("invalid configuration: {field}={value}: {reason}")]
    Config {
        field: String,
        value: String,
        reason: String,
    },

    /// File system errors.
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Image decoding or encoding errors.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration file parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a capture error
    pub fn capture(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Capture {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a classifier error
    pub fn classifier(reason: impl Into<String>) -> Self {
        Self::Classifier {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Short category name, used as a structured log field.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Resample(_) => "resample",
            PipelineError::Allocation(_) => "allocation",
            PipelineError::Buffer(_) => "buffer",
            PipelineError::Capture { .. } => "capture",
            PipelineError::Classifier { .. } => "classifier",
            PipelineError::Config { .. } => "config",
            PipelineError::Io { .. } => "io",
            PipelineError::Image(_) => "image",
            PipelineError::Json(_) => "json",
        }
    }

    /// True if the error only spoils the frame it happened on.
    ///
    /// An invalid crop region is a caller bug and would fail on every frame,
    /// so it is not frame-local.
    pub fn is_frame_local(&self) -> bool {
        match self {
            PipelineError::Resample(e) => matches!(
                e,
                ResampleError::AllocationFailed(_) | ResampleError::ResamplingFailed(_)
            ),
            PipelineError::Allocation(_) | PipelineError::Classifier { .. } => true,
            _ => false,
        }
    }
}

/// Trait for errors that can be retried
pub trait Retryable {
    /// Whether retrying the operation (on a later frame) may succeed
    fn is_retryable(&self) -> bool;
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Resample(e) => e.is_retryable(),
            PipelineError::Allocation(_) | PipelineError::Classifier { .. } => true,
            _ => false,
        }
    }
}

/// Trait for errors that have severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for PipelineError {
    fn severity(&self) -> ErrorSeverity {
        if self.is_frame_local() {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }
}

/// Trait for errors that carry a hint for the operator
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&'static str>;
}

impl HasRecoverySuggestion for PipelineError {
    fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            PipelineError::Resample(ResampleError::InvalidCropRegion { .. }) => {
                Some("Pick a crop rectangle that lies inside the frame, or use --crop full")
            }
            PipelineError::Resample(ResampleError::AllocationFailed(_)) => {
                Some("Reduce the pool size or target resolution; the frame was dropped")
            }
            PipelineError::Config { .. } => Some("Check the configuration file and CLI flags"),
            PipelineError::Classifier { .. } => Some("Check that the classifier endpoint is reachable"),
            _ => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_resample::CropRect;

    #[test]
    fn test_error_creation() {
        let error = PipelineError::config("queue_depth", 0, "must be at least 1");
        assert_eq!(error.category(), "config");
        assert_eq!(
            error.to_string(),
            "invalid configuration: queue_depth=0: must be at least 1"
        );
    }

    #[test]
    fn test_frame_local_classification() {
        let oom: PipelineError =
            ResampleError::AllocationFailed(AllocationError::OutOfMemory { bytes: 4 }).into();
        assert!(oom.is_frame_local());
        assert!(oom.is_retryable());
        assert_eq!(oom.severity(), ErrorSeverity::Warning);

        let crop: PipelineError = ResampleError::InvalidCropRegion {
            crop: CropRect::new(500, 0, 200, 10),
            source_width: 640,
            source_height: 480,
        }
        .into();
        assert!(!crop.is_frame_local());
        assert!(!crop.is_retryable());
        assert_eq!(crop.severity(), ErrorSeverity::Error);
        assert!(crop.recovery_suggestion().is_some());
    }

    #[test]
    fn test_classifier_errors_skip_the_frame() {
        let error = PipelineError::classifier("connection refused");
        assert!(error.is_frame_local());
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }
}
