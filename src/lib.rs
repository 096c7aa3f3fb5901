//! # Camera Classifier Library
//!
//! Feeds camera frames to an image classifier. Each frame is cropped and
//! scaled to the classifier's fixed input resolution by the
//! [`pixel_resample`] crate, classified, and the predicted label is handed to
//! a display sink.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: Frame sources (synthetic patterns, raw frame files, images)
//! - `classifier`: The classifier interface plus a stand-in and an HTTP client
//! - `pipeline`: The per-frame crop/scale/classify/display loop
//! - `config`: Configuration management and validation
//! - `error`: Error types and their classification
//!
//! ## Features
//!
//! - **Owned buffers**: every frame and every model input has exactly one owner
//!   and is released exactly once
//! - **Recycled memory**: frame and model-input buffers come from pools
//! - **Latest-frame policy**: frames arriving while the classifier is busy are
//!   dropped, not queued
//! - **Typed failures**: a failed allocation skips one frame instead of
//!   ending the run
//!
//! ## Example
//!
//! ```rust
//! use camera_classifier::capture::{SyntheticPattern, SyntheticSource};
//! use camera_classifier::classifier::DominantColorClassifier;
//! use camera_classifier::config::PipelineConfig;
//! use camera_classifier::pipeline::{CollectingSink, FramePipeline};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let classifier = DominantColorClassifier::new(config.target);
//! let mut pipeline = FramePipeline::new(config, classifier, CollectingSink::default())?;
//!
//! let mut camera = SyntheticSource::new(640, 480, SyntheticPattern::ColorCycle)?.limit(3);
//! let report = pipeline.run_inline(&mut camera)?;
//! assert_eq!(report.classified, 3);
//! assert_eq!(pipeline.sink().labels[0].1.to_string(), "red");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod capture;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;

/// Re-export error types for convenience
pub use error::{
    ErrorSeverity, HasRecoverySuggestion, HasSeverity, PipelineError, PipelineResult, Retryable,
};

pub use capture::FrameSource;
pub use classifier::{Classifier, Prediction};
pub use config::{CropMode, PipelineConfig};
pub use pipeline::{FramePipeline, LabelSink, PipelineReport, StdoutSink};

/// Re-export the resampling core
pub use pixel_resample;
