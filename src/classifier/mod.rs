//! # Classifiers
//!
//! A classifier takes one model-sized frame and returns a [`Prediction`]. The
//! model itself is out of scope; implementations here are a deterministic
//! stand-in ([`DominantColorClassifier`]) and a client for a model served
//! over HTTP ([`HttpClassifier`]).
//!
//! A classifier that is still loading answers [`Prediction::NotReady`], which
//! sinks render as `Loading...`.

pub mod color;
pub mod http;

pub use color::DominantColorClassifier;
pub use http::HttpClassifier;

use std::fmt;

use pixel_resample::{PixelBuffer, ScaleTarget};

use crate::error::PipelineResult;

/// Text shown for a prediction that is not available yet.
pub const NOT_READY_TEXT: &str = "Loading...";

/// Outcome of classifying one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// The predicted class label.
    Label(String),
    /// The model cannot answer yet.
    NotReady,
}

impl Prediction {
    pub fn label(label: impl Into<String>) -> Self {
        Prediction::Label(label.into())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Prediction::Label(_))
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Label(label) => f.write_str(label),
            Prediction::NotReady => f.write_str(NOT_READY_TEXT),
        }
    }
}

/// Image classifier with a fixed input resolution.
pub trait Classifier: Send {
    /// Resolution frames must be resampled to before [`Classifier::classify`].
    fn input_size(&self) -> ScaleTarget;

    /// Classifies a frame of [`Classifier::input_size`].
    fn classify(&mut self, frame: &PixelBuffer) -> PipelineResult<Prediction>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn input_size(&self) -> ScaleTarget {
        (**self).input_size()
    }

    fn classify(&mut self, frame: &PixelBuffer) -> PipelineResult<Prediction> {
        (**self).classify(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_display() {
        assert_eq!(Prediction::label("tabby cat").to_string(), "tabby cat");
        assert_eq!(Prediction::NotReady.to_string(), "Loading...");
        assert!(!Prediction::NotReady.is_ready());
    }
}
