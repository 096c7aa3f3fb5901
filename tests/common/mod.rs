//! Common test utilities and helpers for the camera classifier tests
//!
//! Stand-in classifiers with controllable timing and failures, plus frame
//! builders for file-backed sources.

#![allow(dead_code)]

use std::time::Duration;

use camera_classifier::classifier::{Classifier, Prediction};
use camera_classifier::error::{PipelineError, PipelineResult};
use camera_classifier::pixel_resample::{PixelBuffer, ScaleTarget};

/// Classifier that takes a fixed time per frame and labels frames by the
/// order it saw them in.
pub struct SlowClassifier {
    pub input: ScaleTarget,
    pub delay: Duration,
    pub seen: u64,
}

impl SlowClassifier {
    pub fn new(input: ScaleTarget, delay: Duration) -> Self {
        Self {
            input,
            delay,
            seen: 0,
        }
    }
}

impl Classifier for SlowClassifier {
    fn input_size(&self) -> ScaleTarget {
        self.input
    }

    fn classify(&mut self, frame: &PixelBuffer) -> PipelineResult<Prediction> {
        assert_eq!((frame.width(), frame.height()), (self.input.width, self.input.height));
        std::thread::sleep(self.delay);
        self.seen += 1;
        Ok(Prediction::label(format!("seen-{}", self.seen)))
    }
}

/// Classifier that fails on the calls listed in `fail_on` (0-based) and is
/// not ready for the first `warmup` calls.
pub struct ScriptedClassifier {
    pub input: ScaleTarget,
    pub fail_on: Vec<u64>,
    pub warmup: u64,
    pub calls: u64,
}

impl Classifier for ScriptedClassifier {
    fn input_size(&self) -> ScaleTarget {
        self.input
    }

    fn classify(&mut self, _frame: &PixelBuffer) -> PipelineResult<Prediction> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err(PipelineError::classifier(format!("scripted failure on call {call}")));
        }
        if call < self.warmup {
            return Ok(Prediction::NotReady);
        }
        Ok(Prediction::label("object"))
    }
}

/// `count` solid BGRA frames of `width × height`, concatenated, cycling
/// through the given colours (given as B, G, R).
pub fn raw_bgra_frames(width: u32, height: u32, colors: &[[u8; 3]], count: usize) -> Vec<u8> {
    let pixels = (width * height) as usize;
    let mut out = Vec::with_capacity(pixels * 4 * count);
    for i in 0..count {
        let [b, g, r] = colors[i % colors.len()];
        for _ in 0..pixels {
            out.extend_from_slice(&[b, g, r, 255]);
        }
    }
    out
}
