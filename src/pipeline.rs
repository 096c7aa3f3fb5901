//! # Frame Pipeline
//!
//! Pulls frames from a [`FrameSource`], crops and scales each one to the
//! classifier's input size, classifies it and hands the prediction to a
//! [`LabelSink`].
//!
//! ## Architecture
//!
//! ```text
//! capture thread                     worker thread
//! ┌─────────────┐  bounded queue   ┌───────────┐   ┌────────────┐   ┌──────┐
//! │ FrameSource │ ───────────────▶ │ Resampler │ ─▶│ Classifier │ ─▶│ Sink │
//! └─────────────┘  (try_send)      └───────────┘   └────────────┘   └──────┘
//! ```
//!
//! The queue holds at most `queue_depth` frames. A frame captured while the
//! queue is full is dropped on the spot, so a slow classifier always sees
//! recent frames instead of an ever-growing backlog. Dropped frames are
//! released immediately and return to their source's pool.
//!
//! ## Failure Handling
//!
//! - Frame-local errors ([`PipelineError::is_frame_local`]) are logged and
//!   counted; the next frame is processed normally.
//! - Any other error stops capture and is returned from [`FramePipeline::run`].

use std::fmt;
use std::io::{self, Write};
use std::panic;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{TrySendError, bounded};
use pixel_resample::{BufferAllocator, BufferPool, PixelBuffer, PixelFormat, Resampler, SystemAllocator};
use tracing::{debug, info, warn};

use crate::capture::FrameSource;
use crate::classifier::{Classifier, Prediction};
use crate::config::PipelineConfig;
use crate::error::{HasSeverity, PipelineError, PipelineResult};

/// Display collaborator: receives one prediction per classified frame.
pub trait LabelSink: Send {
    fn show(&mut self, frame_index: u64, prediction: &Prediction) -> PipelineResult<()>;
}

/// Writes `frame N: label` lines to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LabelSink for StdoutSink {
    fn show(&mut self, frame_index: u64, prediction: &Prediction) -> PipelineResult<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "frame {frame_index}: {prediction}")
            .map_err(|e| PipelineError::io("writing label", e))
    }
}

/// Keeps every prediction in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub labels: Vec<(u64, Prediction)>,
}

impl LabelSink for CollectingSink {
    fn show(&mut self, frame_index: u64, prediction: &Prediction) -> PipelineResult<()> {
        self.labels.push((frame_index, prediction.clone()));
        Ok(())
    }
}

impl<K: LabelSink + ?Sized> LabelSink for &mut K {
    fn show(&mut self, frame_index: u64, prediction: &Prediction) -> PipelineResult<()> {
        (**self).show(frame_index, prediction)
    }
}

/// Frame counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Frames taken from the source.
    pub captured: u64,
    /// Frames that reached the sink.
    pub classified: u64,
    /// Of those, predictions that were [`Prediction::NotReady`].
    pub not_ready: u64,
    /// Frames discarded because the queue was full.
    pub dropped: u64,
    /// Frames skipped after a frame-local error.
    pub failed: u64,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} captured, {} classified ({} not ready), {} dropped, {} failed",
            self.captured, self.classified, self.not_ready, self.dropped, self.failed
        )
    }
}

/// Resampler for frames of `format`. Without an explicit allocator the
/// destination buffers come from a pool sized by the config.
fn build_resampler(
    config: &PipelineConfig,
    allocator: Option<&Arc<dyn BufferAllocator>>,
    format: PixelFormat,
) -> PipelineResult<Resampler> {
    let allocator: Arc<dyn BufferAllocator> = match allocator {
        Some(allocator) => Arc::clone(allocator),
        None if config.pool_buffers > 0 => Arc::new(BufferPool::with_row_alignment(
            config.target.width,
            config.target.height,
            format,
            config.pool_buffers,
            config.row_alignment,
        )?),
        None => Arc::new(SystemAllocator::with_row_alignment(config.row_alignment)),
    };
    debug!(%format, interpolation = ?config.interpolation, "built resampler");
    Ok(Resampler::with_allocator(allocator).interpolation(config.interpolation))
}

/// Crop, scale, classify and display, one frame at a time.
pub struct FramePipeline<C, K> {
    config: PipelineConfig,
    classifier: C,
    sink: K,
    allocator: Option<Arc<dyn BufferAllocator>>,
    resampler: Option<(PixelFormat, Resampler)>,
    report: PipelineReport,
}

impl<C: Classifier, K: LabelSink> FramePipeline<C, K> {
    /// Builds a pipeline whose destination buffers come from a pool sized by
    /// `config.pool_buffers` (or the system allocator when that is 0).
    pub fn new(config: PipelineConfig, classifier: C, sink: K) -> PipelineResult<Self> {
        config.validate()?;
        let input = classifier.input_size();
        if input != config.target {
            return Err(PipelineError::config(
                "target",
                config.target,
                format!("classifier expects {input}"),
            ));
        }
        Ok(Self {
            config,
            classifier,
            sink,
            allocator: None,
            resampler: None,
            report: PipelineReport::default(),
        })
    }

    /// Takes destination buffers from `allocator` instead.
    pub fn with_allocator(mut self, allocator: Arc<dyn BufferAllocator>) -> Self {
        self.allocator = Some(allocator);
        self.resampler = None;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn report(&self) -> PipelineReport {
        self.report
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_parts(self) -> (C, K, PipelineReport) {
        (self.classifier, self.sink, self.report)
    }

    fn resampler_for(&mut self, format: PixelFormat) -> PipelineResult<&mut Resampler> {
        if !matches!(&self.resampler, Some((built_for, _)) if *built_for == format) {
            let resampler = build_resampler(&self.config, self.allocator.as_ref(), format)?;
            self.resampler = Some((format, resampler));
        }
        match &mut self.resampler {
            Some((_, resampler)) => Ok(resampler),
            None => unreachable!("resampler was just built"),
        }
    }

    /// Crops, scales and classifies one frame, then shows the result.
    ///
    /// The model-sized buffer is released before this returns.
    pub fn process_frame(&mut self, index: u64, frame: &PixelBuffer) -> PipelineResult<Prediction> {
        let crop = self.config.crop.rect_for(frame.width(), frame.height());
        let target = self.config.target;
        let input = self.resampler_for(frame.format())?.resample(frame, crop, target)?;
        let prediction = self.classifier.classify(&input);
        input.release();
        let prediction = prediction?;
        self.sink.show(index, &prediction)?;
        debug!(index, %crop, %prediction, "classified frame");
        Ok(prediction)
    }

    /// [`FramePipeline::process_frame`] with the run's failure policy applied.
    fn handle_frame(&mut self, index: u64, frame: PixelBuffer) -> PipelineResult<()> {
        match self.process_frame(index, &frame) {
            Ok(prediction) => {
                self.report.classified += 1;
                if !prediction.is_ready() {
                    self.report.not_ready += 1;
                }
                Ok(())
            }
            Err(e) if e.is_frame_local() => {
                warn!(
                    index,
                    category = e.category(),
                    severity = ?e.severity(),
                    error = %e,
                    "skipping frame"
                );
                self.report.failed += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Processes every frame of `source` in order on the calling thread.
    ///
    /// Nothing is dropped; meant for file sources and tests.
    pub fn run_inline<S: FrameSource>(&mut self, source: &mut S) -> PipelineResult<PipelineReport> {
        info!(source = source.name(), target = %self.config.target, "starting inline run");
        let mut index = 0;
        while self.config.max_frames.is_none_or(|max| index < max) {
            let Some(frame) = source.next_frame()? else {
                break;
            };
            self.report.captured += 1;
            self.handle_frame(index, frame)?;
            index += 1;
        }
        info!(report = %self.report, "run finished");
        Ok(self.report)
    }

    /// Captures on the calling thread and classifies on a worker thread,
    /// dropping frames that arrive while the queue is full.
    pub fn run<S: FrameSource>(&mut self, source: &mut S) -> PipelineResult<PipelineReport> {
        info!(
            source = source.name(),
            target = %self.config.target,
            queue_depth = self.config.queue_depth,
            "starting run"
        );
        let (tx, rx) = bounded::<(u64, PixelBuffer)>(self.config.queue_depth);
        let max_frames = self.config.max_frames;
        let mut captured = 0u64;
        let mut dropped = 0u64;

        let (capture_result, worker_result) = thread::scope(|scope| {
            let worker = scope.spawn(|| -> PipelineResult<()> {
                for (index, frame) in rx {
                    self.handle_frame(index, frame)?;
                }
                Ok(())
            });

            let capture_result = (|| -> PipelineResult<()> {
                while max_frames.is_none_or(|max| captured < max) {
                    let Some(frame) = source.next_frame()? else {
                        break;
                    };
                    let index = captured;
                    captured += 1;
                    match tx.try_send((index, frame)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            debug!(index, "queue full, dropped frame");
                        }
                        // The worker stopped on an error; it is reported below.
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                Ok(())
            })();
            drop(tx);

            let worker_result = worker
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload));
            (capture_result, worker_result)
        });

        self.report.captured += captured;
        self.report.dropped += dropped;
        worker_result?;
        capture_result?;
        info!(report = %self.report, "run finished");
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticPattern, SyntheticSource};
    use crate::classifier::DominantColorClassifier;
    use crate::config::CropMode;
    use pixel_resample::{FaultInjectingAllocator, ScaleTarget};

    fn config(target: ScaleTarget) -> PipelineConfig {
        PipelineConfig {
            target,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_process_frame_labels_synthetic_colors() {
        let target = ScaleTarget::new(32, 32);
        let mut pipeline = FramePipeline::new(
            config(target),
            DominantColorClassifier::new(target),
            CollectingSink::default(),
        )
        .unwrap();
        let mut source = SyntheticSource::new(64, 48, SyntheticPattern::ColorCycle)
            .unwrap()
            .limit(3);
        let report = pipeline.run_inline(&mut source).unwrap();
        assert_eq!(report.captured, 3);
        assert_eq!(report.classified, 3);

        let labels: Vec<String> = pipeline.sink().labels.iter().map(|(_, p)| p.to_string()).collect();
        assert_eq!(labels, ["red", "green", "blue"]);
    }

    #[test]
    fn test_target_must_match_classifier() {
        let result = FramePipeline::new(
            config(ScaleTarget::new(299, 299)),
            DominantColorClassifier::new(ScaleTarget::new(224, 224)),
            CollectingSink::default(),
        );
        assert!(matches!(result, Err(PipelineError::Config { .. })));
    }

    #[test]
    fn test_allocation_failure_skips_one_frame() {
        let target = ScaleTarget::new(16, 16);
        let faulty = Arc::new(FaultInjectingAllocator::new(SystemAllocator::new()));
        faulty.fail_next(1);
        let mut pipeline = FramePipeline::new(
            config(target),
            DominantColorClassifier::new(target),
            CollectingSink::default(),
        )
        .unwrap()
        .with_allocator(faulty.clone());

        let mut source = SyntheticSource::new(32, 32, SyntheticPattern::ColorCycle)
            .unwrap()
            .limit(3);
        let report = pipeline.run_inline(&mut source).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.classified, 2);
        assert_eq!(pipeline.sink().labels[0].0, 1);
    }

    #[test]
    fn test_crop_outside_frame_aborts_run() {
        let target = ScaleTarget::new(16, 16);
        let config = PipelineConfig {
            crop: CropMode::Rect(pixel_resample::CropRect::new(500, 0, 200, 100)),
            ..config(target)
        };
        let mut pipeline =
            FramePipeline::new(config, DominantColorClassifier::new(target), CollectingSink::default())
                .unwrap();
        let mut source = SyntheticSource::new(640, 480, SyntheticPattern::Gradient)
            .unwrap()
            .limit(50);
        let err = pipeline.run(&mut source).unwrap_err();
        assert!(matches!(err, PipelineError::Resample(_)));
        assert!(pipeline.sink().labels.is_empty());
    }

    #[test]
    fn test_report_display() {
        let report = PipelineReport {
            captured: 10,
            classified: 6,
            not_ready: 1,
            dropped: 3,
            failed: 1,
        };
        assert_eq!(
            report.to_string(),
            "10 captured, 6 classified (1 not ready), 3 dropped, 1 failed"
        );
    }
}
