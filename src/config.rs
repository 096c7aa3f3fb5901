//! # Configuration Module
//!
//! Configuration for the frame pipeline, shared by the CLI and library users.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `target` | `ScaleTarget` | both sides > 0 | Classifier input resolution |
//! | `crop` | `CropMode` | full / center / rect | Region of each frame fed to the model |
//! | `interpolation` | `Interpolation` | bilinear / area | Resampling kernel |
//! | `queue_depth` | `usize` | 1-16 | Frames waiting for the worker before new ones are dropped |
//! | `max_frames` | `Option<u64>` | any | Stop after this many captured frames |
//! | `pool_buffers` | `usize` | 0-64 | Recycled destination buffers (0 disables pooling) |
//! | `row_alignment` | `usize` | 0 or power of two | Destination row alignment in bytes |
//!
//! ## Examples
//!
//! ```rust
//! use camera_classifier::config::{CropMode, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     crop: CropMode::Center,
//!     ..PipelineConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! assert_eq!(config.target.width, 299);
//! ```

use std::path::Path;

use pixel_resample::{CropRect, InputPreset, Interpolation, ScaleTarget};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Which part of each frame goes to the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMode {
    /// The whole frame, stretched to the target.
    #[default]
    Full,
    /// The largest centered square.
    Center,
    /// A fixed rectangle; frames it does not fit are rejected.
    Rect(CropRect),
}

impl CropMode {
    /// Crop rectangle for a `width × height` frame.
    pub fn rect_for(&self, width: u32, height: u32) -> CropRect {
        match self {
            CropMode::Full => CropRect::full(width, height),
            CropMode::Center => CropRect::center_square(width, height),
            CropMode::Rect(rect) => *rect,
        }
    }

    /// Parses `full`, `center`, or `x,y,w,h`.
    pub fn parse(s: &str) -> PipelineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(CropMode::Full),
            "center" | "centre" => Ok(CropMode::Center),
            rect => {
                let parts: Vec<u32> = rect
                    .split(',')
                    .map(|p| p.trim().parse::<u32>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| PipelineError::config("crop", s, e.to_string()))?;
                match parts.as_slice() {
                    [x, y, w, h] => Ok(CropMode::Rect(CropRect::new(*x, *y, *w, *h))),
                    _ => Err(PipelineError::config(
                        "crop",
                        s,
                        "expected full, center, or x,y,w,h",
                    )),
                }
            }
        }
    }
}

/// Parses `WIDTHxHEIGHT` (e.g. `299x299`) or a preset name.
pub fn parse_target(s: &str) -> PipelineResult<ScaleTarget> {
    use clap::ValueEnum;

    if let Ok(preset) = InputPreset::from_str(s, true) {
        return Ok(preset.to_target());
    }
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| PipelineError::config("target", s, "expected WIDTHxHEIGHT or a preset"))?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|e| PipelineError::config("target", s, e.to_string()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|e| PipelineError::config("target", s, e.to_string()))?;
    Ok(ScaleTarget::new(width, height))
}

/// Configuration structure for the frame pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Classifier input resolution.
    pub target: ScaleTarget,

    /// Region of each frame passed to the classifier.
    pub crop: CropMode,

    /// Resampling kernel.
    pub interpolation: Interpolation,

    /// Frames that may wait for the worker. When the queue is full, newly
    /// captured frames are dropped instead of queued.
    pub queue_depth: usize,

    /// Stop after this many captured frames.
    pub max_frames: Option<u64>,

    /// Number of destination buffers kept for reuse. `0` allocates every
    /// destination from the system allocator.
    pub pool_buffers: usize,

    /// Destination row alignment in bytes; `0` packs rows tightly.
    pub row_alignment: usize,
}

impl Default for PipelineConfig {
    /// Inception v3 input, whole frame, bilinear, one queued frame.
    fn default() -> Self {
        Self {
            target: InputPreset::InceptionV3.to_target(),
            crop: CropMode::Full,
            interpolation: Interpolation::Bilinear,
            queue_depth: 1,
            max_frames: None,
            pool_buffers: 4,
            row_alignment: 0,
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.target.is_valid() {
            return Err(PipelineError::config(
                "target",
                self.target,
                "both sides must be greater than 0",
            ));
        }
        if let CropMode::Rect(rect) = self.crop {
            if rect.width == 0 || rect.height == 0 {
                return Err(PipelineError::config("crop", rect, "crop must not be empty"));
            }
        }
        if !(1..=16).contains(&self.queue_depth) {
            return Err(PipelineError::config(
                "queue_depth",
                self.queue_depth,
                "must be between 1 and 16",
            ));
        }
        if self.pool_buffers > 64 {
            return Err(PipelineError::config(
                "pool_buffers",
                self.pool_buffers,
                "must be at most 64",
            ));
        }
        if self.row_alignment > 1 && !self.row_alignment.is_power_of_two() {
            return Err(PipelineError::config(
                "row_alignment",
                self.row_alignment,
                "must be 0 or a power of two",
            ));
        }
        Ok(())
    }
}
