// SPDX-License-Identifier: MIT
//! # Crop Rectangles and Scale Targets
//!
//! The resampler works in two geometric steps: select a sub-rectangle of the
//! source, then stretch it onto a fixed-size canvas.
//!
//! - **CropRect**: which part of the source to read. Must lie entirely inside
//!   the source; it is never clamped, because a silently shrunken crop would
//!   feed the classifier a different image than the caller asked for.
//! - **ScaleTarget**: the output size. Horizontal and vertical scale factors
//!   are independent, so the crop is stretched to fill the target.
//! - **InputPreset**: fixed input resolutions of common image classifiers.

use std::fmt;

/// Rectangular sub-region of a source image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole of a `width × height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// The largest centered square of a `width × height` image.
    ///
    /// For a 640×480 frame this is `(80, 0, 480, 480)`.
    pub const fn center_square(width: u32, height: u32) -> Self {
        let side = if width < height { width } else { height };
        Self::new((width - side) / 2, (height - side) / 2, side, side)
    }

    /// True if the rectangle is non-empty and lies inside a
    /// `source_width × source_height` image.
    pub fn fits_within(&self, source_width: u32, source_height: u32) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!(
            (right, bottom),
            (Some(r), Some(b)) if r <= source_width && b <= source_height
        )
    }

    /// Byte offset of the rectangle's top-left pixel inside a buffer with the
    /// given row pitch.
    pub fn byte_offset(&self, bytes_per_row: usize, bytes_per_pixel: usize) -> usize {
        self.y as usize * bytes_per_row + self.x as usize * bytes_per_pixel
    }
}

impl fmt::Display for CropRect {
    /// Geometry-string style: `WxH+X+Y`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Output resolution of a resample call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleTarget {
    pub width: u32,
    pub height: u32,
}

impl ScaleTarget {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Independent horizontal and vertical scale factors for a crop.
    pub fn scale_factors(&self, crop: &CropRect) -> (f64, f64) {
        (
            self.width as f64 / crop.width as f64,
            self.height as f64 / crop.height as f64,
        )
    }
}

impl fmt::Display for ScaleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Fixed input sizes of well-known image classifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum InputPreset {
    /// 299×299, Inception v3.
    #[value(name = "inception-v3")]
    InceptionV3,
    /// 224×224, MobileNet family.
    #[value(name = "mobilenet")]
    MobileNet,
    /// 224×224, ResNet family.
    #[value(name = "resnet")]
    ResNet,
    /// 640×640, YOLO detectors.
    #[value(name = "yolo")]
    Yolo,
}

impl InputPreset {
    pub fn to_target(self) -> ScaleTarget {
        match self {
            InputPreset::InceptionV3 => ScaleTarget::new(299, 299),
            InputPreset::MobileNet | InputPreset::ResNet => ScaleTarget::new(224, 224),
            InputPreset::Yolo => ScaleTarget::new(640, 640),
        }
    }
}
